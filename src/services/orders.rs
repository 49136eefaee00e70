//! Stock-safe order placement.
//!
//! An order is placed in a single store transaction: requested lines are
//! merged per listing, every listing row is locked in ascending id order,
//! stock is checked and decremented under the lock, and the order with its
//! price snapshot is written before commit. Any failure drops the
//! transaction, so stock and orders stay untouched.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregates::{Order, OrderSummary};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::Quantity;
use crate::notify::{Notification, Notifier};
use crate::services::cart::CartService;
use crate::session::SessionKey;
use crate::store::Store;
use crate::{Result, ShopError};

#[derive(Clone)]
pub struct OrderEngine {
    store: Arc<dyn Store>,
    cart: CartService,
    notifier: Notifier,
}

impl OrderEngine {
    pub fn new(store: Arc<dyn Store>, cart: CartService, notifier: Notifier) -> Self {
        Self { store, cart, notifier }
    }

    /// Places an order for `requested` `(product_info_id, quantity)` lines and
    /// returns its id. Duplicate ids are summed.
    pub async fn create_order(&self, principal: &Principal, contact_id: Uuid, requested: &[(Uuid, u32)]) -> Result<Uuid> {
        let order = self.place(principal, contact_id, requested).await?;
        let id = order.id();
        self.announce(principal, order);
        Ok(id)
    }

    /// Places an order from explicit lines, or from the session cart when
    /// `items` is empty. The cart is cleared only after a successful commit.
    pub async fn checkout(&self, principal: &Principal, session: &SessionKey, contact_id: Uuid, items: &[(Uuid, u32)]) -> Result<Uuid> {
        let requested: Vec<(Uuid, u32)> = if items.is_empty() {
            self.cart.get(session).await?.lines().into_iter().map(|(id, q)| (id, q.value())).collect()
        } else {
            items.to_vec()
        };
        let order = self.place(principal, contact_id, &requested).await?;
        let id = order.id();
        if let Err(e) = self.cart.clear(session).await {
            warn!(order_id = %id, session = %session, error = %e, "order placed but cart was not cleared");
        }
        self.announce(principal, order);
        Ok(id)
    }

    pub async fn orders_for(&self, principal: &Principal) -> Result<Vec<OrderSummary>> {
        Ok(self.store.orders_for_user(principal.user_id).await?)
    }

    async fn place(&self, principal: &Principal, contact_id: Uuid, requested: &[(Uuid, u32)]) -> Result<Order> {
        let lines = merge_lines(requested)?;

        let mut tx = self.store.begin().await?;
        let contact = tx
            .contact(contact_id)
            .await?
            .filter(|c| c.is_owned_by(principal.user_id))
            .ok_or_else(|| ShopError::not_found(format!("contact {contact_id}")))?;

        let mut order = Order::create(principal.user_id, contact.id);
        // BTreeMap iteration gives the ascending lock order.
        for (&product_info_id, &quantity) in &lines {
            let row = tx
                .lock_product_info(product_info_id)
                .await?
                .ok_or_else(|| ShopError::not_found(format!("product info {product_info_id}")))?;
            let remaining = quantity.take_from(row.quantity).ok_or(ShopError::InsufficientStock {
                product_info_id,
                requested: quantity.value(),
                available: row.quantity,
            })?;
            tx.set_product_info_quantity(product_info_id, remaining).await?;
            order
                .add_item(product_info_id, quantity, row.price)
                .map_err(|e| ShopError::validation(e.to_string()))?;
        }
        order.place().map_err(|e| ShopError::validation(e.to_string()))?;
        tx.insert_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }

    fn announce(&self, principal: &Principal, mut order: Order) {
        for event in order.take_events() {
            match event {
                OrderEvent::Placed { order_id, user_id, lines, total } => {
                    info!(%order_id, %user_id, lines, %total, "order placed");
                    match &principal.email {
                        Some(to) => self.notifier.notify(Notification {
                            to: to.clone(),
                            subject: format!("Order #{order_id} created"),
                            body: format!("Your order #{order_id} has been placed: {lines} item(s), total {total}."),
                        }),
                        None => warn!(%order_id, %user_id, "no email for order confirmation"),
                    }
                }
            }
        }
    }
}

fn merge_lines(requested: &[(Uuid, u32)]) -> Result<BTreeMap<Uuid, Quantity>> {
    if requested.is_empty() {
        return Err(ShopError::validation("order has no items"));
    }
    let mut lines: BTreeMap<Uuid, Quantity> = BTreeMap::new();
    for &(id, qty) in requested {
        let qty = Quantity::new(qty).map_err(|e| ShopError::validation(format!("product info {id}: {e}")))?;
        let merged = match lines.get(&id) {
            Some(existing) => existing.checked_add(qty).map_err(|e| ShopError::validation(format!("product info {id}: {e}")))?,
            None => qty,
        };
        lines.insert(id, merged);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sums_duplicates() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let lines = merge_lines(&[(b, 1), (a, 2), (b, 4)]).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[&a].value(), 2);
        assert_eq!(lines[&b].value(), 5);
        assert_eq!(lines.keys().copied().collect::<Vec<_>>(), {
            let mut ids = vec![a, b];
            ids.sort();
            ids
        });
    }

    #[test]
    fn test_merge_rejects_empty_and_zero() {
        assert_eq!(merge_lines(&[]).unwrap_err().kind(), "validation_error");
        assert_eq!(merge_lines(&[(Uuid::now_v7(), 0)]).unwrap_err().kind(), "validation_error");
    }

    #[test]
    fn test_merge_rejects_overflow() {
        let id = Uuid::now_v7();
        assert_eq!(merge_lines(&[(id, u32::MAX), (id, 1)]).unwrap_err().kind(), "validation_error");
    }
}
