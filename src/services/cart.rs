use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartError};
use crate::domain::value_objects::Quantity;
use crate::session::{SessionKey, SessionStore};
use crate::store::Store;
use crate::{Result, ShopError};

const CART_KEY: &str = "cart";

/// Cart entry joined with its catalog row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_info: Uuid,
    pub product: String,
    pub shop: String,
    pub price: Decimal,
    pub quantity: u32,
}

/// Cart operations over the session store. No stock checks happen here.
#[derive(Clone)]
pub struct CartService {
    sessions: Arc<dyn SessionStore>,
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(sessions: Arc<dyn SessionStore>, store: Arc<dyn Store>) -> Self {
        Self { sessions, store }
    }

    pub async fn get(&self, session: &SessionKey) -> Result<Cart> {
        match self.sessions.load(session, CART_KEY).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ShopError::Storage(format!("unreadable cart in session {session}: {e}"))),
            None => Ok(Cart::new()),
        }
    }

    pub async fn add(&self, session: &SessionKey, product_info_id: Uuid, quantity: u32) -> Result<Cart> {
        let quantity = Quantity::new(quantity).map_err(|e| ShopError::validation(e.to_string()))?;
        let mut cart = self.get(session).await?;
        cart.add_item(product_info_id, quantity).map_err(|e| ShopError::validation(e.to_string()))?;
        self.save(session, &cart).await?;
        Ok(cart)
    }

    pub async fn remove(&self, session: &SessionKey, product_info_id: Uuid) -> Result<Cart> {
        let mut cart = self.get(session).await?;
        cart.remove_item(product_info_id).map_err(|e| match e {
            CartError::ItemNotFound => ShopError::not_found(format!("cart item {product_info_id}")),
            other => ShopError::validation(other.to_string()),
        })?;
        self.save(session, &cart).await?;
        Ok(cart)
    }

    pub async fn clear(&self, session: &SessionKey) -> Result<()> {
        Ok(self.sessions.remove(session, CART_KEY).await?)
    }

    /// Cart contents with product, shop and current price. Entries whose
    /// listing no longer exists are left out.
    pub async fn describe(&self, session: &SessionKey) -> Result<Vec<CartLine>> {
        let cart = self.get(session).await?;
        if cart.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = cart.items().keys().copied().collect();
        let listings: HashMap<Uuid, _> = self.store.listings(&ids).await?.into_iter().map(|l| (l.id, l)).collect();
        Ok(cart
            .lines()
            .into_iter()
            .filter_map(|(id, qty)| {
                listings.get(&id).map(|l| CartLine {
                    product_info: id,
                    product: l.product.clone(),
                    shop: l.shop.clone(),
                    price: l.price,
                    quantity: qty.value(),
                })
            })
            .collect())
    }

    async fn save(&self, session: &SessionKey, cart: &Cart) -> Result<()> {
        let value = serde_json::to_value(cart).map_err(|e| ShopError::Storage(e.to_string()))?;
        Ok(self.sessions.save(session, CART_KEY, value).await?)
    }
}
