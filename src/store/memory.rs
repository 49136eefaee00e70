use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, StoreTx};
use crate::domain::aggregates::{
    Category, Contact, Listing, Order, OrderItem, OrderLine, OrderStatus, OrderSummary, Parameter, Product,
    ProductInfo, ProductParameter, Shop,
};

#[derive(Debug, Clone)]
struct OrderRow {
    user_id: Uuid,
    contact_id: Option<Uuid>,
    dt: DateTime<Utc>,
    status: OrderStatus,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    shops: HashMap<Uuid, Shop>,
    categories: HashMap<Uuid, Category>,
    shop_categories: HashSet<(Uuid, Uuid)>,
    products: HashMap<Uuid, Product>,
    product_infos: HashMap<Uuid, ProductInfo>,
    parameters: HashMap<Uuid, Parameter>,
    product_parameters: HashMap<Uuid, ProductParameter>,
    contacts: HashMap<Uuid, Contact>,
    orders: HashMap<Uuid, OrderRow>,
    order_items: Vec<OrderItem>,
}

impl Tables {
    fn listing(&self, info: &ProductInfo) -> StoreResult<Listing> {
        let product = self.products.get(&info.product_id)
            .ok_or_else(|| StoreError::Corrupt(format!("product_info {} has no product", info.id)))?;
        let category = self.categories.get(&product.category_id)
            .ok_or_else(|| StoreError::Corrupt(format!("product {} has no category", product.id)))?;
        let shop = self.shops.get(&info.shop_id)
            .ok_or_else(|| StoreError::Corrupt(format!("product_info {} has no shop", info.id)))?;
        Ok(Listing {
            id: info.id,
            product: product.name.clone(),
            category: category.name.clone(),
            shop: shop.name.clone(),
            name: info.name.clone(),
            quantity: info.quantity,
            price: info.price.amount(),
            price_rrc: info.price_rrc.amount(),
        })
    }

    fn unique<'a, T: 'a>(mut rows: impl Iterator<Item = &'a T>, pred: impl Fn(&T) -> bool, what: &str) -> StoreResult<()> {
        if rows.any(|r| pred(r)) { Err(StoreError::UniqueViolation(what.to_string())) } else { Ok(()) }
    }
}

/// In-memory store.
///
/// Intended for tests/dev. Transactions are serialized behind one async
/// mutex and work on a copy of the tables that replaces the shared state on
/// commit, so an uncommitted transaction leaves nothing behind.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn list_available(&self) -> StoreResult<Vec<Listing>> {
        let t = self.tables.lock().await;
        let mut listings = t.product_infos.values().filter(|pi| pi.quantity > 0).map(|pi| t.listing(pi)).collect::<StoreResult<Vec<_>>>()?;
        listings.sort_by(|a, b| a.product.cmp(&b.product).then_with(|| a.shop.cmp(&b.shop)));
        Ok(listings)
    }

    async fn listings(&self, ids: &[Uuid]) -> StoreResult<Vec<Listing>> {
        let t = self.tables.lock().await;
        ids.iter().filter_map(|id| t.product_infos.get(id)).map(|pi| t.listing(pi)).collect()
    }

    async fn parameters_for(&self, product_info_id: Uuid) -> StoreResult<BTreeMap<String, String>> {
        let t = self.tables.lock().await;
        t.product_parameters
            .values()
            .filter(|pp| pp.product_info_id == product_info_id)
            .map(|pp| {
                let name = t.parameters.get(&pp.parameter_id)
                    .ok_or_else(|| StoreError::Corrupt(format!("product_parameter {} has no parameter", pp.id)))?;
                Ok((name.name.clone(), pp.value.clone()))
            })
            .collect()
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OrderSummary>> {
        let t = self.tables.lock().await;
        let mut orders = Vec::new();
        for (id, row) in t.orders.iter().filter(|(_, o)| o.user_id == user_id) {
            let mut lines = Vec::new();
            for item in t.order_items.iter().filter(|i| i.order_id == *id) {
                let info = t.product_infos.get(&item.product_info_id)
                    .ok_or_else(|| StoreError::Corrupt(format!("order_item {} has no product_info", item.id)))?;
                let listing = t.listing(info)?;
                lines.push(OrderLine {
                    product_info: item.product_info_id,
                    product: listing.product,
                    shop: listing.shop,
                    quantity: item.quantity.value(),
                    price: item.price.amount(),
                });
            }
            let summary = OrderSummary::new(*id, row.dt, row.status, row.contact_id, lines)
                .map_err(|e| StoreError::Corrupt(format!("order {id}: {e}")))?;
            orders.push(summary);
        }
        orders.sort_by(|a, b| b.dt.cmp(&a.dt).then_with(|| b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn insert_contact(&self, contact: &Contact) -> StoreResult<()> {
        self.tables.lock().await.contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn contacts_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Contact>> {
        let t = self.tables.lock().await;
        let mut contacts: Vec<Contact> = t.contacts.values().filter(|c| c.user_id == user_id).cloned().collect();
        contacts.sort_by_key(|c| c.id);
        Ok(contacts)
    }

    async fn find_contact(&self, id: Uuid) -> StoreResult<Option<Contact>> {
        Ok(self.tables.lock().await.contacts.get(&id).cloned())
    }

    async fn delete_contact(&self, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.lock().await;
        if t.contacts.remove(&id).is_none() {
            return Ok(false);
        }
        for order in t.orders.values_mut().filter(|o| o.contact_id == Some(id)) {
            order.contact_id = None;
        }
        Ok(true)
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

impl MemoryTx {
    fn product_info_mut(&mut self, id: Uuid) -> StoreResult<&mut ProductInfo> {
        self.work.product_infos.get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("product_info {id} vanished inside transaction")))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn contact(&mut self, id: Uuid) -> StoreResult<Option<Contact>> {
        Ok(self.work.contacts.get(&id).cloned())
    }

    async fn lock_product_info(&mut self, id: Uuid) -> StoreResult<Option<ProductInfo>> {
        Ok(self.work.product_infos.get(&id).cloned())
    }

    async fn lock_product_info_by_key(&mut self, product_id: Uuid, shop_id: Uuid) -> StoreResult<Option<ProductInfo>> {
        Ok(self.work.product_infos.values().find(|pi| pi.product_id == product_id && pi.shop_id == shop_id).cloned())
    }

    async fn insert_product_info(&mut self, info: &ProductInfo) -> StoreResult<()> {
        Tables::unique(self.work.product_infos.values(), |pi: &ProductInfo| pi.product_id == info.product_id && pi.shop_id == info.shop_id, "product_infos(product_id, shop_id)")?;
        self.work.product_infos.insert(info.id, info.clone());
        Ok(())
    }

    async fn update_product_info(&mut self, info: &ProductInfo) -> StoreResult<()> {
        *self.product_info_mut(info.id)? = info.clone();
        Ok(())
    }

    async fn set_product_info_quantity(&mut self, id: Uuid, quantity: u32) -> StoreResult<()> {
        self.product_info_mut(id)?.quantity = quantity;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        self.work.orders.insert(order.id(), OrderRow {
            user_id: order.user_id(),
            contact_id: order.contact_id(),
            dt: order.dt(),
            status: order.status(),
        });
        self.work.order_items.extend(order.items().iter().cloned());
        Ok(())
    }

    async fn find_shop(&mut self, name: &str) -> StoreResult<Option<Shop>> {
        Ok(self.work.shops.values().find(|s| s.name == name).cloned())
    }

    async fn insert_shop(&mut self, shop: &Shop) -> StoreResult<()> {
        Tables::unique(self.work.shops.values(), |s: &Shop| s.name == shop.name, "shops(name)")?;
        self.work.shops.insert(shop.id, shop.clone());
        Ok(())
    }

    async fn find_category(&mut self, name: &str) -> StoreResult<Option<Category>> {
        Ok(self.work.categories.values().find(|c| c.name == name).cloned())
    }

    async fn insert_category(&mut self, category: &Category) -> StoreResult<()> {
        Tables::unique(self.work.categories.values(), |c: &Category| c.name == category.name, "categories(name)")?;
        self.work.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn link_category_to_shop(&mut self, category_id: Uuid, shop_id: Uuid) -> StoreResult<()> {
        self.work.shop_categories.insert((shop_id, category_id));
        Ok(())
    }

    async fn find_product(&mut self, name: &str, category_id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.work.products.values().find(|p| p.name == name && p.category_id == category_id).cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> StoreResult<()> {
        Tables::unique(self.work.products.values(), |p: &Product| p.name == product.name && p.category_id == product.category_id, "products(name, category_id)")?;
        self.work.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn find_parameter(&mut self, name: &str) -> StoreResult<Option<Parameter>> {
        Ok(self.work.parameters.values().find(|p| p.name == name).cloned())
    }

    async fn insert_parameter(&mut self, parameter: &Parameter) -> StoreResult<()> {
        Tables::unique(self.work.parameters.values(), |p: &Parameter| p.name == parameter.name, "parameters(name)")?;
        self.work.parameters.insert(parameter.id, parameter.clone());
        Ok(())
    }

    async fn find_product_parameter(&mut self, product_info_id: Uuid, parameter_id: Uuid) -> StoreResult<Option<ProductParameter>> {
        Ok(self.work.product_parameters.values()
            .find(|pp| pp.product_info_id == product_info_id && pp.parameter_id == parameter_id)
            .cloned())
    }

    async fn insert_product_parameter(&mut self, pp: &ProductParameter) -> StoreResult<()> {
        Tables::unique(
            self.work.product_parameters.values(),
            |x: &ProductParameter| x.product_info_id == pp.product_info_id && x.parameter_id == pp.parameter_id,
            "product_parameters(product_info_id, parameter_id)",
        )?;
        self.work.product_parameters.insert(pp.id, pp.clone());
        Ok(())
    }

    async fn set_product_parameter_value(&mut self, id: Uuid, value: &str) -> StoreResult<()> {
        let pp = self.work.product_parameters.get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("product_parameter {id} vanished inside transaction")))?;
        pp.value = value.to_string();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
