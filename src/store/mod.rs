//! Persistence seam.
//!
//! `Store` exposes read projections and opens `StoreTx` units of work. Every
//! write the order engine and the import reconciler perform goes through a
//! transaction, and dropping a transaction without `commit` rolls it back.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{
    Category, Contact, Listing, Order, OrderSummary, Parameter, Product, ProductInfo, ProductParameter, Shop,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key already holds a row (e.g. two importers racing on one name).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored row could not be mapped back into the domain.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// Listings with `quantity > 0`.
    async fn list_available(&self) -> StoreResult<Vec<Listing>>;
    /// Listings by id regardless of stock; unknown ids are left out.
    async fn listings(&self, ids: &[Uuid]) -> StoreResult<Vec<Listing>>;
    async fn parameters_for(&self, product_info_id: Uuid) -> StoreResult<BTreeMap<String, String>>;

    /// Orders of one user, newest first.
    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OrderSummary>>;

    async fn insert_contact(&self, contact: &Contact) -> StoreResult<()>;
    async fn contacts_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Contact>>;
    async fn find_contact(&self, id: Uuid) -> StoreResult<Option<Contact>>;
    /// Deletes the contact; orders that referenced it keep existing without it.
    async fn delete_contact(&self, id: Uuid) -> StoreResult<bool>;
}

/// One atomic unit of work. `lock_*` methods hold the row exclusively until
/// the transaction ends.
#[async_trait]
pub trait StoreTx: Send {
    async fn contact(&mut self, id: Uuid) -> StoreResult<Option<Contact>>;

    async fn lock_product_info(&mut self, id: Uuid) -> StoreResult<Option<ProductInfo>>;
    async fn lock_product_info_by_key(&mut self, product_id: Uuid, shop_id: Uuid) -> StoreResult<Option<ProductInfo>>;
    async fn insert_product_info(&mut self, info: &ProductInfo) -> StoreResult<()>;
    async fn update_product_info(&mut self, info: &ProductInfo) -> StoreResult<()>;
    async fn set_product_info_quantity(&mut self, id: Uuid, quantity: u32) -> StoreResult<()>;

    /// Persists the order together with all of its items.
    async fn insert_order(&mut self, order: &Order) -> StoreResult<()>;

    async fn find_shop(&mut self, name: &str) -> StoreResult<Option<Shop>>;
    async fn insert_shop(&mut self, shop: &Shop) -> StoreResult<()>;
    async fn find_category(&mut self, name: &str) -> StoreResult<Option<Category>>;
    async fn insert_category(&mut self, category: &Category) -> StoreResult<()>;
    /// Idempotent.
    async fn link_category_to_shop(&mut self, category_id: Uuid, shop_id: Uuid) -> StoreResult<()>;
    async fn find_product(&mut self, name: &str, category_id: Uuid) -> StoreResult<Option<Product>>;
    async fn insert_product(&mut self, product: &Product) -> StoreResult<()>;
    async fn find_parameter(&mut self, name: &str) -> StoreResult<Option<Parameter>>;
    async fn insert_parameter(&mut self, parameter: &Parameter) -> StoreResult<()>;
    async fn find_product_parameter(&mut self, product_info_id: Uuid, parameter_id: Uuid) -> StoreResult<Option<ProductParameter>>;
    async fn insert_product_parameter(&mut self, pp: &ProductParameter) -> StoreResult<()>;
    async fn set_product_parameter_value(&mut self, id: Uuid, value: &str) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
