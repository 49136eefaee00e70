//! Supplier catalog import.
//!
//! Reconciles a feed against the catalog: shop, categories, products,
//! listings and parameters are found by their natural keys and created or
//! updated in place, so importing the same feed twice changes nothing the
//! second time. Every record is applied in its own transaction; a record
//! that loses a unique-key race with a concurrent import is retried.

pub mod feed;

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Principal;
use crate::domain::aggregates::{Category, Parameter, Product, ProductParameter, Shop, UNCATEGORIZED, UNKNOWN_SHOP};
use crate::store::{Store, StoreError, StoreResult, StoreTx};
use crate::{Result, ShopError};

pub use feed::{Feed, FeedFormat, ProductRecord};

const MAX_UPSERT_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// A feed record that was not applied, by position in the feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
}

#[derive(Clone)]
pub struct ImportReconciler {
    store: Arc<dyn Store>,
}

impl ImportReconciler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Imports an uploaded feed. Only suppliers may import.
    pub async fn import_feed(&self, principal: &Principal, filename: &str, raw: &[u8]) -> Result<ImportReport> {
        principal.require_supplier()?;
        let feed = feed::parse(filename, raw)?;
        let shop_name = feed.shop.unwrap_or_else(|| UNKNOWN_SHOP.to_string());
        let shop = retry_unique(|| self.upsert_shop(&shop_name)).await?;

        let mut report = ImportReport::default();
        for (index, raw) in feed.records.iter().enumerate() {
            let record = match ProductRecord::from_value(raw) {
                Ok(record) => record,
                Err(reason) => {
                    debug!(index, %reason, "skipping feed record");
                    report.skipped.push(SkippedRecord { index, reason });
                    continue;
                }
            };
            match retry_unique(|| self.apply_record(&shop, &record)).await {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Err(e @ (ShopError::Conflict(_) | ShopError::Validation(_))) => {
                    warn!(index, product = %record.name, error = %e, "feed record not applied");
                    report.skipped.push(SkippedRecord { index, reason: e.to_string() });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            shop = %shop.name,
            user_id = %principal.user_id,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped.len(),
            "feed imported"
        );
        Ok(report)
    }

    async fn upsert_shop(&self, name: &str) -> StoreResult<Shop> {
        let mut tx = self.store.begin().await?;
        if let Some(shop) = tx.find_shop(name).await? {
            return Ok(shop);
        }
        let shop = Shop::new(name);
        tx.insert_shop(&shop).await?;
        tx.commit().await?;
        Ok(shop)
    }

    async fn apply_record(&self, shop: &Shop, record: &ProductRecord) -> StoreResult<Outcome> {
        let mut tx = self.store.begin().await?;

        let category = find_or_create_category(tx.as_mut(), record.category.as_deref().unwrap_or(UNCATEGORIZED)).await?;
        tx.link_category_to_shop(category.id, shop.id).await?;
        let product = find_or_create_product(tx.as_mut(), &record.name, category.id).await?;

        let (info, outcome) = match tx.lock_product_info_by_key(product.id, shop.id).await? {
            Some(mut info) => {
                record.apply_to(&mut info);
                tx.update_product_info(&info).await?;
                (info, Outcome::Updated)
            }
            None => {
                let info = record.new_listing(product.id, shop.id);
                tx.insert_product_info(&info).await?;
                (info, Outcome::Created)
            }
        };

        for (name, value) in &record.parameters {
            let parameter = find_or_create_parameter(tx.as_mut(), name).await?;
            match tx.find_product_parameter(info.id, parameter.id).await? {
                Some(existing) if existing.value == *value => {}
                Some(existing) => tx.set_product_parameter_value(existing.id, value).await?,
                None => tx.insert_product_parameter(&ProductParameter::new(info.id, parameter.id, value.as_str())).await?,
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

/// Runs `attempt` again when it loses a unique-key race.
async fn retry_unique<T, F, Fut>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(StoreError::UniqueViolation(key)) if tries < MAX_UPSERT_ATTEMPTS => {
                debug!(%key, tries, "unique key race, retrying");
                tries += 1;
            }
            other => return other.map_err(ShopError::from),
        }
    }
}

async fn find_or_create_category(tx: &mut dyn StoreTx, name: &str) -> StoreResult<Category> {
    if let Some(category) = tx.find_category(name).await? {
        return Ok(category);
    }
    let category = Category::new(name);
    tx.insert_category(&category).await?;
    Ok(category)
}

async fn find_or_create_product(tx: &mut dyn StoreTx, name: &str, category_id: Uuid) -> StoreResult<Product> {
    if let Some(product) = tx.find_product(name, category_id).await? {
        return Ok(product);
    }
    let product = Product::new(name, category_id);
    tx.insert_product(&product).await?;
    Ok(product)
}

async fn find_or_create_parameter(tx: &mut dyn StoreTx, name: &str) -> StoreResult<Parameter> {
    if let Some(parameter) = tx.find_parameter(name).await? {
        return Ok(parameter);
    }
    let parameter = Parameter::new(name);
    tx.insert_parameter(&parameter).await?;
    Ok(parameter)
}
