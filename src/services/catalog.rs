use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Listing, ListingDetail};
use crate::store::Store;
use crate::{Result, ShopError};

/// Read-only view of sellable listings.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Listings that currently have stock.
    pub async fn list_available(&self) -> Result<Vec<Listing>> {
        Ok(self.store.list_available().await?)
    }

    pub async fn listing(&self, product_info_id: Uuid) -> Result<ListingDetail> {
        let listing = self
            .store
            .listings(&[product_info_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ShopError::not_found(format!("product info {product_info_id}")))?;
        let parameters = self.store.parameters_for(product_info_id).await?;
        Ok(ListingDetail { listing, parameters })
    }
}
