//! Cart Aggregate
//!
//! Session-scoped mapping of listing id to requested quantity. Stock is not
//! checked here; the order engine re-validates everything under lock.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use crate::domain::value_objects::Quantity;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: BTreeMap<Uuid, Quantity>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn items(&self) -> &BTreeMap<Uuid, Quantity> { &self.items }
    pub fn quantity_of(&self, product_info_id: Uuid) -> Option<Quantity> { self.items.get(&product_info_id).copied() }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds `quantity` units, summing with an existing entry for the same listing.
    pub fn add_item(&mut self, product_info_id: Uuid, quantity: Quantity) -> Result<(), CartError> {
        let merged = match self.items.get(&product_info_id) {
            Some(existing) => existing.checked_add(quantity).map_err(|_| CartError::QuantityOverflow)?,
            None => quantity,
        };
        self.items.insert(product_info_id, merged);
        Ok(())
    }

    pub fn remove_item(&mut self, product_info_id: Uuid) -> Result<(), CartError> {
        self.items.remove(&product_info_id).map(|_| ()).ok_or(CartError::ItemNotFound)
    }

    /// Entries as `(product_info_id, quantity)` pairs in id order.
    pub fn lines(&self) -> Vec<(Uuid, Quantity)> { self.items.iter().map(|(id, q)| (*id, *q)).collect() }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound, QuantityOverflow }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::ItemNotFound => write!(f, "item not in cart"), Self::QuantityOverflow => write!(f, "cart quantity too large") }
    }
}
