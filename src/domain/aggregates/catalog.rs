//! Catalog entities
//!
//! `Product` is the seller-independent item; `ProductInfo` is one shop's
//! listing of it and is what carts and orders reference.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;
use crate::domain::value_objects::Price;

/// Shop name used when a feed does not name its shop.
pub const UNKNOWN_SHOP: &str = "Unknown Shop";
/// Category name used when a feed record has no category.
pub const UNCATEGORIZED: &str = "Uncategorized";
/// Largest stock a listing can hold; the column is a signed 32-bit integer.
pub const MAX_STOCK: u32 = i32::MAX as u32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shop { pub id: Uuid, pub name: String, pub url: Option<String> }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category { pub id: Uuid, pub name: String }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Product { pub id: Uuid, pub name: String, pub category_id: Uuid }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductInfo {
    pub id: Uuid,
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub price: Price,
    pub price_rrc: Price,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter { pub id: Uuid, pub name: String }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductParameter { pub id: Uuid, pub product_info_id: Uuid, pub parameter_id: Uuid, pub value: String }

impl Shop {
    pub fn new(name: impl Into<String>) -> Self { Self { id: Uuid::now_v7(), name: name.into(), url: None } }
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self { Self { id: Uuid::now_v7(), name: name.into() } }
}

impl Product {
    pub fn new(name: impl Into<String>, category_id: Uuid) -> Self { Self { id: Uuid::now_v7(), name: name.into(), category_id } }
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self { Self { id: Uuid::now_v7(), name: name.into() } }
}

impl ProductParameter {
    pub fn new(product_info_id: Uuid, parameter_id: Uuid, value: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), product_info_id, parameter_id, value: value.into() }
    }
}

/// Catalog row as browsed by customers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub id: Uuid,
    pub product: String,
    pub category: String,
    pub shop: String,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    pub price_rrc: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub parameters: BTreeMap<String, String>,
}
