//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Price, Quantity};

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    user_id: Uuid,
    contact_id: Option<Uuid>,
    dt: DateTime<Utc>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total: Decimal,
    events: Vec<OrderEvent>,
}

/// One line of an order. `price` is the listing price captured when the
/// order was placed and never follows later catalog changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderItem { pub id: Uuid, pub order_id: Uuid, pub product_info_id: Uuid, pub quantity: Quantity, pub price: Price }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Draft, New, Confirmed, Shipped, Delivered, Canceled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft", Self::New => "new", Self::Confirmed => "confirmed",
            Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Canceled => "canceled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft), "new" => Ok(Self::New), "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped), "delivered" => Ok(Self::Delivered), "canceled" => Ok(Self::Canceled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl Order {
    pub fn create(user_id: Uuid, contact_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(), user_id, contact_id: Some(contact_id), dt: Utc::now(),
            status: OrderStatus::Draft, items: vec![], total: Decimal::ZERO, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn contact_id(&self) -> Option<Uuid> { self.contact_id }
    pub fn dt(&self) -> DateTime<Utc> { self.dt }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn total(&self) -> Decimal { self.total }

    pub fn add_item(&mut self, product_info_id: Uuid, quantity: Quantity, price: Price) -> Result<(), OrderError> {
        if self.status != OrderStatus::Draft { return Err(OrderError::AlreadyPlaced); }
        if self.items.iter().any(|i| i.product_info_id == product_info_id) { return Err(OrderError::DuplicateItem(product_info_id)); }
        self.total = price.line_total(quantity).and_then(|t| self.total.checked_add(t)).ok_or(OrderError::TotalOverflow)?;
        self.items.push(OrderItem { id: Uuid::now_v7(), order_id: self.id, product_info_id, quantity, price });
        Ok(())
    }

    /// Moves the draft to `new` and records the placement event.
    pub fn place(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Draft { return Err(OrderError::AlreadyPlaced); }
        if self.items.is_empty() { return Err(OrderError::NoItems); }
        self.status = OrderStatus::New;
        self.raise_event(OrderEvent::Placed { order_id: self.id, user_id: self.user_id, lines: self.items.len(), total: self.total() });
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(e); }
}

/// Read model of a stored order as shown to its owner.
#[derive(Clone, Debug, Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub dt: DateTime<Utc>,
    pub status: OrderStatus,
    pub contact_id: Option<Uuid>,
    pub total: Decimal,
    pub items: Vec<OrderLine>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderLine { pub product_info: Uuid, pub product: String, pub shop: String, pub quantity: u32, pub price: Decimal }

impl OrderSummary {
    pub fn new(id: Uuid, dt: DateTime<Utc>, status: OrderStatus, contact_id: Option<Uuid>, items: Vec<OrderLine>) -> Result<Self, OrderError> {
        let total = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| l.price.checked_mul(Decimal::from(l.quantity)).and_then(|t| acc.checked_add(t)))
            .ok_or(OrderError::TotalOverflow)?;
        Ok(Self { id, dt, status, contact_id, total, items })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, AlreadyPlaced, DuplicateItem(Uuid), TotalOverflow, UnknownStatus(String) }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "order has no items"),
            Self::AlreadyPlaced => write!(f, "order already placed"),
            Self::DuplicateItem(id) => write!(f, "listing {id} appears twice in the order"),
            Self::TotalOverflow => write!(f, "order total is too large"),
            Self::UnknownStatus(s) => write!(f, "unknown order status '{s}'"),
        }
    }
}
