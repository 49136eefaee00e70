//! Domain events
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq)]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, lines: usize, total: Decimal },
}
