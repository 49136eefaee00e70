//! Aggregates module
pub mod order;
pub mod cart;
pub mod catalog;
pub mod contact;

pub use order::{Order, OrderError, OrderItem, OrderLine, OrderStatus, OrderSummary};
pub use cart::{Cart, CartError};
pub use catalog::{Category, Listing, ListingDetail, Parameter, Product, ProductInfo, ProductParameter, Shop, MAX_STOCK, UNCATEGORIZED, UNKNOWN_SHOP};
pub use contact::{Contact, ContactKind};
