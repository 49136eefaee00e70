//! Application services on top of the store and session seams.

pub mod cart;
pub mod catalog;
pub mod contacts;
pub mod import;
pub mod orders;

pub use cart::{CartLine, CartService};
pub use catalog::CatalogService;
pub use contacts::ContactService;
pub use import::{ImportReconciler, ImportReport, SkippedRecord};
pub use orders::OrderEngine;
