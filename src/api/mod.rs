//! HTTP surface.

pub mod error;
pub mod extract;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::domain::aggregates::{Contact, ContactKind, ListingDetail, Listing, OrderSummary};
use crate::notify::Notifier;
use crate::services::{CartLine, CartService, CatalogService, ContactService, ImportReconciler, ImportReport, OrderEngine};
use crate::session::SessionStore;
use crate::store::Store;
use crate::ShopError;
use extract::{CurrentUser, OptionalSession, Session, ValidatedJson};

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub cart: CartService,
    pub contacts: ContactService,
    pub orders: OrderEngine,
    pub importer: ImportReconciler,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, sessions: Arc<dyn SessionStore>, notifier: Notifier) -> Self {
        let cart = CartService::new(sessions, store.clone());
        Self {
            catalog: CatalogService::new(store.clone()),
            contacts: ContactService::new(store.clone()),
            orders: OrderEngine::new(store.clone(), cart.clone(), notifier),
            importer: ImportReconciler::new(store),
            cart,
        }
    }
}

pub fn router(state: AppState, import_max_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "shop-orders"})) }))
        .route("/api/v1/catalog", get(list_catalog))
        .route("/api/v1/catalog/:id", get(get_listing))
        .route("/api/v1/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
        .route("/api/v1/cart/:product_info", delete(remove_from_cart))
        .route("/api/v1/contacts", get(list_contacts).post(create_contact))
        .route("/api/v1/contacts/:id", get(get_contact).delete(delete_contact))
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/import", post(import_feed))
        .layer(DefaultBodyLimit::max(import_max_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CartItemRequest {
    pub product_info: Uuid,
    #[serde(default = "one")]
    #[validate(range(min = 1))]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[serde(rename = "type", default)]
    pub kind: ContactKind,
    #[validate(length(min = 1, max = 100))]
    pub value: String,
}

/// `items` empty means "order the session cart".
#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub contact: Uuid,
    #[serde(default)]
    pub items: Vec<CartItemRequest>,
}

impl Validate for OrderRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.items.iter().try_for_each(Validate::validate)
    }
}

async fn list_catalog(State(s): State<AppState>) -> Result<Json<Vec<Listing>>, ShopError> {
    Ok(Json(s.catalog.list_available().await?))
}

async fn get_listing(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ListingDetail>, ShopError> {
    Ok(Json(s.catalog.listing(id).await?))
}

async fn get_cart(State(s): State<AppState>, Session(key): Session) -> Result<Json<Vec<CartLine>>, ShopError> {
    Ok(Json(s.cart.describe(&key).await?))
}

async fn add_to_cart(State(s): State<AppState>, Session(key): Session, ValidatedJson(body): ValidatedJson<CartItemRequest>) -> Result<Json<Vec<CartLine>>, ShopError> {
    s.cart.add(&key, body.product_info, body.quantity).await?;
    Ok(Json(s.cart.describe(&key).await?))
}

async fn remove_from_cart(State(s): State<AppState>, Session(key): Session, Path(product_info): Path<Uuid>) -> Result<Json<Vec<CartLine>>, ShopError> {
    s.cart.remove(&key, product_info).await?;
    Ok(Json(s.cart.describe(&key).await?))
}

async fn clear_cart(State(s): State<AppState>, Session(key): Session) -> Result<StatusCode, ShopError> {
    s.cart.clear(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_contacts(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Vec<Contact>>, ShopError> {
    Ok(Json(s.contacts.list(&user).await?))
}

async fn create_contact(State(s): State<AppState>, CurrentUser(user): CurrentUser, ValidatedJson(body): ValidatedJson<ContactRequest>) -> Result<(StatusCode, Json<Contact>), ShopError> {
    let contact = s.contacts.create(&user, body.kind, &body.value).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

async fn get_contact(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<Uuid>) -> Result<Json<Contact>, ShopError> {
    Ok(Json(s.contacts.get(&user, id).await?))
}

async fn delete_contact(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<Uuid>) -> Result<StatusCode, ShopError> {
    s.contacts.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_orders(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Vec<OrderSummary>>, ShopError> {
    Ok(Json(s.orders.orders_for(&user).await?))
}

async fn create_order(State(s): State<AppState>, CurrentUser(user): CurrentUser, OptionalSession(session): OptionalSession, ValidatedJson(body): ValidatedJson<OrderRequest>) -> Result<(StatusCode, Json<Value>), ShopError> {
    let items: Vec<(Uuid, u32)> = body.items.iter().map(|i| (i.product_info, i.quantity)).collect();
    let order_id = match session {
        Some(key) => s.orders.checkout(&user, &key, body.contact, &items).await?,
        None => s.orders.create_order(&user, body.contact, &items).await?,
    };
    Ok((StatusCode::CREATED, Json(json!({ "order_id": order_id }))))
}

async fn import_feed(State(s): State<AppState>, CurrentUser(user): CurrentUser, mut multipart: Multipart) -> Result<Json<ImportReport>, ShopError> {
    user.require_supplier()?;
    while let Some(field) = multipart.next_field().await.map_err(|e| ShopError::validation(e.to_string()))? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ShopError::validation("uploaded file has no name"))?;
        let raw = field.bytes().await.map_err(|e| ShopError::validation(e.to_string()))?;
        return Ok(Json(s.importer.import_feed(&user, &filename, &raw).await?));
    }
    Err(ShopError::validation("multipart field 'file' is required"))
}
