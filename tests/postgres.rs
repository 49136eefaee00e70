//! Runs against a real database when `TEST_DATABASE_URL` is set; otherwise
//! every test returns early.

mod common;

use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use uuid::Uuid;

use shop_orders::api::AppState;
use shop_orders::notify::{LogTransport, Notifier};
use shop_orders::session::{PgSessionStore, SessionKey};
use shop_orders::store::{PgStore, Store};

use common::{buyer, supplier};

async fn state() -> Option<(AppState, Arc<PgStore>)> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = PgPoolOptions::new().max_connections(8).connect(&url).await.unwrap();
    PgStore::migrate(&db).await.unwrap();
    let store = Arc::new(PgStore::new(db.clone()));
    let (notifier, _worker) = Notifier::spawn(Arc::new(LogTransport), 16);
    Some((AppState::new(store.clone(), Arc::new(PgSessionStore::new(db)), notifier), store))
}

async fn seed(state: &AppState, shop: &str, product: &str, quantity: u32) -> Uuid {
    let feed = json!({"shop": {"name": shop}, "products": [{"name": product, "category": "Tests", "quantity": quantity, "price": "10.00"}]});
    let report = state.importer.import_feed(&supplier(), "feed.json", &serde_json::to_vec(&feed).unwrap()).await.unwrap();
    assert_eq!(report.skipped, vec![]);
    state.catalog.list_available().await.unwrap().into_iter().find(|l| l.shop == shop && l.product == product).unwrap().id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn row_locks_prevent_oversell() {
    let Some((state, store)) = state().await else { return };
    let shop = format!("pg-shop-{}", Uuid::now_v7());
    let id = seed(&state, &shop, "Widget", 5).await;

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let user = buyer();
        let contact = state.contacts.create(&user, Default::default(), "Somewhere 1").await.unwrap().id;
        let orders = state.orders.clone();
        tasks.push(tokio::spawn(async move { orders.create_order(&user, contact, &[(id, 1)]).await }));
    }
    let mut sold = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            sold += 1;
        }
    }
    assert_eq!(sold, 5);
    assert_eq!(store.listings(&[id]).await.unwrap()[0].quantity, 0);
}

#[tokio::test]
async fn reimport_is_idempotent() {
    let Some((state, _)) = state().await else { return };
    let shop = format!("pg-shop-{}", Uuid::now_v7());
    let first = seed(&state, &shop, "Gizmo", 2).await;
    let second = seed(&state, &shop, "Gizmo", 2).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn session_cart_survives_in_database() {
    let Some((state, _)) = state().await else { return };
    let session = SessionKey::new(format!("pg-session-{}", Uuid::now_v7())).unwrap();
    let item = Uuid::now_v7();
    state.cart.add(&session, item, 2).await.unwrap();
    assert_eq!(state.cart.get(&session).await.unwrap().quantity_of(item).map(|q| q.value()), Some(2));
    state.cart.clear(&session).await.unwrap();
    assert!(state.cart.get(&session).await.unwrap().is_empty());
}
