#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use shop_orders::api::AppState;
use shop_orders::auth::Principal;
use shop_orders::domain::aggregates::{ContactKind, Listing};
use shop_orders::notify::{MailTransport, Notification, NotifyError, Notifier};
use shop_orders::session::MemorySessionStore;
use shop_orders::store::{MemoryStore, Store};

#[derive(Default)]
pub struct Outbox(pub Mutex<Vec<Notification>>);

#[async_trait]
impl MailTransport for Outbox {
    async fn send(&self, n: &Notification) -> Result<(), NotifyError> {
        self.0.lock().await.push(n.clone());
        Ok(())
    }
}

impl Outbox {
    /// Waits briefly for the notification worker to catch up.
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            {
                let sent = self.0.lock().await;
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.0.lock().await.clone()
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub outbox: Arc<Outbox>,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let outbox = Arc::new(Outbox::default());
    let (notifier, _worker) = Notifier::spawn(outbox.clone(), 64);
    let state = AppState::new(store.clone(), Arc::new(MemorySessionStore::new()), notifier);
    Harness { store, state, outbox }
}

pub fn supplier() -> Principal {
    Principal::supplier(Uuid::now_v7(), Some("supplier@shop.com".into()))
}

pub fn buyer() -> Principal {
    Principal::customer(Uuid::now_v7(), Some("buyer@mail.com".into()))
}

impl Harness {
    pub async fn import_json(&self, feed: serde_json::Value) -> shop_orders::services::ImportReport {
        let raw = serde_json::to_vec(&feed).unwrap();
        self.state.importer.import_feed(&supplier(), "feed.json", &raw).await.unwrap()
    }

    /// In-stock listing by name.
    pub async fn listing(&self, name: &str) -> Listing {
        let t = self.store.list_available().await.unwrap();
        t.into_iter().find(|l| l.name == name).unwrap_or_else(|| panic!("no listing named {name}"))
    }

    pub async fn stock(&self, id: Uuid) -> u32 {
        self.store.listings(&[id]).await.unwrap()[0].quantity
    }

    pub async fn contact_for(&self, principal: &Principal) -> Uuid {
        self.state.contacts.create(principal, ContactKind::Address, "Moscow, Tverskaya 1").await.unwrap().id
    }
}
