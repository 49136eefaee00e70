//! Shop Orders - online shop backend

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shop_orders::api::{self, AppState};
use shop_orders::config::AppConfig;
use shop_orders::notify::{self, Notifier};
use shop_orders::session::{MemorySessionStore, PgSessionStore, SessionStore};
use shop_orders::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let (store, sessions): (Arc<dyn Store>, Arc<dyn SessionStore>) = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.max_connections).connect(url).await?;
            PgStore::migrate(&db).await?;
            (Arc::new(PgStore::new(db.clone())), Arc::new(PgSessionStore::new(db)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            (Arc::new(MemoryStore::new()), Arc::new(MemorySessionStore::new()))
        }
    };

    let transport = notify::transport_from(config.nats_url.as_deref(), &config.notify_subject).await;
    let (notifier, _worker) = Notifier::spawn(transport, config.notify_queue_capacity);

    let app = api::router(AppState::new(store, sessions, notifier), config.import_max_bytes);
    let addr = config.socket_addr();
    tracing::info!("Shop Orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
