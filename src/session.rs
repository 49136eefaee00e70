//! Session-scoped key/value storage.
//!
//! The cart lives here. Values are JSON documents addressed by
//! `(session key, name)`; nothing outlives the session itself.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::StoreResult;
use crate::ShopError;

const MAX_SESSION_KEY_LEN: usize = 128;

/// Opaque session token supplied by the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(value: impl Into<String>) -> Result<Self, ShopError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(ShopError::validation("session key is empty")); }
        if value.len() > MAX_SESSION_KEY_LEN { return Err(ShopError::validation("session key too long")); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session: &SessionKey, name: &str) -> StoreResult<Option<Value>>;
    async fn save(&self, session: &SessionKey, name: &str, value: Value) -> StoreResult<()>;
    async fn remove(&self, session: &SessionKey, name: &str) -> StoreResult<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    data: Arc<RwLock<HashMap<(String, String), Value>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session: &SessionKey, name: &str) -> StoreResult<Option<Value>> {
        Ok(self.data.read().await.get(&(session.0.clone(), name.to_string())).cloned())
    }

    async fn save(&self, session: &SessionKey, name: &str, value: Value) -> StoreResult<()> {
        self.data.write().await.insert((session.0.clone(), name.to_string()), value);
        Ok(())
    }

    async fn remove(&self, session: &SessionKey, name: &str) -> StoreResult<()> {
        self.data.write().await.remove(&(session.0.clone(), name.to_string()));
        Ok(())
    }
}

/// Session values kept in the `session_data` table.
#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, session: &SessionKey, name: &str) -> StoreResult<Option<Value>> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT value FROM session_data WHERE session_key = $1 AND key = $2")
            .bind(session.as_str()).bind(name)
            .fetch_optional(&self.db).await?;
        Ok(row.map(|(v,)| v))
    }

    async fn save(&self, session: &SessionKey, name: &str, value: Value) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO session_data (session_key, key, value, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (session_key, key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(session.as_str()).bind(name).bind(&value)
        .execute(&self.db).await?;
        Ok(())
    }

    async fn remove(&self, session: &SessionKey, name: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM session_data WHERE session_key = $1 AND key = $2")
            .bind(session.as_str()).bind(name)
            .execute(&self.db).await?;
        Ok(())
    }
}
