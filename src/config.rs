//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_URL` - `PostgreSQL` connection string; without it the service
//!   runs on the in-memory store
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `NATS_URL` - NATS server for outgoing email notifications; without it
//!   notifications are only logged
//! - `NOTIFY_SUBJECT` - NATS subject for notifications (default: shop.notifications.email)
//! - `NOTIFY_QUEUE_CAPACITY` - Pending notifications kept in memory (default: 1024)
//! - `IMPORT_MAX_BYTES` - Upload limit for feed imports (default: 10 MiB)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_PORT: u16 = 8083;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_NOTIFY_SUBJECT: &str = "shop.notifications.email";
const DEFAULT_NOTIFY_QUEUE: usize = 1024;
const DEFAULT_IMPORT_MAX_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    Invalid(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub notify_subject: String,
    pub notify_queue_capacity: usize,
    pub import_max_bytes: usize,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            host: parse_or(var("HOST"), "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or(var("PORT"), "PORT", DEFAULT_PORT)?,
            database_url: var("DATABASE_URL"),
            max_connections: positive(parse_or(var("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?, "DATABASE_MAX_CONNECTIONS")?,
            nats_url: var("NATS_URL"),
            notify_subject: var("NOTIFY_SUBJECT").unwrap_or_else(|| DEFAULT_NOTIFY_SUBJECT.to_string()),
            notify_queue_capacity: positive(parse_or(var("NOTIFY_QUEUE_CAPACITY"), "NOTIFY_QUEUE_CAPACITY", DEFAULT_NOTIFY_QUEUE)?, "NOTIFY_QUEUE_CAPACITY")?,
            import_max_bytes: positive(parse_or(var("IMPORT_MAX_BYTES"), "IMPORT_MAX_BYTES", DEFAULT_IMPORT_MAX_BYTES)?, "IMPORT_MAX_BYTES")?,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn positive<T: PartialEq + Default>(value: T, name: &str) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::Invalid(name.to_string(), "must be greater than zero".to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.port, 8083);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.notify_subject, "shop.notifications.email");
        assert_eq!(cfg.socket_addr().to_string(), "0.0.0.0:8083");
    }

    #[test]
    fn test_overrides() {
        let cfg = load(&[("PORT", "9000"), ("HOST", "127.0.0.1"), ("DATABASE_URL", "postgres://shop@localhost/shop"), ("NATS_URL", " ")]).unwrap();
        assert_eq!(cfg.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://shop@localhost/shop"));
        assert_eq!(cfg.nats_url, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(load(&[("PORT", "eighty")]), Err(ConfigError::Invalid(v, _)) if v == "PORT"));
        assert!(matches!(load(&[("NOTIFY_QUEUE_CAPACITY", "0")]), Err(ConfigError::Invalid(v, _)) if v == "NOTIFY_QUEUE_CAPACITY"));
    }
}
