//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `STORE_BACKEND` - `postgres` (default) or `memory`
//! - `DATABASE_URL` - Postgres connection string, required for `postgres`
//! - `DATABASE_MAX_CONNECTIONS` - pool size (default: 10)
//! - `PORT` - listen port on 0.0.0.0 (default: 8083)
//! - `LOG_LEVEL` - tracing filter used when `RUST_LOG` is unset (default: info)
//! - `NATS_URL` - publish domain events to this NATS server when set
//! - `BACKOFFICE_API_TOKENS` - comma-separated `subject:token` pairs accepted as bearer credentials

use std::env::VarError;
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;

use crate::domain::value_objects::CallerId;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend { Postgres { database_url: String, max_connections: u32 }, Memory }

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub nats_url: Option<String>,
    /// `(subject, token)` pairs.
    pub api_tokens: Vec<(CallerId, String)>,
}

/// Loads `.env` if present, then reads the process environment.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let or_default = |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_string()) };
    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar { var: var.to_string(), reason };

    let store = match or_default("STORE_BACKEND", "postgres").as_str() {
        "memory" => StoreBackend::Memory,
        "postgres" => {
            let database_url = lookup("DATABASE_URL").map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".into()))?;
            let max_connections = or_default("DATABASE_MAX_CONNECTIONS", "10")
                .parse::<u32>()
                .map_err(|e| invalid("DATABASE_MAX_CONNECTIONS", e.to_string()))?;
            StoreBackend::Postgres { database_url, max_connections }
        }
        other => return Err(invalid("STORE_BACKEND", format!("unknown backend {other:?}"))),
    };

    let port = or_default("PORT", "8083").parse::<u16>().map_err(|e| invalid("PORT", e.to_string()))?;
    let nats_url = lookup("NATS_URL").ok().filter(|u| !u.trim().is_empty());
    let api_tokens = parse_api_tokens(&or_default("BACKOFFICE_API_TOKENS", ""))?;

    Ok(AppConfig {
        store,
        bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        log_level: or_default("LOG_LEVEL", "info"),
        nats_url,
        api_tokens,
    })
}

fn parse_api_tokens(raw: &str) -> Result<Vec<(CallerId, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let invalid = |reason: &str| ConfigError::InvalidEnvVar { var: "BACKOFFICE_API_TOKENS".into(), reason: reason.into() };
            let (subject, token) = pair.split_once(':').ok_or_else(|| invalid("expected subject:token"))?;
            let token = token.trim();
            if token.is_empty() { return Err(invalid("empty token")); }
            let subject = CallerId::new(subject).map_err(|_| invalid("empty subject"))?;
            Ok((subject, token.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from_map<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| map.get(key).map(|v| (*v).to_string()).ok_or(VarError::NotPresent)
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let map = HashMap::new();
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "DATABASE_URL"), "got {result:?}");
    }

    #[test]
    fn test_defaults() {
        let map = HashMap::from([("DATABASE_URL", "postgres://localhost/backoffice")]);
        let config = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(config.store, StoreBackend::Postgres { database_url: "postgres://localhost/backoffice".into(), max_connections: 10 });
        assert_eq!(config.bind_addr.port(), 8083);
        assert_eq!(config.log_level, "info");
        assert!(config.nats_url.is_none());
        assert!(config.api_tokens.is_empty());
    }

    #[test]
    fn test_memory_backend_and_tokens() {
        let map = HashMap::from([("STORE_BACKEND", "memory"), ("BACKOFFICE_API_TOKENS", "alice:t1, bob:t2"), ("PORT", "9000")]);
        let config = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.api_tokens.len(), 2);
        assert_eq!(config.api_tokens[1].0.as_str(), "bob");
        assert_eq!(config.api_tokens[1].1, "t2");
    }

    #[test]
    fn test_invalid_values() {
        let map = HashMap::from([("STORE_BACKEND", "mongo")]);
        assert!(matches!(build_app_config(lookup_from_map(&map)), Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "STORE_BACKEND"));
        let map = HashMap::from([("STORE_BACKEND", "memory"), ("BACKOFFICE_API_TOKENS", "no-colon")]);
        assert!(matches!(build_app_config(lookup_from_map(&map)), Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "BACKOFFICE_API_TOKENS"));
    }
}
