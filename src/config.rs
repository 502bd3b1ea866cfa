use std::path::PathBuf;
use std::str::FromStr;

use crate::crypto::KEY_LENGTH;
use crate::errors::StoreError;
use crate::keygen;
use crate::store::BackendKind;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PAYLOAD_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub encryption_key: String,
    /// True when `OTS_ENCRYPTION_KEY` was unset and a key was generated for
    /// this run only.
    pub generated_key: bool,
    /// `json` or `sqlite`, resolved by [`Config::backend`].
    pub storage: String,
    pub json_file: PathBuf,
    pub database_url: String,
    /// Maximum accepted request body in bytes.
    pub payload_limit: usize,
    /// Base URL used to build share links. Falls back to the request's Host.
    pub public_url: Option<String>,
}

impl Config {
    pub fn backend(&self) -> Result<BackendKind, StoreError> {
        BackendKind::from_name(&self.storage, &self.json_file, &self.database_url)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let (encryption_key, generated_key) = match std::env::var("OTS_ENCRYPTION_KEY") {
        Ok(key) if !key.is_empty() => (key, false),
        _ => (keygen::generate(KEY_LENGTH), true),
    };
    validate_key(&encryption_key)?;

    Ok(Config {
        port: parse_or_default("OTS_PORT", std::env::var("OTS_PORT").ok(), DEFAULT_PORT),
        encryption_key,
        generated_key,
        storage: std::env::var("OTS_STORAGE").unwrap_or_else(|_| "sqlite".into()),
        json_file: std::env::var("OTS_JSON_FILE")
            .unwrap_or_else(|_| "secrets.json".into())
            .into(),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://secrets.db".into()),
        payload_limit: parse_or_default(
            "OTS_PAYLOAD_LIMIT",
            std::env::var("OTS_PAYLOAD_LIMIT").ok(),
            DEFAULT_PAYLOAD_LIMIT,
        ),
        public_url: std::env::var("OTS_PUBLIC_URL")
            .ok()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty()),
    })
}

/// Parse a numeric setting, warning and keeping `default` when the value is
/// present but malformed.
fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{}={:?} is not a valid value, using default {}", name, value, default);
            default
        }),
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.len() != KEY_LENGTH {
        return Err(StoreError::Configuration(format!(
            "OTS_ENCRYPTION_KEY must be {} characters long, is {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(())
}
