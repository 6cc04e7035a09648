//! Configuration module for the team directory backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TEAM_BIND_ADDR {0:?}")]
    BindAddr(String),
    #[error("invalid size {value:?} for {var}")]
    Size { var: &'static str, value: String },
}

/// Transport-level upload limits.
///
/// The raw setting strings are kept alongside the parsed byte counts so error
/// messages can quote the limit exactly as the operator configured it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportLimits {
    pub upload_max_filesize: String,
    pub upload_max_bytes: u64,
    pub post_max_size: String,
    pub post_max_bytes: u64,
}

impl TransportLimits {
    pub fn new(upload_max_filesize: &str, post_max_size: &str) -> Result<Self, ConfigError> {
        let upload_max_bytes =
            parse_size_to_bytes(upload_max_filesize).ok_or_else(|| ConfigError::Size {
                var: "TEAM_UPLOAD_MAX_FILESIZE",
                value: upload_max_filesize.to_string(),
            })?;
        let post_max_bytes =
            parse_size_to_bytes(post_max_size).ok_or_else(|| ConfigError::Size {
                var: "TEAM_POST_MAX_SIZE",
                value: post_max_size.to_string(),
            })?;

        Ok(Self {
            upload_max_filesize: upload_max_filesize.trim().to_string(),
            upload_max_bytes,
            post_max_size: post_max_size.trim().to_string(),
            post_max_bytes,
        })
    }
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            upload_max_filesize: "32M".to_string(),
            upload_max_bytes: 32 * 1024 * 1024,
            post_max_size: "40M".to_string(),
            post_max_bytes: 40 * 1024 * 1024,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the admin surface
    pub admin_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Root directory for uploaded blobs
    pub storage_path: PathBuf,
    /// Public base URL used to build absolute image links
    pub public_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    pub limits: TransportLimits,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let admin_psk = env::var("TEAM_ADMIN_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("TEAM_DB_PATH")
            .unwrap_or_else(|_| "./data/team.sqlite".to_string())
            .into();

        let storage_path = env::var("TEAM_STORAGE_PATH")
            .unwrap_or_else(|_| "./data/storage".to_string())
            .into();

        let public_url = env::var("TEAM_PUBLIC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let bind_raw = env::var("TEAM_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| ConfigError::BindAddr(bind_raw.clone()))?;

        let log_level = env::var("TEAM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = env::var("TEAM_LOG_JSON")
            .map(|v| matches!(v.as_str(), "1" | "true"))
            .unwrap_or(false);

        let limits = TransportLimits::new(
            &env::var("TEAM_UPLOAD_MAX_FILESIZE").unwrap_or_else(|_| "32M".to_string()),
            &env::var("TEAM_POST_MAX_SIZE").unwrap_or_else(|_| "40M".to_string()),
        )?;

        Ok(Self {
            admin_psk,
            db_path,
            storage_path,
            public_url,
            bind_addr,
            log_level,
            log_json,
            limits,
        })
    }
}

/// Convert a size setting such as `32M`, `512k` or `1G` into bytes.
///
/// A bare number is taken as bytes. Suffixes are powers of 1024.
pub fn parse_size_to_bytes(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let last = raw.chars().last()?;

    let (digits, multiplier) = match last.to_ascii_lowercase() {
        'g' => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
        'm' => (&raw[..raw.len() - 1], 1024 * 1024),
        'k' => (&raw[..raw.len() - 1], 1024),
        _ => (raw, 1),
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
}
