// Unified error handling for relink-core

use relink_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Record store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No candidate source responded (tried: {})", .candidates.join(", "))]
    Unreachable { candidates: Vec<String> },

    #[error("Cannot read rclone config {path}: {source}")]
    ConfigDocument {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Notification failed: {0}")]
    Notify(String),
}

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
