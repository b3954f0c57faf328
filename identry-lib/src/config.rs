use crate::link_preview::{DEFAULT_CACHE_CAPACITY, DEFAULT_PREVIEW_TIMEOUT, DEFAULT_USER_AGENT};
use crate::storage::DEFAULT_MAX_UPLOAD_BYTES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Link preview settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    /// Hard bound on a single page fetch, in seconds
    pub timeout_secs: u64,
    /// User agent sent to the scraped site
    pub user_agent: String,
    /// Maximum number of cached lookups
    pub cache_capacity: u64,
}

impl PreviewConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_PREVIEW_TIMEOUT.as_secs(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Avatar upload limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted image in bytes
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Root structure of the engine configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// PostgreSQL connection URL. The `DATABASE_URL` environment variable
    /// takes precedence in the CLI.
    pub database_url: Option<String>,
    /// File holding the unauthenticated draft
    pub draft_path: PathBuf,
    /// Base of public profile URLs, e.g. `https://identry.app`
    pub public_base_url: String,
    pub preview: PreviewConfig,
    pub upload: UploadConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            draft_path: PathBuf::from(".identry/draft.json"),
            public_base_url: "http://localhost:3000".to_string(),
            preview: PreviewConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}
