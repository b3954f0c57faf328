pub mod avatar;
pub mod backend;
pub mod child_replacer;
pub mod config;
pub mod config_parser;
pub mod coordinator;
pub mod draft;
pub mod draft_store;
pub mod error;
pub mod identity;
pub mod link_preview;
pub mod models;
pub mod postgres;
pub mod publishing;
pub mod storage;

pub use avatar::{resolve_avatar, AvatarCandidates};
pub use backend::ProfileBackend;
pub use child_replacer::ChildCollectionReplacer;
pub use config::EngineConfig;
pub use config_parser::{parse_config_file, parse_config_string};
pub use coordinator::ProfileSyncCoordinator;
pub use draft::ProfileDraft;
pub use draft_store::{DraftSnapshot, DraftStore, FileDraftStore, MemoryDraftStore};
pub use error::{BackendError, SyncError};
pub use identity::{IdentityProvider, StaticIdentity};
pub use link_preview::{HttpPageSource, LinkPreviewFetcher, PageSource, PreviewCache};
pub use models::*;
pub use postgres::PostgresBackend;
pub use publishing::{public_url, validate_custom_id};
pub use storage::{ImageUpload, ObjectStore};

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Main entry point wiring the engine to PostgreSQL, a file-backed draft
/// and HTTP link previews
pub struct Identry {
    config: EngineConfig,
    coordinator: ProfileSyncCoordinator,
    previews: LinkPreviewFetcher,
}

impl Identry {
    /// Load the configuration from a YAML file and connect
    pub async fn from_config_file<P: AsRef<Path>>(
        path: P,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let config = parse_config_file(path).await?;
        Self::connect(config, identity).await
    }

    /// Connect to the database named by the configuration
    pub async fn connect(config: EngineConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let database_url = config
            .database_url
            .clone()
            .context("No database_url configured")?;
        let backend = PostgresBackend::connect(&database_url).await?;
        Self::with_backend(config, Arc::new(backend), identity)
    }

    /// Build on top of an existing backend
    pub fn with_backend(
        config: EngineConfig,
        backend: Arc<dyn ProfileBackend>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let drafts = Arc::new(FileDraftStore::new(config.draft_path.clone()));
        let coordinator = ProfileSyncCoordinator::new(backend, drafts, identity)
            .with_max_upload_bytes(config.upload.max_bytes);

        let source = HttpPageSource::new(config.preview.timeout(), &config.preview.user_agent)?;
        let previews = LinkPreviewFetcher::new(
            Arc::new(source),
            PreviewCache::new(config.preview.cache_capacity),
        )
        .with_timeout(config.preview.timeout());

        Ok(Self {
            config,
            coordinator,
            previews,
        })
    }

    /// Accept avatar uploads through the given object store
    pub fn with_object_store(mut self, images: Arc<dyn ObjectStore>) -> Self {
        self.coordinator = self.coordinator.with_object_store(images);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &ProfileSyncCoordinator {
        &self.coordinator
    }

    pub fn previews(&self) -> &LinkPreviewFetcher {
        &self.previews
    }

    /// Public URL for a profile identifier under the configured base
    pub fn public_url(&self, custom_id: &str) -> String {
        public_url(&self.config.public_base_url, custom_id)
    }
}
