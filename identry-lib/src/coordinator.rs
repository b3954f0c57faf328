//! Orchestration of draft merges and full profile replacement
//!
//! The scalar upsert always completes before any child collection is
//! touched, since child rows reference the persisted profile id. The three
//! child replacements are independent of each other and are not rolled
//! back when one of them fails.

use crate::avatar::{resolve_avatar, AvatarCandidates};
use crate::backend::ProfileBackend;
use crate::child_replacer::ChildCollectionReplacer;
use crate::draft::{non_empty, ProfileDraft};
use crate::draft_store::{DraftSnapshot, DraftStore};
use crate::error::SyncError;
use crate::identity::IdentityProvider;
use crate::models::{AccountId, ChildCollections, ChildKind, Profile, ProfileFields, ProfileUpsert};
use crate::publishing::validate_custom_id;
use crate::storage::{ObjectStore, DEFAULT_MAX_UPLOAD_BYTES};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Entry point used by the presentation layer for every profile write
#[derive(Clone)]
pub struct ProfileSyncCoordinator {
    pub(crate) backend: Arc<dyn ProfileBackend>,
    pub(crate) drafts: Arc<dyn DraftStore>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) replacer: ChildCollectionReplacer,
    pub(crate) images: Option<Arc<dyn ObjectStore>>,
    pub(crate) max_upload_bytes: usize,
}

impl ProfileSyncCoordinator {
    pub fn new(
        backend: Arc<dyn ProfileBackend>,
        drafts: Arc<dyn DraftStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            replacer: ChildCollectionReplacer::new(backend.clone()),
            backend,
            drafts,
            identity,
            images: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Object store receiving avatar uploads
    pub fn with_object_store(mut self, images: Arc<dyn ObjectStore>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_max_upload_bytes(mut self, max_bytes: usize) -> Self {
        self.max_upload_bytes = max_bytes;
        self
    }

    pub fn save_draft(&self, snapshot: &DraftSnapshot) {
        self.drafts.save(snapshot);
    }

    pub fn load_draft(&self) -> Option<DraftSnapshot> {
        self.drafts.load()
    }

    pub fn clear_draft(&self) {
        self.drafts.clear();
    }

    /// Fold the local draft into the account's durable profile after the
    /// user authenticated.
    ///
    /// Returns `Ok(None)` without touching the backend when there is no
    /// draft. The draft is cleared only once the profile and all three child
    /// collections were written; on any error it is kept for a retry.
    pub async fn merge_draft_on_authentication(&self) -> Result<Option<Profile>, SyncError> {
        let Some(snapshot) = self.drafts.load() else {
            return Ok(None);
        };
        let draft = ProfileDraft::from_snapshot(&snapshot)?;
        let account = self.require_account().await?;
        let provider_avatar = self.fresh_provider_avatar().await;

        let existing = self
            .backend
            .find_profile_by_account(&account)
            .await
            .map_err(|e| SyncError::read("failed to load existing profile", e))?;

        let mut fields = existing
            .as_ref()
            .map(ProfileFields::from)
            .unwrap_or_default();
        draft.fill(&mut fields);
        if existing.is_none() && fields.name.trim().is_empty() {
            return Err(SyncError::MissingName);
        }
        check_custom_id(&fields)?;

        let provider_avatar = provider_avatar.or_else(|| {
            existing
                .as_ref()
                .and_then(|profile| profile.provider_avatar_url.clone())
        });
        let profile = self
            .write_profile(upsert_row(account, fields, provider_avatar))
            .await?;

        self.replace_children(profile.id, draft.children).await?;

        self.drafts.clear();
        info!(
            profile_id = %profile.id,
            account = %profile.account_id,
            created = existing.is_none(),
            "draft merged into profile"
        );
        Ok(Some(profile))
    }

    /// Overwrite the scalar fields of the account's profile (creating it if
    /// needed) and fully replace its three child collections.
    pub async fn replace_full_profile(
        &self,
        account: &AccountId,
        fields: ProfileFields,
        children: ChildCollections,
    ) -> Result<Profile, SyncError> {
        if account.is_blank() {
            return Err(SyncError::NotAuthenticated);
        }
        if fields.name.trim().is_empty() {
            return Err(SyncError::MissingName);
        }
        check_custom_id(&fields)?;

        let provider_avatar = self.fresh_provider_avatar().await;
        let profile = self
            .write_profile(upsert_row(account.clone(), fields, provider_avatar))
            .await?;

        self.replace_children(profile.id, children).await?;

        info!(profile_id = %profile.id, account = %account, "profile replaced");
        Ok(profile)
    }

    /// Run the three child replacements concurrently. The first failure in
    /// education, employment, portfolio order is returned; later ones are
    /// only logged.
    async fn replace_children(
        &self,
        profile_id: Uuid,
        children: ChildCollections,
    ) -> Result<(), SyncError> {
        let results = join_all(
            children
                .into_items()
                .into_iter()
                .map(|items| self.replacer.replace(profile_id, items)),
        )
        .await;

        let mut first_failure = None;
        for (kind, result) in ChildKind::ALL.into_iter().zip(results) {
            if let Err(e) = result {
                if first_failure.is_none() {
                    first_failure = Some(e);
                } else {
                    error!(profile_id = %profile_id, kind = %kind, error = %e, "child collection replacement also failed");
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) async fn require_account(&self) -> Result<AccountId, SyncError> {
        self.identity
            .current_account()
            .await
            .filter(|account| !account.is_blank())
            .ok_or(SyncError::NotAuthenticated)
    }

    pub(crate) async fn fresh_provider_avatar(&self) -> Option<String> {
        let url = self.identity.provider_avatar_url().await;
        non_empty(&url).map(str::to_string)
    }

    async fn write_profile(&self, row: ProfileUpsert) -> Result<Profile, SyncError> {
        self.backend
            .upsert_profile(&row)
            .await
            .map_err(|e| SyncError::write("failed to save profile", e))
    }
}

/// Upsert row with the display avatar resolved from the uploaded photo and
/// the provider image. A `None` provider image keeps the stored one.
fn upsert_row(
    account_id: AccountId,
    fields: ProfileFields,
    provider_avatar_url: Option<String>,
) -> ProfileUpsert {
    let avatar_url = resolve_avatar(AvatarCandidates::new(
        fields.photo.as_deref(),
        provider_avatar_url.as_deref(),
    ));
    ProfileUpsert {
        account_id,
        fields,
        provider_avatar_url,
        avatar_url,
    }
}

fn check_custom_id(fields: &ProfileFields) -> Result<(), SyncError> {
    match fields.custom_id.as_deref() {
        Some(id) => validate_custom_id(id),
        None => Ok(()),
    }
}
