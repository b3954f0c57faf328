//! Operations on an already persisted profile: visibility, the public
//! identifier, the view counter and avatar uploads.

use crate::avatar::{resolve_avatar, AvatarCandidates};
use crate::coordinator::ProfileSyncCoordinator;
use crate::error::SyncError;
use crate::models::{AccountId, Block, Profile, PublicProfile};
use crate::storage::ImageUpload;
use tracing::{info, warn};
use uuid::Uuid;

/// Check a human-chosen public identifier: 3 to 32 characters of ASCII
/// lowercase letters, digits, `-` and `_`, starting with a letter or digit
pub fn validate_custom_id(custom_id: &str) -> Result<(), SyncError> {
    let invalid = || SyncError::InvalidCustomId(custom_id.to_string());

    if !(3..=32).contains(&custom_id.len()) {
        return Err(invalid());
    }
    let mut chars = custom_id.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if starts_well && rest_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Public URL of a profile page
pub fn public_url(base: &str, custom_id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), custom_id)
}

impl ProfileSyncCoordinator {
    /// Published profile for `custom_id` with hidden blocks removed.
    /// Private and unknown identifiers both yield `None`.
    pub async fn get_public_profile(&self, custom_id: &str) -> Result<Option<PublicProfile>, SyncError> {
        let Some(profile) = self
            .backend
            .find_public_profile(custom_id)
            .await
            .map_err(|e| SyncError::read("failed to load public profile", e))?
        else {
            return Ok(None);
        };

        let children = self
            .backend
            .load_children(profile.id)
            .await
            .map_err(|e| SyncError::read("failed to load profile entries", e))?;
        Ok(Some(PublicProfile::new(profile, children)))
    }

    /// Count a page view. A failed increment is logged and otherwise ignored.
    pub async fn record_view(&self, profile_id: Uuid) {
        if let Err(e) = self.backend.increment_views(profile_id).await {
            warn!(profile_id = %profile_id, error = %e, "failed to record profile view");
        }
    }

    pub async fn set_public(&self, account: &AccountId, is_public: bool) -> Result<Profile, SyncError> {
        ensure_account(account)?;
        let profile = self
            .backend
            .set_public(account, is_public)
            .await
            .map_err(|e| SyncError::write("failed to update profile visibility", e))?;
        info!(account = %account, is_public, "profile visibility changed");
        Ok(profile)
    }

    pub async fn set_block_visibility(
        &self,
        account: &AccountId,
        block: Block,
        visible: bool,
    ) -> Result<Profile, SyncError> {
        ensure_account(account)?;
        self.backend
            .set_block_visibility(account, block, visible)
            .await
            .map_err(|e| SyncError::write("failed to update block visibility", e))
    }

    /// Set or clear the public identifier
    pub async fn set_custom_id(
        &self,
        account: &AccountId,
        custom_id: Option<&str>,
    ) -> Result<Profile, SyncError> {
        ensure_account(account)?;
        let custom_id = custom_id.map(str::trim).filter(|id| !id.is_empty());
        if let Some(id) = custom_id {
            validate_custom_id(id)?;
        }
        self.backend
            .set_custom_id(account, custom_id)
            .await
            .map_err(|e| SyncError::write("failed to update custom id", e))
    }

    /// Upload a new profile photo and make it the displayed avatar
    pub async fn upload_photo(&self, account: &AccountId, upload: ImageUpload) -> Result<Profile, SyncError> {
        ensure_account(account)?;
        upload.validate(self.max_upload_bytes)?;

        let images = self
            .images
            .as_ref()
            .ok_or_else(|| SyncError::Storage("no object store configured".to_string()))?;
        let key = avatar_key(account, Uuid::new_v4(), &upload.file_name);
        let url = images
            .put_image(&key, &upload)
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let provider_avatar = self.fresh_provider_avatar().await;
        let avatar_url = resolve_avatar(AvatarCandidates::new(Some(&url), provider_avatar.as_deref()));
        self.backend
            .set_photo(account, &url, avatar_url.as_deref())
            .await
            .map_err(|e| SyncError::write("failed to save profile photo", e))
    }
}

/// Object key for an uploaded avatar. Only the final path component of the
/// client-supplied file name is kept.
fn avatar_key(account: &AccountId, upload_id: Uuid, file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('.');
    let base = if base.is_empty() { "image" } else { base };
    format!("avatars/{}/{}-{}", account, upload_id, base)
}

fn ensure_account(account: &AccountId) -> Result<(), SyncError> {
    if account.is_blank() {
        Err(SyncError::NotAuthenticated)
    } else {
        Ok(())
    }
}
