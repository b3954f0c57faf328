use crate::error::BackendError;
use crate::models::{AccountId, Block, ChildCollections, ChildItems, ChildKind, Profile, ProfileUpsert};
use async_trait::async_trait;
use uuid::Uuid;

/// Row-level access to profiles and their child collections
///
/// Each method is a single bounded round-trip; none of them spans tables
/// transactionally.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    /// Profile owned by `account`, if any
    async fn find_profile_by_account(
        &self,
        account: &AccountId,
    ) -> Result<Option<Profile>, BackendError>;

    /// Insert the profile for the account or update it in place
    async fn upsert_profile(&self, row: &ProfileUpsert) -> Result<Profile, BackendError>;

    /// Public profile with the given public identifier
    async fn find_public_profile(&self, custom_id: &str) -> Result<Option<Profile>, BackendError>;

    /// All child rows of a profile
    async fn load_children(&self, profile_id: Uuid) -> Result<ChildCollections, BackendError>;

    /// Remove every row of `kind` owned by the profile
    async fn delete_children(&self, profile_id: Uuid, kind: ChildKind) -> Result<(), BackendError>;

    /// Insert rows owned by the profile
    async fn insert_children(&self, profile_id: Uuid, items: &ChildItems) -> Result<(), BackendError>;

    async fn set_public(&self, account: &AccountId, is_public: bool) -> Result<Profile, BackendError>;

    async fn set_block_visibility(
        &self,
        account: &AccountId,
        block: Block,
        visible: bool,
    ) -> Result<Profile, BackendError>;

    async fn set_custom_id(
        &self,
        account: &AccountId,
        custom_id: Option<&str>,
    ) -> Result<Profile, BackendError>;

    /// Store a new uploaded photo and the display avatar derived from it
    async fn set_photo(
        &self,
        account: &AccountId,
        photo: &str,
        avatar_url: Option<&str>,
    ) -> Result<Profile, BackendError>;

    /// Atomically bump the view counter
    async fn increment_views(&self, profile_id: Uuid) -> Result<(), BackendError>;
}
