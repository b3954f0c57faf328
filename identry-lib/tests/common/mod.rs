#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use identry::{
    AccountId, BackendError, Block, ChildCollections, ChildItems, ChildKind, ImageUpload,
    ObjectStore, Profile, ProfileBackend, ProfileUpsert,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;
use uuid::Uuid;

/// Profile backend kept in memory, recording every call
#[derive(Default)]
pub struct InMemoryBackend {
    profiles: Mutex<HashMap<AccountId, Profile>>,
    children: Mutex<HashMap<Uuid, ChildCollections>>,
    log: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail_upsert: AtomicBool,
    fail_views: AtomicBool,
    fail_delete: Mutex<HashSet<ChildKind>>,
    fail_insert: Mutex<HashSet<ChildKind>>,
    insert_barrier: Mutex<Option<Arc<Barrier>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn fail_upsert(&self) {
        self.fail_upsert.store(true, Ordering::SeqCst);
    }

    pub fn fail_views(&self) {
        self.fail_views.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, kind: ChildKind) {
        self.fail_delete.lock().insert(kind);
    }

    pub fn fail_insert(&self, kind: ChildKind) {
        self.fail_insert.lock().insert(kind);
    }

    /// Make every child insert wait until `parties` inserts are in flight
    pub fn gate_inserts(&self, parties: usize) {
        *self.insert_barrier.lock() = Some(Arc::new(Barrier::new(parties)));
    }

    pub fn profile(&self, account: &str) -> Option<Profile> {
        self.profiles.lock().get(&AccountId::new(account)).cloned()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.lock().len()
    }

    pub fn children(&self, profile_id: Uuid) -> ChildCollections {
        self.children
            .lock()
            .get(&profile_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Store a profile directly, bypassing the upsert
    pub fn seed(&self, profile: Profile, children: ChildCollections) {
        self.children.lock().insert(profile.id, children);
        self.profiles.lock().insert(profile.account_id.clone(), profile);
    }

    fn record(&self, entry: String) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(entry);
    }

    fn update(
        &self,
        account: &AccountId,
        apply: impl FnOnce(&mut Profile),
    ) -> Result<Profile, BackendError> {
        let mut profiles = self.profiles.lock();
        let profile = profiles
            .get_mut(account)
            .ok_or_else(|| BackendError::NotFound(format!("profile for account {}", account)))?;
        apply(profile);
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

#[async_trait]
impl ProfileBackend for InMemoryBackend {
    async fn find_profile_by_account(
        &self,
        account: &AccountId,
    ) -> Result<Option<Profile>, BackendError> {
        self.record(format!("find {}", account));
        Ok(self.profiles.lock().get(account).cloned())
    }

    async fn upsert_profile(&self, row: &ProfileUpsert) -> Result<Profile, BackendError> {
        self.record(format!("upsert {}", row.account_id));
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(BackendError::query("upsert profile", "disk full"));
        }

        let mut profiles = self.profiles.lock();
        let now = Utc::now();
        let previous = profiles.get(&row.account_id).cloned();
        let stored_provider = previous
            .as_ref()
            .and_then(|p| p.provider_avatar_url.clone());
        let f = row.fields.clone();

        let profile = Profile {
            id: previous.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            account_id: row.account_id.clone(),
            name: f.name,
            nickname: f.nickname,
            bio: f.bio,
            location: f.location,
            gender: f.gender,
            birth_year: f.birth_year,
            birth_month: f.birth_month,
            birth_day: f.birth_day,
            birth_date: f.birth_date,
            skills: f.skills,
            photo: f.photo,
            provider_avatar_url: row.provider_avatar_url.clone().or(stored_provider.clone()),
            avatar_url: row.avatar_url.clone().or(stored_provider),
            banner_image: f.banner_image,
            twitter: f.twitter,
            instagram: f.instagram,
            linkedin: f.linkedin,
            github: f.github,
            show_education: f.show_education,
            show_employment: f.show_employment,
            show_portfolio: f.show_portfolio,
            show_skills: f.show_skills,
            show_social: f.show_social,
            is_public: f.is_public,
            views_count: previous.as_ref().map(|p| p.views_count).unwrap_or(0),
            custom_id: f.custom_id,
            created_at: previous.as_ref().map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        };
        profiles.insert(row.account_id.clone(), profile.clone());
        Ok(profile)
    }

    async fn find_public_profile(&self, custom_id: &str) -> Result<Option<Profile>, BackendError> {
        self.record(format!("find public {}", custom_id));
        Ok(self
            .profiles
            .lock()
            .values()
            .find(|p| p.is_public && p.custom_id.as_deref() == Some(custom_id))
            .cloned())
    }

    async fn load_children(&self, profile_id: Uuid) -> Result<ChildCollections, BackendError> {
        self.record(format!("load children {}", profile_id));
        Ok(self.children(profile_id))
    }

    async fn delete_children(&self, profile_id: Uuid, kind: ChildKind) -> Result<(), BackendError> {
        self.record(format!("delete {}", kind));
        if self.fail_delete.lock().contains(&kind) {
            return Err(BackendError::query(format!("delete {}", kind), "row not found"));
        }
        let mut children = self.children.lock();
        let entry = children.entry(profile_id).or_default();
        match kind {
            ChildKind::Education => entry.education.clear(),
            ChildKind::Employment => entry.employment.clear(),
            ChildKind::Portfolio => entry.portfolio.clear(),
        }
        Ok(())
    }

    async fn insert_children(&self, profile_id: Uuid, items: &ChildItems) -> Result<(), BackendError> {
        self.record(format!("insert {}", items.kind()));
        let barrier = self.insert_barrier.lock().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        if self.fail_insert.lock().contains(&items.kind()) {
            return Err(BackendError::query(
                format!("insert {}", items.kind()),
                "value too long",
            ));
        }
        let mut children = self.children.lock();
        let entry = children.entry(profile_id).or_default();
        match items {
            ChildItems::Education(items) => entry.education.extend(items.iter().cloned()),
            ChildItems::Employment(items) => entry.employment.extend(items.iter().cloned()),
            ChildItems::Portfolio(items) => entry.portfolio.extend(items.iter().cloned()),
        }
        Ok(())
    }

    async fn set_public(&self, account: &AccountId, is_public: bool) -> Result<Profile, BackendError> {
        self.record(format!("set public {}", account));
        self.update(account, |p| p.is_public = is_public)
    }

    async fn set_block_visibility(
        &self,
        account: &AccountId,
        block: Block,
        visible: bool,
    ) -> Result<Profile, BackendError> {
        self.record(format!("set {} {}", block.column_name(), account));
        self.update(account, |p| match block {
            Block::Education => p.show_education = visible,
            Block::Employment => p.show_employment = visible,
            Block::Portfolio => p.show_portfolio = visible,
            Block::Skills => p.show_skills = visible,
            Block::Social => p.show_social = visible,
        })
    }

    async fn set_custom_id(
        &self,
        account: &AccountId,
        custom_id: Option<&str>,
    ) -> Result<Profile, BackendError> {
        self.record(format!("set custom id {}", account));
        if let Some(id) = custom_id {
            let taken = self.profiles.lock().values().any(|p| {
                p.is_public && &p.account_id != account && p.custom_id.as_deref() == Some(id)
            });
            if taken {
                return Err(BackendError::UniqueViolation(
                    "profiles_public_custom_id_key".to_string(),
                ));
            }
        }
        self.update(account, |p| p.custom_id = custom_id.map(str::to_string))
    }

    async fn set_photo(
        &self,
        account: &AccountId,
        photo: &str,
        avatar_url: Option<&str>,
    ) -> Result<Profile, BackendError> {
        self.record(format!("set photo {}", account));
        self.update(account, |p| {
            p.photo = Some(photo.to_string());
            p.avatar_url = avatar_url.map(str::to_string);
        })
    }

    async fn increment_views(&self, profile_id: Uuid) -> Result<(), BackendError> {
        self.record(format!("increment views {}", profile_id));
        if self.fail_views.load(Ordering::SeqCst) {
            return Err(BackendError::query("increment views", "connection reset"));
        }
        if let Some(profile) = self
            .profiles
            .lock()
            .values_mut()
            .find(|p| p.id == profile_id)
        {
            profile.views_count += 1;
        }
        Ok(())
    }
}

/// Object store handing out predictable URLs
#[derive(Default)]
pub struct RecordingObjectStore {
    pub keys: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn put_image(&self, key: &str, _upload: &ImageUpload) -> anyhow::Result<String> {
        self.keys.lock().push(key.to_string());
        Ok(format!("https://storage.example.com/{}", key))
    }
}
