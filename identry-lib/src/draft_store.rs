//! Single-slot storage for an unauthenticated, in-progress profile edit
//!
//! Every operation is best-effort. A storage failure is logged and turned
//! into a no-op so that losing a draft never blocks the edit flow.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Arbitrary field/value mapping captured from the edit form
pub type DraftSnapshot = Map<String, Value>;

/// Local cache of one draft
pub trait DraftStore: Send + Sync {
    /// Store `snapshot`, replacing any previous draft
    fn save(&self, snapshot: &DraftSnapshot);

    /// Return the stored draft, if there is one
    fn load(&self) -> Option<DraftSnapshot>;

    /// Remove the stored draft
    fn clear(&self);
}

/// Draft kept as a JSON document on the local filesystem
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, snapshot: &DraftSnapshot) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = serde_json::to_vec(snapshot)?;
        // Write next to the target and rename so a crash never leaves half a draft
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &self.path)
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, snapshot: &DraftSnapshot) {
        if let Err(e) = self.write(snapshot) {
            warn!(path = %self.path.display(), error = %e, "failed to save draft");
        }
    }

    fn load(&self) -> Option<DraftSnapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read draft");
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(snapshot)) => Some(snapshot),
            Ok(_) => {
                warn!(path = %self.path.display(), "draft is not a JSON object, ignoring");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "draft is not valid JSON, ignoring");
                None
            }
        }
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "draft cleared"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to clear draft"),
        }
    }
}

/// Draft kept in process memory
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<DraftSnapshot>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, snapshot: &DraftSnapshot) {
        *self.slot.lock() = Some(snapshot.clone());
    }

    fn load(&self) -> Option<DraftSnapshot> {
        self.slot.lock().clone()
    }

    fn clear(&self) {
        self.slot.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> DraftSnapshot {
        match json!({
            "name": "Aiko",
            "bio": "",
            "skills": ["rust", "sql"],
            "education": [{"school": "X"}]
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("nested").join("draft.json"));

        assert!(store.load().is_none());
        store.save(&snapshot());
        assert_eq!(store.load(), Some(snapshot()));

        store.clear();
        assert!(store.load().is_none());
        // Clearing an absent draft is a no-op
        store.clear();
    }

    #[test]
    fn test_file_store_overwrites_previous_draft() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("draft.json"));

        store.save(&snapshot());
        let mut second = DraftSnapshot::new();
        second.insert("name".to_string(), json!("Ren"));
        store.save(&second);

        assert_eq!(store.load(), Some(second));
    }

    #[test]
    fn test_file_store_swallows_unavailable_storage() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();
        let store = FileDraftStore::new(blocker.join("draft.json"));

        store.save(&snapshot());
        assert!(store.load().is_none());
        store.clear();
    }

    #[test]
    fn test_file_store_ignores_corrupt_draft() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(FileDraftStore::new(&path).load().is_none());

        fs::write(&path, b"{not json").unwrap();
        assert!(FileDraftStore::new(&path).load().is_none());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryDraftStore::new();
        assert!(store.load().is_none());

        store.save(&snapshot());
        assert_eq!(store.load(), Some(snapshot()));

        store.clear();
        assert!(store.load().is_none());
    }
}
