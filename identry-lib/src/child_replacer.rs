//! Full replacement of one child collection of a profile
//!
//! Child rows have no identity of their own, so an edit is applied by
//! deleting every row of the kind and inserting the new list. A failed
//! delete is logged and ignored; a failed insert aborts the replacement.

use crate::backend::ProfileBackend;
use crate::error::SyncError;
use crate::models::{ChildItems, EducationItem, EmploymentItem, PortfolioItem};
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Items that must carry a non-empty key field to be stored
pub trait RequiredField {
    fn has_required_field(&self) -> bool;
}

impl RequiredField for EducationItem {
    fn has_required_field(&self) -> bool {
        !self.school.trim().is_empty()
    }
}

impl RequiredField for EmploymentItem {
    fn has_required_field(&self) -> bool {
        !self.company.trim().is_empty()
    }
}

impl RequiredField for PortfolioItem {
    fn has_required_field(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// Drop items missing their required field, then structural duplicates.
/// The first occurrence wins and order is otherwise preserved.
pub fn retain_storable<T>(items: Vec<T>) -> Vec<T>
where
    T: RequiredField + Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| item.has_required_field())
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Apply [`retain_storable`] to a tagged list
pub fn prepare_items(items: ChildItems) -> ChildItems {
    match items {
        ChildItems::Education(items) => ChildItems::Education(retain_storable(items)),
        ChildItems::Employment(items) => ChildItems::Employment(retain_storable(items)),
        ChildItems::Portfolio(items) => ChildItems::Portfolio(retain_storable(items)),
    }
}

/// Replaces the full contents of a child collection
#[derive(Clone)]
pub struct ChildCollectionReplacer {
    backend: Arc<dyn ProfileBackend>,
}

impl ChildCollectionReplacer {
    pub fn new(backend: Arc<dyn ProfileBackend>) -> Self {
        Self { backend }
    }

    /// Replace every row of the items' kind owned by `parent_id`.
    ///
    /// Returns the number of rows written.
    pub async fn replace(&self, parent_id: Uuid, items: ChildItems) -> Result<usize, SyncError> {
        let kind = items.kind();
        let received = items.len();
        let items = prepare_items(items);

        if let Err(e) = self.backend.delete_children(parent_id, kind).await {
            // An absent row and a failed delete of an absent row look the same to callers
            warn!(profile_id = %parent_id, kind = %kind, error = %e, "delete of existing rows failed, continuing with insert");
        }

        if !items.is_empty() {
            self.backend
                .insert_children(parent_id, &items)
                .await
                .map_err(|e| SyncError::child_write(kind, e))?;
        }

        debug!(
            profile_id = %parent_id,
            kind = %kind,
            received,
            stored = items.len(),
            "child collection replaced"
        );
        Ok(items.len())
    }
}
