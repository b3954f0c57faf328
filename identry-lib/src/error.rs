//! Error types for the draft and synchronization engine
//!
//! Only critical failures surface here. Draft storage problems and missing
//! link previews are absorbed by their components and never become errors.

use crate::models::ChildKind;

/// Failures reported by the relational backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The statement ran and the backend rejected it
    #[error("{operation} failed: {message}")]
    Query { operation: String, message: String },

    /// A row that had to exist was not found
    #[error("{0} not found")]
    NotFound(String),

    /// A unique constraint rejected the write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
}

impl BackendError {
    /// Create a query error for the named operation
    pub fn query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced to callers of the synchronization engine
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A mutating call was made without an account identifier
    #[error("authentication required")]
    NotAuthenticated,

    /// A new profile cannot be created without a name
    #[error("profile name is required")]
    MissingName,

    /// The stored draft could not be read as profile fields
    #[error("draft is malformed: {0}")]
    MalformedDraft(String),

    /// The public identifier does not meet the format rules
    #[error("invalid custom id '{0}'")]
    InvalidCustomId(String),

    /// The uploaded file was rejected before reaching storage
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// The object store refused or failed the upload
    #[error("image storage failed: {0}")]
    Storage(String),

    /// A write that must not be lost failed
    #[error("{context}: {source}")]
    Write {
        context: String,
        #[source]
        source: BackendError,
    },

    /// A read needed to continue the operation failed
    #[error("{context}: {source}")]
    Read {
        context: String,
        #[source]
        source: BackendError,
    },
}

impl SyncError {
    /// Wrap a backend failure of a write
    pub fn write(context: impl Into<String>, source: BackendError) -> Self {
        Self::Write {
            context: context.into(),
            source,
        }
    }

    /// Wrap a backend failure of a read
    pub fn read(context: impl Into<String>, source: BackendError) -> Self {
        Self::Read {
            context: context.into(),
            source,
        }
    }

    /// Wrap a failed child insert for the given collection
    pub fn child_write(kind: ChildKind, source: BackendError) -> Self {
        Self::write(format!("failed to save {} entries", kind), source)
    }

    /// Backend error behind this failure, if any
    pub fn backend_source(&self) -> Option<&BackendError> {
        match self {
            SyncError::Write { source, .. } | SyncError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}
