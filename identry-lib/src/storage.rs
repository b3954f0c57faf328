use crate::error::SyncError;
use async_trait::async_trait;

/// Default upper bound for an uploaded image
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// An image the user picked for their profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Reject anything that is not an image or is larger than `max_bytes`
    pub fn validate(&self, max_bytes: usize) -> Result<(), SyncError> {
        let is_image = self
            .content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/");
        if !is_image {
            return Err(SyncError::InvalidUpload(format!(
                "'{}' is not an image ({})",
                self.file_name, self.content_type
            )));
        }
        if self.bytes.is_empty() {
            return Err(SyncError::InvalidUpload(format!("'{}' is empty", self.file_name)));
        }
        if self.bytes.len() > max_bytes {
            return Err(SyncError::InvalidUpload(format!(
                "'{}' is {} bytes, limit is {}",
                self.file_name,
                self.bytes.len(),
                max_bytes
            )));
        }
        Ok(())
    }
}

/// Object storage accepting an image and returning its public URL
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_image(&self, key: &str, upload: &ImageUpload) -> anyhow::Result<String>;
}
