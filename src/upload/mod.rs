/// Asset upload.
///
/// The [`AssetStore`] trait is the boundary to wherever rendered assets end
/// up. [`Uploader`] wraps a store with the timeout, retry and size policy
/// and fans the three save assets out concurrently.

pub mod http;
pub mod local;
pub mod orchestrator;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use http::HttpAssetStore;
pub use local::LocalAssetStore;
pub use orchestrator::{AssetUpload, RetryPolicy, SaveUploads, Uploader};

/// Where an uploaded asset ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub url: String,
    pub asset_id: String,
}

/// The three assets produced by a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Composite of photo and frame.
    Rendered,
    /// Photo only, frame-free.
    Cropped,
    /// High-resolution source photo.
    Original,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [AssetKind::Rendered, AssetKind::Cropped, AssetKind::Original];

    pub fn label(self) -> &'static str {
        match self {
            AssetKind::Rendered => "rendered",
            AssetKind::Cropped => "cropped",
            AssetKind::Original => "original",
        }
    }

    /// `{handle}-{kind}-{unix millis}.jpg`
    pub fn filename(self, product_handle: &str, unix_millis: i64) -> String {
        format!("{product_handle}-{}-{unix_millis}.jpg", self.label())
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure reported by an asset store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    /// The payload exceeds what the store accepts (HTTP 413 equivalent).
    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The store refused the request as malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    /// Any other non-success status from the store.
    #[error("asset store returned {status}: {message}")]
    Server { status: u16, message: String },
}

impl UploadError {
    /// Map an HTTP status and body to an error.
    pub fn from_status(status: u16, message: impl Into<String>, size: usize, limit: usize) -> Self {
        match status {
            413 => Self::PayloadTooLarge { size, limit },
            400 => Self::BadRequest(message.into()),
            _ => Self::Server {
                status,
                message: message.into(),
            },
        }
    }

    /// Payload-too-large and bad-request fail immediately; everything else
    /// may succeed on another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::PayloadTooLarge { .. } | Self::BadRequest(_))
    }
}

/// A place assets can be uploaded to and deleted from.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, data: Vec<u8>, filename: &str) -> Result<StoredAsset, UploadError>;

    async fn delete(&self, asset_id: &str) -> Result<(), UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filenames_carry_handle_and_kind() {
        assert_eq!(
            AssetKind::Cropped.filename("oak-frame", 1_700_000_000_000),
            "oak-frame-cropped-1700000000000.jpg"
        );
    }

    #[test]
    fn test_status_codes_classify_retryability() {
        assert!(!UploadError::from_status(413, "", 30, 20).is_retryable());
        assert!(!UploadError::from_status(400, "missing file", 1, 20).is_retryable());
        assert!(UploadError::from_status(502, "bad gateway", 1, 20).is_retryable());
        assert!(UploadError::Network("reset".into()).is_retryable());
        assert!(UploadError::Timeout(Duration::from_secs(1)).is_retryable());
    }
}
