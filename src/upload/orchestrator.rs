use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AssetKind, AssetStore, StoredAsset, UploadError};
use crate::config::UploadConfig;
use crate::raster::compress::format_size;

/// Attempts, backoff and per-attempt timeout for one asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base(),
            timeout: config.timeout(),
        }
    }

    /// Wait after the failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

/// Outcome of one asset of a save.
#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub kind: AssetKind,
    pub filename: String,
    pub result: Result<StoredAsset, UploadError>,
}

impl AssetUpload {
    pub fn url(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|asset| asset.url.as_str())
    }
}

/// Per-asset outcomes of a save; failures do not undo the others.
#[derive(Debug, Clone)]
pub struct SaveUploads {
    pub rendered: AssetUpload,
    pub cropped: AssetUpload,
    pub original: AssetUpload,
}

impl SaveUploads {
    pub fn iter(&self) -> impl Iterator<Item = &AssetUpload> {
        [&self.rendered, &self.cropped, &self.original].into_iter()
    }

    pub fn all_succeeded(&self) -> bool {
        self.iter().all(|upload| upload.result.is_ok())
    }

    pub fn failures(&self) -> Vec<&AssetUpload> {
        self.iter().filter(|upload| upload.result.is_err()).collect()
    }
}

/// Uploads assets through a store with timeout, retry and size limits.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn AssetStore>,
    policy: RetryPolicy,
    general_limit: usize,
    original_limit: usize,
}

impl Uploader {
    pub fn new(store: Arc<dyn AssetStore>, config: &UploadConfig) -> Self {
        Self {
            store,
            policy: RetryPolicy::from_config(config),
            general_limit: config.general_limit,
            original_limit: config.original_limit,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn limit_for(&self, kind: AssetKind) -> usize {
        match kind {
            AssetKind::Original => self.original_limit,
            AssetKind::Rendered | AssetKind::Cropped => self.general_limit,
        }
    }

    /// Upload one asset.
    ///
    /// Oversized payloads are rejected before any network call. Each attempt
    /// is cancelled when it exceeds the timeout; retryable failures are
    /// retried after an exponential backoff.
    pub async fn upload_asset(
        &self,
        kind: AssetKind,
        data: Vec<u8>,
        filename: &str,
    ) -> Result<StoredAsset, UploadError> {
        let limit = self.limit_for(kind);
        if data.len() > limit {
            warn!(%kind, size = %format_size(data.len()), limit = %format_size(limit), "asset over the upload limit");
            return Err(UploadError::PayloadTooLarge {
                size: data.len(),
                limit,
            });
        }

        let mut attempt = 0;
        loop {
            debug!(%kind, filename, attempt = attempt + 1, "uploading");

            let result = match tokio::time::timeout(
                self.policy.timeout,
                self.store.upload(data.clone(), filename),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(UploadError::Timeout(self.policy.timeout)),
            };

            match result {
                Ok(asset) => {
                    info!(%kind, url = %asset.url, attempts = attempt + 1, "uploaded");
                    return Ok(asset);
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(%kind, error = %e, retry_in = ?delay, "upload failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(%kind, error = %e, attempts = attempt + 1, "upload failed");
                    return Err(e);
                }
            }
        }
    }

    /// Upload the three save assets concurrently and report each outcome.
    pub async fn upload_all(
        &self,
        rendered: Vec<u8>,
        cropped: Vec<u8>,
        original: Vec<u8>,
        product_handle: &str,
        unix_millis: i64,
    ) -> SaveUploads {
        let rendered_name = AssetKind::Rendered.filename(product_handle, unix_millis);
        let cropped_name = AssetKind::Cropped.filename(product_handle, unix_millis);
        let original_name = AssetKind::Original.filename(product_handle, unix_millis);

        let (rendered_result, cropped_result, original_result) = tokio::join!(
            self.upload_asset(AssetKind::Rendered, rendered, &rendered_name),
            self.upload_asset(AssetKind::Cropped, cropped, &cropped_name),
            self.upload_asset(AssetKind::Original, original, &original_name),
        );

        SaveUploads {
            rendered: AssetUpload {
                kind: AssetKind::Rendered,
                filename: rendered_name,
                result: rendered_result,
            },
            cropped: AssetUpload {
                kind: AssetKind::Cropped,
                filename: cropped_name,
                result: cropped_result,
            },
            original: AssetUpload {
                kind: AssetKind::Original,
                filename: original_name,
                result: original_result,
            },
        }
    }

    /// Best-effort delete; failures are only logged.
    pub async fn delete_asset(&self, asset_id: &str) {
        match self.store.delete(asset_id).await {
            Ok(()) => debug!(asset_id, "deleted asset"),
            Err(e) => warn!(asset_id, error = %e, "could not delete asset"),
        }
    }
}
