/// Asset store backed by a local directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AssetStore, StoredAsset, UploadError};
use crate::config::UploadConfig;

/// Writes assets into `root` and hands back `file://` URLs.
///
/// Applies the same size ceilings as the remote store: the general limit,
/// or the original limit for files whose name marks them as the original.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    general_limit: usize,
    original_limit: usize,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>, config: &UploadConfig) -> Self {
        Self {
            root: root.into(),
            general_limit: config.general_limit,
            original_limit: config.original_limit,
        }
    }

    /// `<data_dir>/frame-studio/assets`
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("frame-studio").join("assets"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn limit_for(&self, filename: &str) -> usize {
        if filename.contains("-original-") {
            self.original_limit
        } else {
            self.general_limit
        }
    }

    fn path_for(&self, asset_id: &str) -> Result<PathBuf, UploadError> {
        // Ids are generated here; anything with a separator did not come from us
        if asset_id.is_empty() || asset_id.contains(|c| c == '/' || c == '\\') || asset_id.contains("..") {
            return Err(UploadError::BadRequest(format!("invalid asset id {asset_id:?}")));
        }
        Ok(self.root.join(asset_id))
    }
}

fn io_error(err: std::io::Error) -> UploadError {
    UploadError::Network(err.to_string())
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn upload(&self, data: Vec<u8>, filename: &str) -> Result<StoredAsset, UploadError> {
        let limit = self.limit_for(filename);
        if data.len() > limit {
            return Err(UploadError::PayloadTooLarge {
                size: data.len(),
                limit,
            });
        }

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| UploadError::BadRequest("missing filename".to_string()))?;
        let asset_id = format!("{}-{}.jpg", stem, Uuid::new_v4().simple());

        tokio::fs::create_dir_all(&self.root).await.map_err(io_error)?;
        let path = self.root.join(&asset_id);
        tokio::fs::write(&path, &data).await.map_err(io_error)?;

        let absolute = tokio::fs::canonicalize(&path).await.map_err(io_error)?;
        info!(path = %absolute.display(), bytes = data.len(), "stored asset");

        Ok(StoredAsset {
            url: format!("file://{}", absolute.display()),
            asset_id,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), UploadError> {
        let path = self.path_for(asset_id)?;
        tokio::fs::remove_file(&path).await.map_err(io_error)?;
        debug!(path = %path.display(), "removed asset");
        Ok(())
    }
}
