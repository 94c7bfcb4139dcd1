/// Asset store reached over HTTP.
///
/// Uploads are `multipart/form-data` POSTs with a `file` part and a
/// `filename` part; the store answers `{ "secure_url", "public_id" }`.
/// Deletes send `{ "publicId" }` as JSON. Requests go through `ureq` on the
/// blocking pool so the caller's timeout can abandon them.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{AssetStore, StoredAsset, UploadError};

const BOUNDARY: &str = "frame-studio-boundary-7d41c2e9";

#[derive(Debug, Deserialize)]
struct UploadReply {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Clone)]
pub struct HttpAssetStore {
    upload_url: String,
    delete_url: String,
    /// Reported in `PayloadTooLarge` when the store answers 413.
    size_limit: usize,
    request_timeout: Duration,
}

impl HttpAssetStore {
    pub fn new(upload_url: impl Into<String>, delete_url: impl Into<String>, size_limit: usize) -> Self {
        Self {
            upload_url: upload_url.into(),
            delete_url: delete_url.into(),
            size_limit,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Encode `data` and `filename` as a multipart body.
fn multipart_body(data: &[u8], filename: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);

    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"filename\"\r\n\r\n");
    body.extend_from_slice(filename.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn map_ureq_error(err: ureq::Error, size: usize, limit: usize) -> UploadError {
    match err {
        ureq::Error::Status(code, response) => {
            let message = response.into_string().unwrap_or_default();
            UploadError::from_status(code, message, size, limit)
        }
        ureq::Error::Transport(transport) => UploadError::Network(transport.to_string()),
    }
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn upload(&self, data: Vec<u8>, filename: &str) -> Result<StoredAsset, UploadError> {
        let url = self.upload_url.clone();
        let timeout = self.request_timeout;
        let limit = self.size_limit;
        let size = data.len();
        let body = multipart_body(&data, filename);

        debug!(%url, filename, size, "posting asset");

        let reply = tokio::task::spawn_blocking(move || {
            let response = ureq::post(&url)
                .timeout(timeout)
                .set(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .send_bytes(&body)
                .map_err(|e| map_ureq_error(e, size, limit))?;

            response
                .into_json::<UploadReply>()
                .map_err(|e| UploadError::Server {
                    status: 200,
                    message: format!("unreadable reply: {e}"),
                })
        })
        .await
        .map_err(|e| UploadError::Network(e.to_string()))??;

        Ok(StoredAsset {
            url: reply.secure_url,
            asset_id: reply.public_id,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), UploadError> {
        let url = self.delete_url.clone();
        let timeout = self.request_timeout;
        let payload = serde_json::json!({ "publicId": asset_id });

        tokio::task::spawn_blocking(move || {
            ureq::delete(&url)
                .timeout(timeout)
                .send_json(payload)
                .map(|_| ())
                .map_err(|e| map_ureq_error(e, 0, 0))
        })
        .await
        .map_err(|e| UploadError::Network(e.to_string()))?
    }
}
