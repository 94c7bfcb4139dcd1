/// Error types shared by every part of the studio.
///
/// Errors fall into four classes that decide how the caller reacts:
/// - validation problems are shown to the user and never retried
/// - transient problems may succeed later; uploads retry them with backoff
///   (see `UploadError::is_retryable`)
/// - encoding failures degrade to the unmodified input where possible
/// - load failures are recovered with a placeholder and only logged

use crate::upload::UploadError;

/// Result alias that carries [`StudioError`].
pub type Result<T> = std::result::Result<T, StudioError>;

/// Common error type for the studio library.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// Input rejected before any processing (wrong type, too large, missing).
    #[error("{0}")]
    Validation(String),

    /// Failure that may succeed on a later attempt, such as a background
    /// task cancelled while the runtime shuts down.
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    /// The encoder produced no output.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// An external asset could not be loaded.
    #[error("failed to load {what}: {reason}")]
    Load { what: String, reason: String },

    /// Terminal failure reported by the asset store.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The customization library could not be read or written.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A save cycle is already running for this session.
    #[error("a save is already in progress")]
    SaveInFlight,
}

impl StudioError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn encoding<T: Into<String>>(msg: T) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn load<W: Into<String>, R: ToString>(what: W, reason: R) -> Self {
        Self::Load {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Message suitable for a non-blocking notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Upload(UploadError::PayloadTooLarge { .. }) => {
                "Image file is too large. Please use a smaller image.".to_string()
            }
            Self::Upload(UploadError::Timeout(_)) => {
                "Upload timed out. Please check your internet connection and try again."
                    .to_string()
            }
            Self::Upload(UploadError::Network(_)) | Self::TransientIo(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
            Self::SaveInFlight => "Your customization is already being saved.".to_string(),
            Self::Load { what, .. } => format!("Failed to load {what}"),
            other => format!("Failed to save customization: {other}"),
        }
    }
}
