/// Photo ingestion
///
/// Turns the bytes of a user-selected file into a decoded photo ready for
/// placement. Rejects anything that is not an image or is too large, and
/// shrinks oversized photos before decoding them for the canvas.

use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use tiny_skia::Pixmap;
use tracing::{info, warn};

use super::compress::{format_size, Compressor};
use super::{pixmap_from_image, run_blocking};
use crate::config::CompressionConfig;
use crate::{Result, StudioError};

pub const NOT_AN_IMAGE: &str = "Please select a valid image file.";

/// The photo currently placed in the frame
///
/// Replaced wholesale on every new selection.
#[derive(Debug)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    /// Decoded pixels, used for the original-image export
    pub image: DynamicImage,
    /// Same pixels, premultiplied for drawing
    pub pixmap: Pixmap,
    /// Encoded size after ingestion
    pub encoded_size: usize,
}

impl UploadedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Read and ingest a photo from disk
pub async fn ingest_file(path: &Path, config: &CompressionConfig) -> Result<Arc<UploadedImage>> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    ingest_bytes(bytes, file_name, config).await
}

/// Validate, pre-compress if needed, and decode `bytes`
pub async fn ingest_bytes(
    bytes: Vec<u8>,
    file_name: Option<String>,
    config: &CompressionConfig,
) -> Result<Arc<UploadedImage>> {
    if bytes.len() > config.absolute_ceiling {
        return Err(StudioError::validation(format!(
            "File too large. Please use an image smaller than {}.",
            format_size(config.absolute_ceiling)
        )));
    }

    if image::guess_format(&bytes).is_err() {
        return Err(StudioError::validation(NOT_AN_IMAGE));
    }

    let bytes = if bytes.len() > config.ingest_threshold {
        info!(size = %format_size(bytes.len()), "large photo, compressing before use");
        let compressor = Compressor::new(config.ingest.clone(), config.absolute_ceiling);
        let result = compressor
            .compress_to_budget(&bytes, config.ingest_threshold)
            .await?;

        if result.compressed_size > config.ingest_reject {
            warn!(size = %format_size(result.compressed_size), "photo still too large after compression");
            return Err(StudioError::validation(
                "Image is still too large after compression. Please use a smaller image.",
            ));
        }
        result.blob
    } else {
        bytes
    };

    let encoded_size = bytes.len();
    let (image, pixmap) = run_blocking(move || decode(&bytes)).await?;

    let (width, height) = image.dimensions();
    info!(width, height, size = %format_size(encoded_size), "photo ready");

    Ok(Arc::new(UploadedImage {
        file_name,
        image,
        pixmap,
        encoded_size,
    }))
}

fn decode(bytes: &[u8]) -> Result<(DynamicImage, Pixmap)> {
    let image = image::load_from_memory(bytes).map_err(|_| StudioError::validation(NOT_AN_IMAGE))?;
    let pixmap = pixmap_from_image(&image)?;
    Ok((image, pixmap))
}
