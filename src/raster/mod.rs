/// Raster module
///
/// This module handles everything that touches pixels:
/// - Drawing the composite and content-only surfaces (surface.rs)
/// - Fitting encoded images under a byte budget (compress.rs)
/// - Loading the frame template, or generating a placeholder (template.rs)
/// - Validating and decoding the user's photo (ingest.rs)
///
/// Surfaces are `tiny_skia::Pixmap`s (premultiplied RGBA); decoding and
/// encoding go through the `image` crate. The helpers below convert between
/// the two. Decoding, resizing and encoding are CPU-bound and run through
/// `run_blocking` so the async runtime keeps serving pointer events.

pub mod compress;
pub mod ingest;
pub mod surface;
pub mod template;

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use tiny_skia::{IntSize, Pixmap};
use tokio::task::JoinError;

use crate::{Result, StudioError};

/// Run CPU-bound pixel work on the blocking pool
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(join_failure)?
}

/// A cancelled task may succeed when run again; a panicked one will not
fn join_failure(err: JoinError) -> StudioError {
    if err.is_cancelled() {
        StudioError::TransientIo(format!("background task cancelled: {err}"))
    } else {
        StudioError::encoding(format!("background task failed: {err}"))
    }
}

/// Convert a decoded image into a premultiplied pixmap
pub fn pixmap_from_image(image: &DynamicImage) -> Result<Pixmap> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| StudioError::validation("Image has no pixels."))?;

    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        let alpha = u16::from(px[3]);
        if alpha < 255 {
            px[0] = premultiply(px[0], alpha);
            px[1] = premultiply(px[1], alpha);
            px[2] = premultiply(px[2], alpha);
        }
    }

    Pixmap::from_vec(data, size).ok_or_else(|| StudioError::encoding("pixel buffer size mismatch"))
}

fn premultiply(channel: u8, alpha: u16) -> u8 {
    ((u16::from(channel) * alpha + 127) / 255) as u8
}

/// Straight-alpha RGBA copy of a pixmap, for display
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        dst.0 = [color.red(), color.green(), color.blue(), color.alpha()];
    }
    image
}

/// Composite a pixmap over white and drop alpha
///
/// JPEG has no alpha channel; transparent regions come out white.
pub fn flatten_over_white(pixmap: &Pixmap) -> RgbImage {
    let mut image = RgbImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        // Premultiplied: out = c + (255 - a)
        let white = 255 - src.alpha();
        *dst = Rgb([
            src.red().saturating_add(white),
            src.green().saturating_add(white),
            src.blue().saturating_add(white),
        ]);
    }
    image
}

/// Encode a surface as JPEG at `quality` in 0..=1
pub fn encode_pixmap_jpeg(pixmap: &Pixmap, quality: f64) -> Result<Vec<u8>> {
    let flat = DynamicImage::ImageRgb8(flatten_over_white(pixmap));
    compress::encode_jpeg(&flat, quality)
}
