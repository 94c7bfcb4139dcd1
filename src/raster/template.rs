/// Frame template loading
///
/// The frame is fetched once per session, by URL or from disk. When it
/// cannot be loaded the session continues with a generated placeholder and
/// the shell tells the user.

use std::io::Read;
use std::path::Path;

use tiny_skia::{Color, PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform as SkTransform};
use tracing::{info, warn};

use super::pixmap_from_image;
use super::surface::eraser;
use crate::config::{CanvasConfig, MB};
use crate::state::transform::CanvasDimensions;
use crate::{Result, StudioError};

const PLACEHOLDER_WIDTH: u32 = 300;
const PLACEHOLDER_HEIGHT: u32 = 400;
const PLACEHOLDER_BAND: f32 = 28.0;
/// Largest frame download accepted
const MAX_TEMPLATE_BYTES: u64 = 25 * MB as u64;

#[derive(Debug, Clone)]
pub struct FrameTemplate {
    /// URL or path it was loaded from; empty for a placeholder
    pub source: String,
    pub pixmap: Pixmap,
    /// Loading failed and `pixmap` is the placeholder
    pub fallback: bool,
}

impl FrameTemplate {
    /// Load from `source`, substituting the placeholder on any failure
    pub async fn load(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Self::placeholder();
        }

        match Self::try_load(source).await {
            Ok(template) => {
                info!(
                    source,
                    width = template.width(),
                    height = template.height(),
                    "frame template loaded"
                );
                Ok(template)
            }
            Err(e) => {
                warn!(source, error = %e, "frame template failed to load, using placeholder");
                Ok(Self {
                    source: source.to_string(),
                    fallback: true,
                    ..Self::placeholder()?
                })
            }
        }
    }

    pub async fn try_load(source: &str) -> Result<Self> {
        let bytes = if is_remote(source) {
            fetch(source.to_string()).await?
        } else {
            tokio::fs::read(Path::new(source))
                .await
                .map_err(|e| StudioError::load("frame template", e))?
        };
        Self::from_bytes(source, &bytes)
    }

    pub fn from_bytes(source: &str, bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| StudioError::load("frame template", e))?;
        Ok(Self {
            source: source.to_string(),
            pixmap: pixmap_from_image(&image)?,
            fallback: false,
        })
    }

    /// Plain frame band around a transparent window with a dashed guide
    pub fn placeholder() -> Result<Self> {
        Ok(Self {
            source: String::new(),
            pixmap: placeholder_pixmap()?,
            fallback: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn canvas_dimensions(&self, limits: &CanvasConfig) -> CanvasDimensions {
        CanvasDimensions::from_frame(f64::from(self.width()), f64::from(self.height()), limits)
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn fetch(url: String) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let response = ureq::get(&url)
            .timeout(std::time::Duration::from_secs(30))
            .call()
            .map_err(|e| StudioError::load("frame template", e))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_TEMPLATE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| StudioError::load("frame template", e))?;
        Ok(bytes)
    })
    .await
    .map_err(|e| StudioError::load("frame template", e))?
}

fn placeholder_pixmap() -> Result<Pixmap> {
    let (w, h) = (PLACEHOLDER_WIDTH as f32, PLACEHOLDER_HEIGHT as f32);
    let mut pixmap = Pixmap::new(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)
        .ok_or_else(|| StudioError::encoding("placeholder frame has no pixels"))?;
    pixmap.fill(Color::from_rgba8(0x6b, 0x4f, 0x3a, 255));

    let band = PLACEHOLDER_BAND;
    if let Some(window) = Rect::from_xywh(band, band, w - 2.0 * band, h - 2.0 * band) {
        pixmap.fill_rect(window, &eraser(), SkTransform::identity(), None);

        let mut guide = tiny_skia::Paint::default();
        guide.set_color_rgba8(0xd1, 0xd5, 0xdb, 255);
        guide.anti_alias = true;
        let stroke = Stroke {
            width: 1.0,
            dash: StrokeDash::new(vec![4.0, 4.0], 0.0),
            ..Stroke::default()
        };
        let path = PathBuilder::from_rect(window);
        pixmap.stroke_path(&path, &guide, &stroke, SkTransform::identity(), None);
    }

    Ok(pixmap)
}
