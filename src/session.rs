/// Editing session and the save flow.
///
/// A [`StudioSession`] owns everything on screen for one product: the frame,
/// the placed photo and the interaction controller. Saving happens in two
/// steps so the UI thread never blocks:
///
/// 1. [`StudioSession::prepare_save`] snapshots the placement into a
///    [`SaveJob`] and marks the session as saving.
/// 2. [`SaveJob::execute`] renders the exports, fits each one to its budget,
///    uploads the three assets concurrently and writes the record.
///
/// The session refuses a second save until [`StudioSession::finish_save`].

use std::sync::Arc;

use chrono::Utc;
use tiny_skia::Pixmap;
use tracing::{error, info, warn};

use crate::config::StudioConfig;
use crate::raster::compress::{encode_jpeg, fit_within, format_size, CompressionResult, Compressor};
use crate::raster::{encode_pixmap_jpeg, run_blocking};
use crate::raster::ingest::UploadedImage;
use crate::raster::surface::{Renderer, Scene};
use crate::raster::template::FrameTemplate;
use crate::state::interaction::{Action, InteractionController};
use crate::state::library::CustomizationLibrary;
use crate::state::record::CustomizationRecord;
use crate::state::transform::{CanvasDimensions, Transform};
use crate::upload::{AssetKind, SaveUploads, Uploader};
use crate::{Result, StudioError};

/// The product being customized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    /// URL-safe name, used in asset filenames.
    pub handle: String,
}

pub struct StudioSession {
    product: Product,
    frame: Arc<FrameTemplate>,
    controller: InteractionController,
    image: Option<Arc<UploadedImage>>,
    renderer: Renderer,
    config: StudioConfig,
    saving: bool,
}

impl StudioSession {
    pub fn new(product: Product, frame: FrameTemplate, config: StudioConfig) -> Self {
        let canvas = frame.canvas_dimensions(&config.canvas);
        info!(
            product = %product.id,
            width = canvas.width,
            height = canvas.height,
            fallback_frame = frame.fallback,
            "session started"
        );

        Self {
            product,
            frame: Arc::new(frame),
            controller: InteractionController::new(canvas),
            image: None,
            renderer: Renderer::new(config.canvas.pixel_ratio),
            config,
            saving: false,
        }
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn frame(&self) -> &FrameTemplate {
        &self.frame
    }

    pub fn canvas(&self) -> &CanvasDimensions {
        self.controller.canvas()
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut InteractionController {
        &mut self.controller
    }

    pub fn image(&self) -> Option<&Arc<UploadedImage>> {
        self.image.as_ref()
    }

    /// Replace the photo; placement starts over.
    pub fn set_image(&mut self, image: Arc<UploadedImage>) -> Vec<Action> {
        let (width, height) = image.dimensions();
        self.image = Some(image);
        self.controller.set_image(width, height)
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn can_save(&self) -> bool {
        self.image.is_some() && !self.saving
    }

    /// Composite with the handle overlay, for the editor view.
    pub fn render_view(&self) -> Result<Pixmap> {
        let transform = self.controller.transform();
        let scene = Scene {
            canvas: self.controller.canvas(),
            transform,
            image: self.image.as_ref().map(|image| &image.pixmap),
            frame: &self.frame.pixmap,
        };
        self.renderer
            .render_composite(scene, self.controller.handles().as_ref())
    }

    /// Snapshot the current placement for saving.
    pub fn prepare_save(&mut self) -> Result<SaveJob> {
        if self.saving {
            return Err(StudioError::SaveInFlight);
        }
        let image = self
            .image
            .clone()
            .ok_or_else(|| StudioError::validation("Please upload an image first."))?;

        self.saving = true;
        Ok(SaveJob {
            product: self.product.clone(),
            frame: Arc::clone(&self.frame),
            image,
            transform: *self.controller.transform(),
            canvas: *self.controller.canvas(),
            renderer: self.renderer,
            config: self.config.clone(),
        })
    }

    /// Allow the next save, whatever the outcome of the last one.
    pub fn finish_save(&mut self) {
        self.saving = false;
    }
}

/// Encoded exports before budget fitting.
#[derive(Debug, Clone)]
pub struct Exports {
    pub rendered: Vec<u8>,
    pub cropped: Vec<u8>,
    pub original: Vec<u8>,
}

/// Sizes before and after fitting, per asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSummary {
    pub kind: AssetKind,
    pub original_size: usize,
    pub compressed_size: usize,
    pub was_compressed: bool,
}

impl CompressionSummary {
    fn new(kind: AssetKind, result: &CompressionResult) -> Self {
        Self {
            kind,
            original_size: result.original_size,
            compressed_size: result.compressed_size,
            was_compressed: result.was_compressed,
        }
    }
}

/// What a save produced.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub uploads: SaveUploads,
    pub compression: Vec<CompressionSummary>,
    /// Written only when all three uploads succeeded.
    pub record: Option<CustomizationRecord>,
}

impl SaveOutcome {
    pub fn is_complete(&self) -> bool {
        self.record.is_some()
    }

    /// One line for the status bar.
    pub fn summary(&self) -> String {
        if self.is_complete() {
            return "Customization saved.".to_string();
        }
        let failed: Vec<String> = self
            .uploads
            .failures()
            .iter()
            .map(|upload| match &upload.result {
                Err(e) => format!("{}: {}", upload.kind, StudioError::from(e.clone()).user_message()),
                Ok(_) => upload.kind.to_string(),
            })
            .collect();
        format!("Some uploads failed ({})", failed.join("; "))
    }
}

/// Everything needed to finish a save off the UI thread.
pub struct SaveJob {
    product: Product,
    frame: Arc<FrameTemplate>,
    image: Arc<UploadedImage>,
    transform: Transform,
    canvas: CanvasDimensions,
    renderer: Renderer,
    config: StudioConfig,
}

impl SaveJob {
    pub fn product(&self) -> &Product {
        &self.product
    }

    /// Render and encode the three exports, without the handle overlay.
    pub fn render_exports(&self) -> Result<Exports> {
        let scene = Scene {
            canvas: &self.canvas,
            transform: &self.transform,
            image: Some(&self.image.pixmap),
            frame: &self.frame.pixmap,
        };
        let quality = self.config.compression.render_quality;

        let rendered = encode_pixmap_jpeg(&self.renderer.render_composite(scene, None)?, quality)?;
        let cropped = encode_pixmap_jpeg(&self.renderer.render_content(scene)?, quality)?;

        let original = fit_within(
            self.image.image.clone(),
            self.config.compression.original_max_dimension,
        );
        let original = encode_jpeg(&original, self.config.compression.original_quality)?;

        Ok(Exports {
            rendered,
            cropped,
            original,
        })
    }

    /// Run the save: export, fit to budgets, upload, record.
    ///
    /// Upload failures are reported in the outcome rather than as an error;
    /// the record is only written when every asset made it.
    pub async fn execute(
        self,
        uploader: &Uploader,
        library: &CustomizationLibrary,
    ) -> Result<SaveOutcome> {
        let job = Arc::new(self);

        let exports = {
            let job = Arc::clone(&job);
            run_blocking(move || job.render_exports()).await?
        };

        let compression = &job.config.compression;
        let client = Compressor::new(compression.client.clone(), compression.absolute_ceiling);
        let server = Compressor::new(compression.server.clone(), compression.absolute_ceiling);

        let (rendered, cropped, original) = tokio::join!(
            client.compress_to_budget(&exports.rendered, compression.rendered_budget),
            client.compress_to_budget(&exports.cropped, compression.cropped_budget),
            server.compress_to_budget(&exports.original, compression.original_budget),
        );
        let (rendered, cropped, original) = (rendered?, cropped?, original?);

        let summaries = vec![
            CompressionSummary::new(AssetKind::Rendered, &rendered),
            CompressionSummary::new(AssetKind::Cropped, &cropped),
            CompressionSummary::new(AssetKind::Original, &original),
        ];
        for summary in &summaries {
            info!(
                kind = %summary.kind,
                from = %format_size(summary.original_size),
                to = %format_size(summary.compressed_size),
                "export ready"
            );
        }

        let uploads = uploader
            .upload_all(
                rendered.blob,
                cropped.blob,
                original.blob,
                &job.product.handle,
                Utc::now().timestamp_millis(),
            )
            .await;

        let record = match (
            uploads.rendered.url(),
            uploads.cropped.url(),
            uploads.original.url(),
        ) {
            (Some(rendered), Some(cropped), Some(original)) => {
                let record = CustomizationRecord {
                    original_image_url: original.to_string(),
                    rendered_image_url: rendered.to_string(),
                    cropped_image_url: cropped.to_string(),
                    frame_image_url: job.frame.source.clone(),
                    transform: job.transform,
                    canvas_dimensions: job.canvas,
                    created_at: Utc::now(),
                };
                library.save(&job.product.id, &record)?;
                info!(product = %job.product.id, "customization recorded");
                Some(record)
            }
            _ => {
                for failure in uploads.failures() {
                    if let Err(e) = &failure.result {
                        error!(kind = %failure.kind, error = %e, "asset upload failed");
                    }
                }
                warn!(product = %job.product.id, "record not written, uploads incomplete");
                None
            }
        };

        Ok(SaveOutcome {
            uploads,
            compression: summaries,
            record,
        })
    }
}
