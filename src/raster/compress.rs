/// Byte-budget compression
///
/// Fits an encoded image under a byte budget while keeping JPEG quality as
/// high as possible, in a fixed number of encode calls:
/// - inputs already under budget are returned untouched
/// - oversized pixel dimensions are reduced first (aspect ratio kept)
/// - the starting quality depends on how far over budget the input is
/// - each over-budget result lowers quality by a power of the overshoot
/// - a result far under budget may raise quality once
///
/// Two profiles share the loop: the fast client profile used for exports and
/// ingestion, and the higher-fidelity server profile used for the original
/// image.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::{imageops::FilterType, DynamicImage, ExtendedColorType, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::run_blocking;
use crate::{Result, StudioError};

/// Starting quality for a range of `budget / original_size` ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityTier {
    /// Tier applies when the ratio is strictly above this
    pub above_ratio: f64,
    pub quality: f64,
}

/// How the first encode picks its quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialQuality {
    /// First matching tier wins; `fallback` when none match
    Tiered { tiers: Vec<QualityTier>, fallback: f64 },
    Fixed(f64),
}

/// Parameters of one compression variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionProfile {
    pub name: String,
    pub initial: InitialQuality,
    /// Exponent k in `quality *= (budget / size)^k`
    pub step_exponent: f64,
    /// Exponent for the single upward nudge; no nudge when unset
    pub nudge_exponent: Option<f64>,
    /// Nudge only when the result is below `budget * far_under_ratio`
    pub far_under_ratio: f64,
    pub quality_floor: f64,
    pub quality_ceiling: f64,
    /// Encodes allowed after the first one
    pub max_refinements: u32,
    /// Longest side before any quality search
    pub max_dimension: u32,
}

impl CompressionProfile {
    /// Fast variant used for exported previews and ingestion
    pub fn client() -> Self {
        Self {
            name: "client".to_string(),
            initial: InitialQuality::Tiered {
                tiers: vec![
                    QualityTier { above_ratio: 0.8, quality: 0.99 },
                    QualityTier { above_ratio: 0.6, quality: 0.97 },
                    QualityTier { above_ratio: 0.3, quality: 0.94 },
                ],
                fallback: 0.91,
            },
            step_exponent: 0.9,
            nudge_exponent: Some(0.3),
            far_under_ratio: 0.8,
            quality_floor: 0.3,
            quality_ceiling: 0.99,
            max_refinements: 3,
            max_dimension: 6000,
        }
    }

    /// Higher-fidelity variant: coarse 95% to 60% descent, no nudging
    pub fn server() -> Self {
        Self {
            name: "server".to_string(),
            initial: InitialQuality::Fixed(0.95),
            step_exponent: 0.85,
            nudge_exponent: None,
            far_under_ratio: 0.8,
            quality_floor: 0.6,
            quality_ceiling: 0.95,
            max_refinements: 2,
            max_dimension: 6000,
        }
    }

    /// Server variant tuned for keeping the high-resolution original
    pub fn server_original() -> Self {
        Self {
            name: "server-original".to_string(),
            initial: InitialQuality::Fixed(0.98),
            quality_ceiling: 0.98,
            max_dimension: 8000,
            ..Self::server()
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Quality for the first encode given `budget / original_size`
    pub fn initial_quality(&self, ratio: f64) -> f64 {
        let quality = match &self.initial {
            InitialQuality::Tiered { tiers, fallback } => tiers
                .iter()
                .find(|tier| ratio > tier.above_ratio)
                .map(|tier| tier.quality)
                .unwrap_or(*fallback),
            InitialQuality::Fixed(quality) => *quality,
        };
        quality.clamp(self.quality_floor, self.quality_ceiling)
    }
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self::client()
    }
}

/// Outcome of one compression call
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub blob: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    /// compressed / original
    pub ratio: f64,
    pub was_compressed: bool,
    /// Quality of the returned encode, if one was returned
    pub quality: Option<f64>,
    /// Encoder calls made
    pub encodes: u32,
}

impl CompressionResult {
    fn unchanged(blob: &[u8], encodes: u32) -> Self {
        Self {
            blob: blob.to_vec(),
            original_size: blob.len(),
            compressed_size: blob.len(),
            ratio: 1.0,
            was_compressed: false,
            quality: None,
            encodes,
        }
    }

    pub fn fits(&self, budget: usize) -> bool {
        self.compressed_size <= budget
    }
}

/// Something that turns pixels into bytes at a quality in 0..=1
///
/// Encoders are cloned into blocking tasks, one per encode.
pub trait RasterEncoder: Clone + Send + Sync + 'static {
    fn encode(&self, image: &DynamicImage, quality: f64) -> Result<Vec<u8>>;
}

/// Baseline JPEG encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl RasterEncoder for JpegEncoder {
    fn encode(&self, image: &DynamicImage, quality: f64) -> Result<Vec<u8>> {
        encode_jpeg(image, quality)
    }
}

/// Encode `image` as JPEG, dropping any alpha channel
pub fn encode_jpeg(image: &DynamicImage, quality: f64) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let quality = (quality * 100.0).round().clamp(1.0, 100.0) as u8;

    let mut buffer = Cursor::new(Vec::new());
    ImageJpegEncoder::new_with_quality(&mut buffer, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| StudioError::encoding(e.to_string()))?;

    let bytes = buffer.into_inner();
    if bytes.is_empty() {
        return Err(StudioError::encoding("encoder produced no output"));
    }
    Ok(bytes)
}

/// Shrink `image` so its longest side is at most `max_dimension`
pub fn fit_within(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return image;
    }

    let resized = image.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    debug!(
        from_width = width,
        from_height = height,
        to_width = resized.width(),
        to_height = resized.height(),
        "downscaled before compression"
    );
    resized
}

/// One encode the loop can fall back on
struct Attempt {
    blob: Vec<u8>,
    quality: f64,
}

/// Budget-targeting compressor for one profile
#[derive(Debug, Clone)]
pub struct Compressor<E = JpegEncoder> {
    profile: CompressionProfile,
    encoder: E,
    absolute_ceiling: usize,
}

impl Compressor<JpegEncoder> {
    pub fn new(profile: CompressionProfile, absolute_ceiling: usize) -> Self {
        Self::with_encoder(profile, JpegEncoder, absolute_ceiling)
    }
}

impl<E: RasterEncoder> Compressor<E> {
    pub fn with_encoder(profile: CompressionProfile, encoder: E, absolute_ceiling: usize) -> Self {
        Self {
            profile,
            encoder,
            absolute_ceiling,
        }
    }

    pub fn profile(&self) -> &CompressionProfile {
        &self.profile
    }

    /// Fit an encoded image under `budget`.
    ///
    /// Inputs above the absolute ceiling are rejected as a validation error.
    /// Undecodable inputs come back unchanged.
    pub async fn compress_to_budget(&self, blob: &[u8], budget: usize) -> Result<CompressionResult> {
        self.check_ceiling(blob.len())?;

        if blob.len() <= budget {
            return Ok(CompressionResult::unchanged(blob, 0));
        }

        let input = blob.to_vec();
        let decoded = run_blocking(move || {
            image::load_from_memory(&input).map_err(|e| StudioError::encoding(e.to_string()))
        })
        .await;

        let image = match decoded {
            Ok(image) => image,
            Err(e) => {
                warn!(profile = %self.profile.name, error = %e, "could not decode input, keeping it as-is");
                return Ok(CompressionResult::unchanged(blob, 0));
            }
        };

        self.compress_decoded(image, blob, budget).await
    }

    /// Same as [`compress_to_budget`](Self::compress_to_budget) for an input
    /// whose pixels are already decoded; `original` is returned when nothing
    /// better can be produced.
    pub async fn compress_decoded(
        &self,
        image: DynamicImage,
        original: &[u8],
        budget: usize,
    ) -> Result<CompressionResult> {
        self.check_ceiling(original.len())?;

        let original_size = original.len();
        if original_size <= budget {
            return Ok(CompressionResult::unchanged(original, 0));
        }

        let max_dimension = self.profile.max_dimension;
        let image = Arc::new(run_blocking(move || Ok(fit_within(image, max_dimension))).await?);
        let profile = &self.profile;
        let ratio = budget as f64 / original_size as f64;
        let mut quality = profile.initial_quality(ratio);

        let mut fitting: Option<Attempt> = None;
        let mut smallest_over: Option<Attempt> = None;
        let mut nudged = false;
        let mut encodes = 0u32;

        for round in 0..=profile.max_refinements {
            let encoder = self.encoder.clone();
            let pixels = Arc::clone(&image);
            let encoded = run_blocking(move || encoder.encode(&pixels, quality)).await;
            let blob = match encoded {
                Ok(blob) => blob,
                Err(e) => {
                    warn!(profile = %profile.name, quality, error = %e, "encode failed");
                    break;
                }
            };
            encodes += 1;
            let size = blob.len();
            debug!(
                profile = %profile.name,
                attempt = round + 1,
                quality,
                size = %format_size(size),
                target = %format_size(budget),
                "compression attempt"
            );

            // Let pointer events through between encodes
            tokio::task::yield_now().await;

            let rounds_left = round < profile.max_refinements;

            if size <= budget {
                if fitting.as_ref().map_or(true, |best| size > best.blob.len()) {
                    fitting = Some(Attempt { blob, quality });
                }

                let far_under = (size as f64) < budget as f64 * profile.far_under_ratio;
                match profile.nudge_exponent {
                    Some(exponent) if !nudged && far_under && rounds_left && size > 0 => {
                        let raised = (quality * (budget as f64 / size as f64).powf(exponent))
                            .min(profile.quality_ceiling);
                        if raised > quality {
                            debug!(from = quality, to = raised, "raising quality");
                            quality = raised;
                            nudged = true;
                            continue;
                        }
                    }
                    _ => {}
                }
                break;
            }

            if smallest_over.as_ref().map_or(true, |best| size < best.blob.len()) {
                smallest_over = Some(Attempt { blob, quality });
            }

            // An overshooting nudge keeps the earlier fitting encode
            if fitting.is_some() || !rounds_left || quality <= profile.quality_floor {
                break;
            }

            let reduced = (quality * (budget as f64 / size as f64).powf(profile.step_exponent))
                .max(profile.quality_floor);
            debug!(from = quality, to = reduced, "reducing quality");
            quality = reduced;
        }

        let chosen = match (fitting, smallest_over) {
            (Some(attempt), _) => attempt,
            (None, Some(attempt)) if attempt.blob.len() < original_size => attempt,
            (None, Some(_)) => {
                warn!(profile = %profile.name, "every encode was larger than the input, keeping it");
                return Ok(CompressionResult::unchanged(original, encodes));
            }
            (None, None) => {
                warn!(profile = %profile.name, "no encode succeeded, keeping the input");
                return Ok(CompressionResult::unchanged(original, encodes));
            }
        };

        let compressed_size = chosen.blob.len();
        if compressed_size > budget {
            warn!(
                profile = %profile.name,
                size = %format_size(compressed_size),
                target = %format_size(budget),
                "budget not reached within the iteration cap"
            );
        } else {
            info!(
                profile = %profile.name,
                from = %format_size(original_size),
                to = %format_size(compressed_size),
                quality = chosen.quality,
                "compressed"
            );
        }

        Ok(CompressionResult {
            blob: chosen.blob,
            original_size,
            compressed_size,
            ratio: compressed_size as f64 / original_size as f64,
            was_compressed: true,
            quality: Some(chosen.quality),
            encodes,
        })
    }

    fn check_ceiling(&self, size: usize) -> Result<()> {
        if size > self.absolute_ceiling {
            return Err(StudioError::validation(format!(
                "File too large. Please use an image smaller than {}.",
                format_size(self.absolute_ceiling)
            )));
        }
        Ok(())
    }
}

/// Human-readable byte count, e.g. `2.5 MB`
pub fn format_size(bytes: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    // Two decimals, trailing zeros trimmed
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MB;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::thread::ThreadId;

    /// Encoder whose output size follows `full_size * quality^exponent`
    #[derive(Clone)]
    struct CurveEncoder {
        full_size: usize,
        exponent: f64,
        calls: Arc<AtomicU32>,
    }

    impl CurveEncoder {
        fn new(full_size: usize, exponent: f64) -> Self {
            Self {
                full_size,
                exponent,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl RasterEncoder for CurveEncoder {
        fn encode(&self, _image: &DynamicImage, quality: f64) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let size = (self.full_size as f64 * quality.powf(self.exponent)) as usize;
            Ok(vec![0u8; size.max(1)])
        }
    }

    #[derive(Clone)]
    struct FailingEncoder;

    /// Records the thread each encode runs on
    #[derive(Clone, Default)]
    struct ThreadRecorder {
        threads: Arc<Mutex<Vec<ThreadId>>>,
    }

    impl RasterEncoder for ThreadRecorder {
        fn encode(&self, image: &DynamicImage, quality: f64) -> Result<Vec<u8>> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            encode_jpeg(image, quality)
        }
    }

    impl RasterEncoder for FailingEncoder {
        fn encode(&self, _image: &DynamicImage, _quality: f64) -> Result<Vec<u8>> {
            Err(StudioError::encoding("no output"))
        }
    }

    fn small_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(32, 24, |x, y| {
            Rgb([(x * 7) as u8, (y * 9) as u8, ((x + y) * 3) as u8])
        }))
    }

    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let mut seed = 0x2545_f491u32;
        let image = RgbImage::from_fn(width, height, |_, _| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let [r, g, b, _] = seed.to_le_bytes();
            Rgb([r, g, b])
        });
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_client_tiers_follow_the_budget_ratio() {
        let profile = CompressionProfile::client();
        assert_eq!(profile.initial_quality(0.9), 0.99);
        assert_eq!(profile.initial_quality(0.7), 0.97);
        assert_eq!(profile.initial_quality(0.4), 0.94);
        assert_eq!(profile.initial_quality(0.3), 0.91);
        assert_eq!(profile.initial_quality(0.05), 0.91);
    }

    #[test]
    fn test_server_profiles_start_high_and_floor_at_sixty() {
        let server = CompressionProfile::server();
        assert_eq!(server.initial_quality(0.1), 0.95);
        assert_eq!(server.quality_floor, 0.6);

        let original = CompressionProfile::server_original();
        assert_eq!(original.initial_quality(0.1), 0.98);
        assert_eq!(original.max_dimension, 8000);
    }

    #[tokio::test]
    async fn test_input_under_budget_is_returned_unchanged() {
        let input = noisy_png(8, 8);
        let compressor = Compressor::new(CompressionProfile::client(), 100 * MB);

        let result = compressor.compress_to_budget(&input, input.len() + 1).await.unwrap();

        assert!(!result.was_compressed);
        assert_eq!(result.blob, input);
        assert_eq!(result.ratio, 1.0);
        assert_eq!(result.encodes, 0);
    }

    #[tokio::test]
    async fn test_input_over_ceiling_is_a_validation_error() {
        let compressor = Compressor::new(CompressionProfile::client(), 16);
        let err = compressor.compress_to_budget(&[0u8; 64], 8).await.unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ten_megabytes_fit_three_within_four_encodes() {
        let encoder = CurveEncoder::new(10 * MB, 4.0);
        let compressor =
            Compressor::with_encoder(CompressionProfile::client(), encoder.clone(), 100 * MB);
        let original = vec![0u8; 10 * MB];

        let result = compressor
            .compress_decoded(small_image(), &original, 3 * MB)
            .await
            .unwrap();

        assert!(result.was_compressed);
        assert!(result.compressed_size <= 3 * MB);
        assert!(result.encodes <= 4);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), result.encodes);
    }

    #[tokio::test]
    async fn test_unreachable_budget_stops_at_the_iteration_cap() {
        // Output never shrinks below 5 MB, so 1 MB cannot be met
        #[derive(Clone)]
        struct Stubborn;
        impl RasterEncoder for Stubborn {
            fn encode(&self, _image: &DynamicImage, _quality: f64) -> Result<Vec<u8>> {
                Ok(vec![0u8; 5 * MB])
            }
        }

        let profile = CompressionProfile::client();
        let cap = profile.max_refinements + 1;
        let compressor = Compressor::with_encoder(profile, Stubborn, 100 * MB);
        let original = vec![0u8; 10 * MB];

        let result = compressor
            .compress_decoded(small_image(), &original, MB)
            .await
            .unwrap();

        assert!(result.encodes <= cap);
        assert!(result.was_compressed);
        assert_eq!(result.compressed_size, 5 * MB);
    }

    #[tokio::test]
    async fn test_far_under_budget_nudges_quality_up_once() {
        // Steep curve: the first reduction lands well under budget
        let encoder = CurveEncoder::new(10 * MB, 8.0);
        let compressor =
            Compressor::with_encoder(CompressionProfile::client(), encoder.clone(), 100 * MB);
        let original = vec![0u8; 10 * MB];

        let result = compressor
            .compress_decoded(small_image(), &original, 3 * MB)
            .await
            .unwrap();

        assert!(result.fits(3 * MB));
        assert!(result.encodes >= 3);
        assert!(result.encodes <= 4);
    }

    #[tokio::test]
    async fn test_encoder_failure_falls_back_to_the_input() {
        let compressor =
            Compressor::with_encoder(CompressionProfile::server(), FailingEncoder, 100 * MB);
        let original = vec![7u8; 4096];

        let result = compressor
            .compress_decoded(small_image(), &original, 1024)
            .await
            .unwrap();

        assert!(!result.was_compressed);
        assert_eq!(result.blob, original);
    }

    #[tokio::test]
    async fn test_undecodable_input_is_kept() {
        let compressor = Compressor::new(CompressionProfile::client(), 100 * MB);
        let garbage = vec![1u8; 2048];

        let result = compressor.compress_to_budget(&garbage, 1024).await.unwrap();

        assert!(!result.was_compressed);
        assert_eq!(result.blob, garbage);
    }

    #[tokio::test]
    async fn test_real_jpeg_round_shrinks_noisy_png() {
        let input = noisy_png(256, 256);
        let budget = input.len() / 4;
        let compressor = Compressor::new(CompressionProfile::client(), 100 * MB);

        let result = compressor.compress_to_budget(&input, budget).await.unwrap();

        assert!(result.was_compressed);
        assert!(result.compressed_size < input.len());
        assert!(result.encodes <= 4);
        assert!(image::load_from_memory(&result.blob).is_ok());
    }

    #[tokio::test]
    async fn test_encodes_run_off_the_runtime_thread() {
        let recorder = ThreadRecorder::default();
        let compressor =
            Compressor::with_encoder(CompressionProfile::client(), recorder.clone(), 100 * MB);
        let original = vec![0u8; 10 * MB];

        let result = compressor
            .compress_decoded(small_image(), &original, 3 * MB)
            .await
            .unwrap();

        let runtime_thread = std::thread::current().id();
        let threads = recorder.threads.lock().unwrap();
        assert_eq!(threads.len() as u32, result.encodes);
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[test]
    fn test_oversized_images_are_downscaled_keeping_aspect() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(400, 100));
        let fitted = fit_within(image, 200);
        assert_eq!(fitted.dimensions(), (200, 50));

        let untouched = fit_within(DynamicImage::ImageRgb8(RgbImage::new(120, 80)), 200);
        assert_eq!(untouched.dimensions(), (120, 80));
    }

    #[test]
    fn test_sizes_are_human_readable() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(512), "512 Bytes");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * MB), "3 MB");
    }
}
