/// Placement of the uploaded photo on the canvas
///
/// The transform is the single source of truth for where the photo sits.
/// Everything else (handles, draw size, rendered surfaces) is derived from it
/// on demand. It is serialized into the persisted customization record.

use cgmath::Point2;
use serde::{Deserialize, Serialize};

use crate::config::CanvasConfig;
use crate::geometry::MIN_SCALE;

/// Position, scale and rotation of the photo
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Center of the photo on the canvas (x, canvas pixels)
    pub x: f64,

    /// Center of the photo on the canvas (y, canvas pixels, y-down)
    pub y: f64,

    /// Multiplier on the cover-fit size
    /// - 1.0 = photo exactly covers the canvas
    /// - never below 0.1
    pub scale: f64,

    /// Rotation in degrees, clockwise on screen
    /// - not normalized; 370.0 and 10.0 draw the same
    #[serde(rename = "rotation")]
    pub rotation_degrees: f64,
}

impl Transform {
    /// Centered, unscaled, unrotated transform for a canvas
    pub fn centered(canvas: &CanvasDimensions) -> Self {
        Self {
            x: canvas.width / 2.0,
            y: canvas.height / 2.0,
            scale: 1.0,
            rotation_degrees: 0.0,
        }
    }

    /// Return to the centered default, whatever the previous state
    pub fn reset(&mut self, canvas: &CanvasDimensions) {
        *self = Self::centered(canvas);
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn move_to(&mut self, position: Point2<f64>) {
        self.x = position.x;
        self.y = position.y;
    }

    /// Set the scale, flooring it at the minimum
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale.max(MIN_SCALE);
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        self.rotation_degrees = degrees;
    }

    /// Check if the photo sits at the centered default
    pub fn is_default_for(&self, canvas: &CanvasDimensions) -> bool {
        *self == Self::centered(canvas)
    }
}

/// Logical size of the editing canvas
///
/// Derived once from the frame template and fixed for the session.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CanvasDimensions {
    pub width: f64,
    pub height: f64,
}

impl CanvasDimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Size the canvas after a frame template of `frame_width` x `frame_height`
    ///
    /// Landscape frames are limited by the maximum width, portrait frames by
    /// the maximum height; both sides are then raised to the minimums.
    pub fn from_frame(frame_width: f64, frame_height: f64, limits: &CanvasConfig) -> Self {
        if frame_width <= 0.0 || frame_height <= 0.0 {
            return Self::new(limits.max_width, limits.max_height);
        }

        let frame_aspect = frame_width / frame_height;
        let (width, height) = if frame_aspect > 1.0 {
            let width = limits.max_width.min(frame_width);
            (width, width / frame_aspect)
        } else {
            let height = limits.max_height.min(frame_height);
            (height * frame_aspect, height)
        };

        Self {
            width: width.max(limits.min_width),
            height: height.max(limits.min_height),
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    /// Backing-store size in device pixels for a given pixel ratio
    pub fn device_size(&self, pixel_ratio: f32) -> (u32, u32) {
        let ratio = f64::from(pixel_ratio.max(1.0));
        (
            (self.width * ratio).round().max(1.0) as u32,
            (self.height * ratio).round().max(1.0) as u32,
        )
    }
}

impl Default for CanvasDimensions {
    fn default() -> Self {
        Self::new(300.0, 400.0)
    }
}
