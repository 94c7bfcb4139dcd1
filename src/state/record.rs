/// The persisted result of a save
///
/// Links a product to the three uploaded assets and the placement that
/// produced them. The order flow reads it back by product id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transform::{CanvasDimensions, Transform};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationRecord {
    pub original_image_url: String,
    /// Photo composited into the frame
    pub rendered_image_url: String,
    /// Photo only, frame-free
    pub cropped_image_url: String,
    pub frame_image_url: String,
    pub transform: Transform,
    pub canvas_dimensions: CanvasDimensions,
    /// Serialized as RFC 3339
    pub created_at: DateTime<Utc>,
}

impl CustomizationRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
