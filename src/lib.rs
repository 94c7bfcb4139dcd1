/// Frame Studio
///
/// Place a photo inside a decorative frame, then export a composite, a
/// frame-free crop and the original, each fitted to a byte budget and
/// uploaded to an asset store.

pub mod config;
pub mod error;
pub mod geometry;
pub mod raster;
pub mod session;
pub mod state;
pub mod upload;

pub use config::StudioConfig;
pub use error::{Result, StudioError};
