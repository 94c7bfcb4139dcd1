/// State management module
///
/// This module holds everything that describes a customization in progress
/// or already saved:
/// - Photo placement and canvas size (transform.rs)
/// - Pointer gestures that change the placement (interaction.rs)
/// - The record written on save (record.rs)
/// - The SQLite store of saved records (library.rs)

pub mod interaction;
pub mod library;
pub mod record;
pub mod transform;
