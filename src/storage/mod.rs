//! Media storage module
//!
//! Handles:
//! - Image validation for uploads
//! - Media file writes under the configured media root

mod media;

pub use media::{ImageUpload, MediaStorage};
