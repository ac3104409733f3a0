//! Image values exchanged between capture, analysis and transformation.
//!
//! A captured frame arrives as [`ImageData`] (raw bytes + MIME type).
//! Providers may hand back either inline bytes or a URL, so the pipeline
//! carries the wider [`Image`] type and resolves remote images only when the
//! bytes are actually needed.

pub mod image;

pub use image::{fetch_image, Image, ImageData, MediaError};
