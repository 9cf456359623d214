//! Shared types for the tour core

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Minimum width/height ratio for an image to be wrapped as a 360° sky.
/// A true equirectangular panorama is 2:1; the band below that tolerates
/// cropped exports.
pub const PANORAMA_MIN_RATIO: f64 = 1.8;

/// Newtype wrapper for image-store identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for listing identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub String);

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of inspecting an image's pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageTypeResult {
    pub is_panoramic: bool,
    pub width: u32,
    pub height: u32,
}

impl ImageTypeResult {
    /// Classify by aspect ratio using the default panorama threshold
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::with_ratio(width, height, PANORAMA_MIN_RATIO)
    }

    /// Classify by aspect ratio: panoramic iff `width / height >= min_ratio`
    pub fn with_ratio(width: u32, height: u32, min_ratio: f64) -> Self {
        let is_panoramic = height > 0 && (width as f64 / height as f64) >= min_ratio;
        Self { is_panoramic, width, height }
    }

    /// Result used when the image could not be loaded: render it flat
    pub const fn unloaded() -> Self {
        Self { is_panoramic: false, width: 0, height: 0 }
    }

    #[inline]
    pub fn is_unloaded(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
