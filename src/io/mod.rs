//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `api` - Backend endpoint URLs
//! - `listings` - Listing backend client with sample fallback
//! - `image_probe` - HTTP image type probe (panoramic vs flat)
//! - `scene` - 3D scene surfaces the tour renders into
//! - `speech` - Speech recognizer abstraction and line-fed recognizer
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod api;
pub mod image_probe;
pub mod listings;
pub mod prometheus;
pub mod scene;
pub mod speech;

// Re-export commonly used types
pub use api::ApiEndpoints;
pub use image_probe::{HttpImageProbe, ImageProbe};
pub use listings::{ListingsClient, ListingsLoad};
pub use scene::{HeadlessScene, PlaneLayout, SceneHost};
pub use speech::{LineRecognizer, RecognizerSettings, SpeechRecognizer};
