//! Domain models - core tour types
//!
//! This module contains the canonical data types used throughout the system:
//! - `Property` / `RoomCatalog` - listings and the rooms a tour can show
//! - `TourState` / `TourPhase` - navigation state published to the renderer
//! - `TourSession` - per-visitor record written when a tour ends
//! - `VoiceCommand` / `RecognitionEvent` - speech input and its classification
//! - `ImageId` / `ImageTypeResult` - image identifiers and probe results

pub mod property;
pub mod tour;
pub mod types;
pub mod voice;

// Re-export commonly used types at module level
pub use property::{sample_properties, Property, RoomCatalog, RoomDescriptor, RoomKind};
pub use tour::{SwitchOutcome, TourPhase, TourSession, TourState};
pub use types::{ImageId, ImageTypeResult, PropertyId};
pub use voice::{CommandAction, FinalTranscript, PropertyFeature, RecognitionEvent, VoiceCommand};
