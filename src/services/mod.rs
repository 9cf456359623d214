//! Services - tour logic and state management
//!
//! This module contains the core tour services:
//! - `tour_controller` - Room navigation state machine and scene owner
//! - `probe_cache` - Per-image memoization of probe results
//! - `interpreter` - Keyword classification of voice transcripts
//! - `capture` - Speech recognizer lifecycle and confidence gate
//! - `assistant` - Voice command dispatch, replies, and session record

pub mod assistant;
pub mod capture;
pub mod interpreter;
pub mod probe_cache;
pub mod tour_controller;

// Re-export commonly used types
pub use assistant::{AssistantReply, TourAssistant};
pub use capture::{CaptureSettings, CaptureState, VoiceCaptureSession};
pub use interpreter::classify;
pub use probe_cache::CachedProbe;
pub use tour_controller::{ControllerSettings, TourController};
