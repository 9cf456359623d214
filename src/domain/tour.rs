//! Tour navigation state and the per-tour session record

use crate::domain::property::RoomKind;
use crate::domain::types::{epoch_ms, new_uuid_v7, PropertyId};
use serde::Serialize;
use smallvec::SmallVec;

/// Phase of the tour state machine
#[derive(Debug, Clone, PartialEq)]
pub enum TourPhase {
    /// Nothing rendered yet
    Idle,
    /// A room switch is in flight
    Loading { target: RoomKind },
    /// The room is rendered and settled
    Ready { room: RoomKind },
    /// The last switch failed; `last_good` is still on screen
    Error { message: String, last_good: Option<RoomKind> },
}

impl TourPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TourPhase::Idle => "idle",
            TourPhase::Loading { .. } => "loading",
            TourPhase::Ready { .. } => "ready",
            TourPhase::Error { .. } => "error",
        }
    }
}

/// Tour state as seen by the rendering layer
#[derive(Debug, Clone, PartialEq)]
pub struct TourState {
    /// Room recorded as current; drives the "currently viewing" label
    pub current_room: RoomKind,
    pub phase: TourPhase,
}

impl TourState {
    pub fn new(initial_room: RoomKind) -> Self {
        Self { current_room: initial_room, phase: TourPhase::Idle }
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, TourPhase::Loading { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            TourPhase::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Room that is settled on screen, if any
    pub fn ready_room(&self) -> Option<RoomKind> {
        match self.phase {
            TourPhase::Ready { room } => Some(room),
            _ => None,
        }
    }
}

/// Result of a room switch request
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchOutcome {
    /// Image applied to the scene and the room settled
    Applied { room: RoomKind, panoramic: bool },
    /// Room unknown or unavailable; state untouched
    Rejected,
    /// A later switch won the race; this result was dropped
    Superseded,
    /// Scene update failed; tour is in the error phase
    Failed(String),
}

impl SwitchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchOutcome::Applied { .. } => "applied",
            SwitchOutcome::Rejected => "rejected",
            SwitchOutcome::Superseded => "superseded",
            SwitchOutcome::Failed(_) => "failed",
        }
    }
}

/// One settled room in a tour session
#[derive(Debug, Clone, Serialize)]
pub struct RoomVisit {
    pub room: RoomKind,
    pub panoramic: bool,
    pub ts: u64,
}

/// Record of one visitor's tour, written out when the tour ends
#[derive(Debug, Clone, Serialize)]
pub struct TourSession {
    pub sid: String,
    pub property_id: PropertyId,
    pub started_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
    pub visits: SmallVec<[RoomVisit; 4]>,
    pub commands: u32,
    pub discarded: u32,
}

impl TourSession {
    pub fn new(property_id: PropertyId) -> Self {
        Self {
            sid: new_uuid_v7(),
            property_id,
            started_at: epoch_ms(),
            ended_at: None,
            visits: SmallVec::new(),
            commands: 0,
            discarded: 0,
        }
    }

    pub fn record_visit(&mut self, room: RoomKind, panoramic: bool) {
        self.visits.push(RoomVisit { room, panoramic, ts: epoch_ms() });
    }

    pub fn finish(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(epoch_ms());
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
