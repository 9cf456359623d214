//! Voice command and speech recognition types

use crate::domain::property::RoomKind;

/// Confidence assigned to each classification category
pub const NAVIGATION_CONFIDENCE: f32 = 0.8;
pub const DESCRIPTION_CONFIDENCE: f32 = 0.8;
pub const PROPERTY_INFO_CONFIDENCE: f32 = 0.7;
pub const CONTROL_CONFIDENCE: f32 = 0.9;
pub const FALLBACK_CONFIDENCE: f32 = 0.1;

/// Property detail a visitor asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyFeature {
    Price,
    Size,
    Features,
    Location,
}

impl PropertyFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyFeature::Price => "price",
            PropertyFeature::Size => "size",
            PropertyFeature::Features => "features",
            PropertyFeature::Location => "location",
        }
    }
}

/// What a voice command asks the tour to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Go to a room; `None` when no room name was recognized
    Navigate(Option<RoomKind>),
    Describe,
    Help,
    Exit,
    PropertyInfo(Option<PropertyFeature>),
}

impl CommandAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::Navigate(_) => "navigate",
            CommandAction::Describe => "describe",
            CommandAction::Help => "help",
            CommandAction::Exit => "exit",
            CommandAction::PropertyInfo(_) => "property_info",
        }
    }
}

/// A classified voice command. Confidence is category-fixed, not statistical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceCommand {
    pub action: CommandAction,
    pub confidence: f32,
}

impl VoiceCommand {
    pub fn new(action: CommandAction, confidence: f32) -> Self {
        Self { action, confidence }
    }

    /// Target string carried by the command (room id or property feature)
    pub fn target(&self) -> Option<&'static str> {
        match self.action {
            CommandAction::Navigate(room) => room.map(|r| r.as_str()),
            CommandAction::PropertyInfo(feature) => feature.map(|f| f.as_str()),
            CommandAction::Describe | CommandAction::Help | CommandAction::Exit => None,
        }
    }
}

impl std::fmt::Display for VoiceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target() {
            Some(target) => {
                write!(f, "{}({}) @{:.1}", self.action.as_str(), target, self.confidence)
            }
            None => write!(f, "{} @{:.1}", self.action.as_str(), self.confidence),
        }
    }
}

/// Event emitted by a speech recognizer while listening
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Provisional text, may be revised
    Interim { text: String },
    /// Committed text; `confidence` is absent when the engine does not report one
    Final { text: String, confidence: Option<f32> },
    /// Speech was heard but not recognized
    NoMatch,
    Error(String),
    /// Recognizer stopped on its own
    Ended,
}

/// Final transcript that passed the recognizer-confidence gate
#[derive(Debug, Clone, PartialEq)]
pub struct FinalTranscript {
    pub text: String,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_target() {
        let nav = VoiceCommand::new(CommandAction::Navigate(Some(RoomKind::LivingRoom)), 0.8);
        assert_eq!(nav.target(), Some("living_room"));

        let info = VoiceCommand::new(CommandAction::PropertyInfo(Some(PropertyFeature::Price)), 0.7);
        assert_eq!(info.target(), Some("price"));

        assert_eq!(VoiceCommand::new(CommandAction::Help, 0.9).target(), None);
        assert_eq!(VoiceCommand::new(CommandAction::Navigate(None), 0.8).target(), None);
    }

    #[test]
    fn test_command_display() {
        let nav = VoiceCommand::new(CommandAction::Navigate(Some(RoomKind::Kitchen)), 0.8);
        assert_eq!(nav.to_string(), "navigate(kitchen) @0.8");
        assert_eq!(VoiceCommand::new(CommandAction::Exit, 0.9).to_string(), "exit @0.9");
    }
}
