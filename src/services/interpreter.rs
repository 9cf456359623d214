//! Voice command interpreter - keyword classification of transcripts
//!
//! Categories are checked in a fixed priority order (navigation, description,
//! property info, control) by substring search over trigger phrases. The
//! phrase lists overlap, so the order decides: "show me the living room tour"
//! is navigation even though "room" phrases exist elsewhere. Anything that
//! matches nothing becomes a low-confidence help command, which callers are
//! expected to drop with their own threshold.

use crate::domain::property::RoomKind;
use crate::domain::voice::{
    CommandAction, PropertyFeature, VoiceCommand, CONTROL_CONFIDENCE, DESCRIPTION_CONFIDENCE,
    FALLBACK_CONFIDENCE, NAVIGATION_CONFIDENCE, PROPERTY_INFO_CONFIDENCE,
};

const NAVIGATION_PHRASES: &[&str] = &[
    "go to kitchen",
    "show me the kitchen",
    "navigate to kitchen",
    "kitchen tour",
    "go to bedroom",
    "show me the bedroom",
    "take me to bedroom",
    "bedroom tour",
    "go to bathroom",
    "show me the bathroom",
    "navigate to bathroom",
    "bathroom tour",
    "go to living room",
    "show me the living room",
    "take me to living room",
    "living room tour",
    "go to the kitchen",
    "go to the bedroom",
    "go to the bathroom",
    "go to the living room",
    "take me to the kitchen",
    "take me to the bedroom",
    "take me to the bathroom",
    "take me to the living room",
    "navigate to the",
];

const DESCRIPTION_PHRASES: &[&str] = &[
    "describe this room",
    "tell me about this space",
    "what am i looking at",
    "room details",
    "property information",
    "room features",
    "what's in this room",
];

const PROPERTY_INFO_PHRASES: &[&str] = &[
    "what's the price",
    "how much does this cost",
    "property price",
    "square footage",
    "property size",
    "how big is this",
    "property features",
    "amenities",
    "what's included",
];

const CONTROL_PHRASES: &[&str] = &[
    "stop tour",
    "exit tour",
    "pause",
    "resume",
    "end session",
    "help",
    "what can you do",
    "voice commands",
    "how does this work",
];

/// Room keywords, first match wins
const ROOM_KEYWORDS: &[(&[&str], RoomKind)] = &[
    (&["kitchen"], RoomKind::Kitchen),
    (&["bedroom", "bed room"], RoomKind::Bedroom),
    (&["bathroom", "bath room"], RoomKind::Bathroom),
    (&["living room", "living", "lounge"], RoomKind::LivingRoom),
];

/// Property feature keywords, first match wins
const FEATURE_KEYWORDS: &[(&[&str], PropertyFeature)] = &[
    (&["price", "cost", "much"], PropertyFeature::Price),
    (&["size", "square", "big"], PropertyFeature::Size),
    (&["features", "amenities", "included"], PropertyFeature::Features),
    (&["location", "where", "address"], PropertyFeature::Location),
];

#[inline]
fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

fn extract<T: Copy>(text: &str, table: &[(&[&str], T)]) -> Option<T> {
    table.iter().find(|(keywords, _)| contains_any(text, keywords)).map(|(_, value)| *value)
}

pub fn extract_room(text: &str) -> Option<RoomKind> {
    extract(text, ROOM_KEYWORDS)
}

pub fn extract_feature(text: &str) -> Option<PropertyFeature> {
    extract(text, FEATURE_KEYWORDS)
}

/// "help" wins, then exit phrases map to `Exit`; every other control phrase
/// is a help request
fn control_action(text: &str) -> CommandAction {
    if text.contains("help") {
        CommandAction::Help
    } else if text.contains("exit") || text.contains("stop") || text.contains("end session") {
        CommandAction::Exit
    } else {
        CommandAction::Help
    }
}

/// Classify a transcript. Total: every input yields a command.
pub fn classify(transcript: &str) -> VoiceCommand {
    let text = transcript.to_lowercase();

    if contains_any(&text, NAVIGATION_PHRASES) {
        return VoiceCommand::new(CommandAction::Navigate(extract_room(&text)), NAVIGATION_CONFIDENCE);
    }
    if contains_any(&text, DESCRIPTION_PHRASES) {
        return VoiceCommand::new(CommandAction::Describe, DESCRIPTION_CONFIDENCE);
    }
    if contains_any(&text, PROPERTY_INFO_PHRASES) {
        return VoiceCommand::new(
            CommandAction::PropertyInfo(extract_feature(&text)),
            PROPERTY_INFO_CONFIDENCE,
        );
    }
    if contains_any(&text, CONTROL_PHRASES) {
        return VoiceCommand::new(control_action(&text), CONTROL_CONFIDENCE);
    }
    VoiceCommand::new(CommandAction::Help, FALLBACK_CONFIDENCE)
}
