//! Tour assistant - turns final transcripts into tour actions and replies
//!
//! Classification confidence below the command threshold is dropped here,
//! not in the interpreter. Accepted commands are dispatched exhaustively and
//! answered with a short spoken reply.

use crate::domain::property::{Property, RoomKind};
use crate::domain::tour::{SwitchOutcome, TourPhase, TourSession};
use crate::domain::voice::{CommandAction, FinalTranscript, PropertyFeature, VoiceCommand};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::capture::{StopReason, VoiceCaptureSession};
use crate::services::interpreter::classify;
use crate::services::tour_controller::TourController;
use smallvec::SmallVec;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub const HELP_REPLY: &str = "I can help you navigate the property tour. Say \"go to kitchen\" to visit rooms, \"describe this room\" to learn more, or \"what's the price\" for property details.";
pub const EXIT_REPLY: &str =
    "Thank you for taking the virtual tour. Returning to the property dashboard.";
pub const UNKNOWN_ROOM_REPLY: &str = "I'm not sure which room you want to visit. Try saying \"go to kitchen\" or \"show me the bedroom\".";
const NOTHING_SHOWN_REPLY: &str = "I can see you're viewing a property room. Look around to explore the space, or ask me to go to a specific room.";
const INFO_DEFAULT_REPLY: &str = "I'll gather that property information for you.";

/// Answer to one accepted voice command
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub command: VoiceCommand,
    pub text: String,
    /// The visitor asked to leave the tour
    pub exit: bool,
}

pub struct TourAssistant {
    controller: Arc<TourController>,
    property: Property,
    threshold: f32,
    history_len: usize,
    /// Most recent accepted commands, oldest first
    history: SmallVec<[VoiceCommand; 5]>,
    session: TourSession,
    metrics: Arc<Metrics>,
}

impl TourAssistant {
    pub fn new(
        controller: Arc<TourController>,
        property: Property,
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        let session = TourSession::new(property.id.clone());
        Self {
            controller,
            property,
            threshold: config.command_threshold(),
            history_len: config.history_len(),
            history: SmallVec::new(),
            session,
            metrics,
        }
    }

    pub fn history(&self) -> &[VoiceCommand] {
        &self.history
    }

    pub fn session(&self) -> &TourSession {
        &self.session
    }

    /// Classify a transcript and act on it. `None` when the command falls
    /// below the threshold.
    pub async fn handle_transcript(&mut self, transcript: &FinalTranscript) -> Option<AssistantReply> {
        let command = classify(&transcript.text);

        if command.confidence < self.threshold {
            self.metrics.record_command(false);
            self.session.discarded += 1;
            debug!(text = %transcript.text, command = %command, "voice_command_discarded");
            return None;
        }

        self.metrics.record_command(true);
        self.session.commands += 1;
        self.remember(command);
        info!(text = %transcript.text, command = %command, "voice_command");

        let text = self.dispatch(command).await;
        Some(AssistantReply { command, text, exit: command.action == CommandAction::Exit })
    }

    fn remember(&mut self, command: VoiceCommand) {
        if self.history.len() >= self.history_len {
            self.history.remove(0);
        }
        self.history.push(command);
    }

    async fn dispatch(&mut self, command: VoiceCommand) -> String {
        match command.action {
            CommandAction::Navigate(Some(room)) => self.navigate(room).await,
            CommandAction::Navigate(None) => UNKNOWN_ROOM_REPLY.to_string(),
            CommandAction::Describe => self.describe(),
            CommandAction::PropertyInfo(feature) => self.property_info(feature),
            CommandAction::Help => HELP_REPLY.to_string(),
            CommandAction::Exit => EXIT_REPLY.to_string(),
        }
    }

    async fn navigate(&mut self, room: RoomKind) -> String {
        if !self.controller.catalog().get(room).available {
            return unavailable_reply(room);
        }

        match self.controller.switch_to(room).await {
            SwitchOutcome::Applied { room, panoramic } => {
                self.session.record_visit(room, panoramic);
                moving_reply(room)
            }
            SwitchOutcome::Superseded => moving_reply(room),
            SwitchOutcome::Rejected => unavailable_reply(room),
            SwitchOutcome::Failed(_) => {
                format!("This property doesn't have a {} tour available right now.", room.spoken())
            }
        }
    }

    fn describe(&self) -> String {
        match self.controller.state().phase {
            TourPhase::Idle => NOTHING_SHOWN_REPLY.to_string(),
            _ => self.controller.describe_current().to_string(),
        }
    }

    fn property_info(&self, feature: Option<PropertyFeature>) -> String {
        let property = &self.property;
        match feature {
            Some(PropertyFeature::Price) => match &property.price {
                Some(price) => format!("This property is listed at {price}."),
                None => "Let me get the property price information for you.".to_string(),
            },
            Some(PropertyFeature::Size) => match &property.area {
                Some(area) => format!("The total square footage is {area} square feet."),
                None => "I'll find the square footage details for this property.".to_string(),
            },
            Some(PropertyFeature::Features) if !property.features.is_empty() => {
                format!("Key features include: {}", property.features.join(", "))
            }
            Some(PropertyFeature::Location) if !property.address.is_empty() => {
                format!("{} is located in {}.", property.name, property.address)
            }
            Some(PropertyFeature::Features) | Some(PropertyFeature::Location) | None => {
                INFO_DEFAULT_REPLY.to_string()
            }
        }
    }

    /// Close the session record
    pub fn finish(&mut self) -> TourSession {
        self.session.finish();
        self.session.clone()
    }

    /// Listen, interpret, and act until the visitor exits, the speech input
    /// ends, or shutdown is signalled. Listening restarts after an idle stop.
    pub async fn run(
        &mut self,
        capture: &mut VoiceCaptureSession,
        replies: mpsc::Sender<AssistantReply>,
        mut shutdown: watch::Receiver<bool>,
    ) -> TourSession {
        if !capture.start().await {
            warn!(error = capture.error().unwrap_or_default(), "voice_start_failed");
            return self.finish();
        }

        loop {
            tokio::select! {
                heard = capture.next_final() => {
                    match heard {
                        Some(transcript) => {
                            let Some(reply) = self.handle_transcript(&transcript).await else {
                                continue;
                            };
                            let exit = reply.exit;
                            if replies.send(reply).await.is_err() || exit {
                                break;
                            }
                        }
                        None if capture.last_stop() == Some(StopReason::IdleTimeout) => {
                            if !capture.restart().await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("assistant_shutdown");
                        break;
                    }
                }
            }
        }

        capture.stop().await;
        let session = self.finish();
        info!(
            sid = %session.sid,
            visits = session.visits.len(),
            commands = session.commands,
            discarded = session.discarded,
            "tour_session_finished"
        );
        session
    }
}

fn moving_reply(room: RoomKind) -> String {
    format!(
        "Moving to the {}. You can look around using your mouse or touch to explore.",
        room.spoken()
    )
}

fn unavailable_reply(room: RoomKind) -> String {
    format!("Sorry, the {} is not available in this property tour.", room.spoken())
}
