//! Voice capture session - speech recognizer lifecycle
//!
//! Wraps a `SpeechRecognizer` and turns its event stream into final
//! transcripts worth interpreting:
//! - interim text only updates the interim buffer
//! - final text is appended to the transcript buffer and forwarded only when
//!   the recognizer's confidence clears the forwarding gate
//! - no recognition event for the idle timeout stops listening
//!
//! `start` never fails loudly. Missing capability or refused microphone
//! access leave the session stopped with an error string set.

use crate::domain::voice::{FinalTranscript, RecognitionEvent};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::speech::{RecognizerSettings, SpeechRecognizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const UNSUPPORTED_ERROR: &str = "Speech recognition not supported";
pub const PERMISSION_ERROR: &str = "Microphone permission denied or not available";
pub const NO_MATCH_ERROR: &str = "No speech was recognized";

/// Confidence assumed for finals the recognizer reports without a score
const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Pause between stop and start on restart
const RESTART_PAUSE: Duration = Duration::from_millis(100);

const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No recognizer available on this platform
    Unsupported,
    Idle,
    Listening,
}

/// Why the session last left the listening state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stopped by the caller
    Requested,
    /// No recognition event within the idle timeout
    IdleTimeout,
    /// The recognizer ended on its own
    Ended,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub recognizer: RecognizerSettings,
    pub idle_timeout: Duration,
    /// Finals are forwarded only when their confidence is strictly above this
    pub forward_confidence: f32,
}

impl CaptureSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recognizer: RecognizerSettings::new(config.voice_lang()),
            idle_timeout: config.voice_idle_timeout(),
            forward_confidence: config.forward_confidence(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct VoiceCaptureSession {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    settings: CaptureSettings,
    state: CaptureState,
    transcript: String,
    interim: String,
    error: Option<String>,
    events: Option<mpsc::Receiver<RecognitionEvent>>,
    /// Idle auto-stop deadline, pushed back by every recognition event
    deadline: Instant,
    last_stop: Option<StopReason>,
    metrics: Arc<Metrics>,
}

impl VoiceCaptureSession {
    /// `None` for the recognizer models a platform without speech support
    pub fn new(
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        settings: CaptureSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        let state =
            if recognizer.is_some() { CaptureState::Idle } else { CaptureState::Unsupported };
        Self {
            recognizer,
            settings,
            state,
            transcript: String::new(),
            interim: String::new(),
            error: None,
            events: None,
            deadline: Instant::now(),
            last_stop: None,
            metrics,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    #[inline]
    pub fn is_listening(&self) -> bool {
        self.state == CaptureState::Listening
    }

    /// All final text heard since the last reset
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn interim(&self) -> &str {
        &self.interim
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_stop(&self) -> Option<StopReason> {
        self.last_stop
    }

    /// Begin listening with empty transcript buffers. Returns false, with
    /// `error()` set, when speech is unsupported or the microphone is
    /// unavailable.
    pub async fn start(&mut self) -> bool {
        let Some(recognizer) = self.recognizer.as_mut() else {
            self.state = CaptureState::Unsupported;
            self.error = Some(UNSUPPORTED_ERROR.to_string());
            warn!("voice_unsupported");
            return false;
        };
        if self.state == CaptureState::Listening {
            return true;
        }

        if let Err(e) = recognizer.request_microphone().await {
            self.error = Some(PERMISSION_ERROR.to_string());
            warn!(error = %format!("{e:#}"), "voice_microphone_denied");
            return false;
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        if let Err(e) = recognizer.begin(&self.settings.recognizer, tx).await {
            self.error = Some(format!("Speech recognition error: {e:#}"));
            warn!(error = %format!("{e:#}"), "voice_begin_failed");
            return false;
        }

        self.events = Some(rx);
        self.error = None;
        self.transcript.clear();
        self.interim.clear();
        self.state = CaptureState::Listening;
        self.deadline = Instant::now() + self.settings.idle_timeout;
        info!(lang = %self.settings.recognizer.lang, "voice_listening_started");
        true
    }

    pub async fn stop(&mut self) {
        self.halt(StopReason::Requested).await;
    }

    /// Stop, pause briefly, start again
    pub async fn restart(&mut self) -> bool {
        self.stop().await;
        tokio::time::sleep(RESTART_PAUSE).await;
        self.start().await
    }

    /// Clear the transcript buffers; listening state is untouched
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.interim.clear();
    }

    async fn halt(&mut self, reason: StopReason) {
        if self.state != CaptureState::Listening {
            return;
        }
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.end().await;
        }
        self.events = None;
        self.interim.clear();
        self.state = CaptureState::Idle;
        self.last_stop = Some(reason);
        info!(reason = ?reason, "voice_listening_stopped");
    }

    /// Wait for the next forwarded final transcript. Returns `None` once the
    /// session is no longer listening; `last_stop()` says why.
    pub async fn next_final(&mut self) -> Option<FinalTranscript> {
        loop {
            let events = self.events.as_mut()?;
            let event = match tokio::time::timeout_at(self.deadline, events.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    self.halt(StopReason::Ended).await;
                    return None;
                }
                Err(_) => {
                    debug!(
                        idle_ms = self.settings.idle_timeout.as_millis() as u64,
                        "voice_idle_timeout"
                    );
                    self.halt(StopReason::IdleTimeout).await;
                    return None;
                }
            };
            self.deadline = Instant::now() + self.settings.idle_timeout;

            match event {
                RecognitionEvent::Interim { text } => {
                    self.interim = text;
                }
                RecognitionEvent::Final { text, confidence } => {
                    self.interim.clear();
                    if !self.transcript.is_empty() {
                        self.transcript.push(' ');
                    }
                    self.transcript.push_str(&text);

                    let confidence = confidence.unwrap_or(DEFAULT_CONFIDENCE);
                    if confidence > self.settings.forward_confidence {
                        self.metrics.record_transcript(true);
                        info!(text = %text, confidence = confidence, "voice_final_transcript");
                        return Some(FinalTranscript { text, confidence });
                    }
                    self.metrics.record_transcript(false);
                    debug!(text = %text, confidence = confidence, "voice_transcript_gated");
                }
                RecognitionEvent::NoMatch => {
                    self.error = Some(NO_MATCH_ERROR.to_string());
                }
                RecognitionEvent::Error(reason) => {
                    warn!(error = %reason, "voice_recognition_error");
                    self.error = Some(format!("Speech recognition error: {reason}"));
                }
                RecognitionEvent::Ended => {
                    self.halt(StopReason::Ended).await;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Recognizer that replays scripted events, each after a delay
    struct ScriptedRecognizer {
        deny_microphone: bool,
        script: VecDeque<(u64, RecognitionEvent)>,
        feeder: Option<tokio::task::JoinHandle<()>>,
    }

    impl ScriptedRecognizer {
        fn new(script: Vec<(u64, RecognitionEvent)>) -> Self {
            Self { deny_microphone: false, script: script.into(), feeder: None }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for ScriptedRecognizer {
        async fn request_microphone(&mut self) -> anyhow::Result<()> {
            if self.deny_microphone {
                anyhow::bail!("NotAllowedError");
            }
            Ok(())
        }

        async fn begin(
            &mut self,
            _settings: &RecognizerSettings,
            events: mpsc::Sender<RecognitionEvent>,
        ) -> anyhow::Result<()> {
            let script: Vec<_> = self.script.drain(..).collect();
            self.feeder = Some(tokio::spawn(async move {
                for (delay_ms, event) in script {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
                // Keep the channel open so only the idle timer can stop us
                std::future::pending::<()>().await;
            }));
            Ok(())
        }

        async fn end(&mut self) {
            if let Some(feeder) = self.feeder.take() {
                feeder.abort();
            }
        }
    }

    fn final_event(text: &str, confidence: Option<f32>) -> RecognitionEvent {
        RecognitionEvent::Final { text: text.to_string(), confidence }
    }

    fn session(script: Vec<(u64, RecognitionEvent)>, idle_ms: u64) -> VoiceCaptureSession {
        let settings = CaptureSettings {
            idle_timeout: Duration::from_millis(idle_ms),
            ..CaptureSettings::default()
        };
        VoiceCaptureSession::new(
            Some(Box::new(ScriptedRecognizer::new(script))),
            settings,
            Arc::new(Metrics::new()),
        )
    }

    #[tokio::test]
    async fn test_confidence_gate() {
        let mut capture = session(
            vec![
                (0, final_event("go to the kitchen", Some(0.4))),
                (0, final_event("go to the bathroom", Some(0.6))),
            ],
            1000,
        );
        assert!(capture.start().await);

        let forwarded = capture.next_final().await.unwrap();
        assert_eq!(forwarded.text, "go to the bathroom");
        assert_eq!(forwarded.confidence, 0.6);
        // The gated final still lands in the transcript buffer
        assert_eq!(capture.transcript(), "go to the kitchen go to the bathroom");
        assert_eq!(capture.metrics.transcripts_gated(), 1);
    }

    #[tokio::test]
    async fn test_missing_confidence_is_not_forwarded() {
        let mut capture = session(vec![(0, final_event("help", None))], 100);
        assert!(capture.start().await);

        assert_eq!(capture.next_final().await, None);
        assert_eq!(capture.transcript(), "help");
        assert_eq!(capture.last_stop(), Some(StopReason::IdleTimeout));
    }

    #[tokio::test]
    async fn test_interim_updates_buffer_only() {
        let mut capture = session(
            vec![
                (0, RecognitionEvent::Interim { text: "go".to_string() }),
                (0, RecognitionEvent::Interim { text: "go to the".to_string() }),
                (0, final_event("go to the kitchen", Some(0.9))),
            ],
            1000,
        );
        assert!(capture.start().await);

        let forwarded = capture.next_final().await.unwrap();
        assert_eq!(forwarded.text, "go to the kitchen");
        assert_eq!(capture.interim(), "");
    }

    #[tokio::test]
    async fn test_idle_timeout_stops_session() {
        let mut capture = session(vec![], 50);
        assert!(capture.start().await);

        let started = Instant::now();
        assert_eq!(capture.next_final().await, None);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.last_stop(), Some(StopReason::IdleTimeout));
    }

    #[tokio::test]
    async fn test_events_push_back_idle_timer() {
        // Three events 60ms apart outlive a single 100ms idle window
        let mut capture = session(
            vec![
                (60, RecognitionEvent::Interim { text: "show".to_string() }),
                (60, RecognitionEvent::Interim { text: "show me".to_string() }),
                (60, final_event("show me the bedroom", Some(0.8))),
            ],
            100,
        );
        assert!(capture.start().await);
        assert_eq!(capture.next_final().await.unwrap().text, "show me the bedroom");
        assert!(capture.is_listening());
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let mut capture =
            VoiceCaptureSession::new(None, CaptureSettings::default(), Arc::new(Metrics::new()));
        assert_eq!(capture.state(), CaptureState::Unsupported);
        assert!(!capture.start().await);
        assert_eq!(capture.error(), Some(UNSUPPORTED_ERROR));
        assert_eq!(capture.next_final().await, None);
    }

    #[tokio::test]
    async fn test_microphone_denied() {
        let mut recognizer = ScriptedRecognizer::new(vec![]);
        recognizer.deny_microphone = true;
        let mut capture = VoiceCaptureSession::new(
            Some(Box::new(recognizer)),
            CaptureSettings::default(),
            Arc::new(Metrics::new()),
        );

        assert!(!capture.start().await);
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.error(), Some(PERMISSION_ERROR));
    }

    #[tokio::test]
    async fn test_recognition_errors_set_error_string() {
        let mut capture = session(
            vec![
                (0, RecognitionEvent::NoMatch),
                (0, RecognitionEvent::Error("network".to_string())),
                (0, final_event("help", Some(0.9))),
            ],
            1000,
        );
        assert!(capture.start().await);
        capture.next_final().await.unwrap();
        assert_eq!(capture.error(), Some("Speech recognition error: network"));
    }

    #[tokio::test]
    async fn test_ended_event_stops_session() {
        let mut capture = session(vec![(0, RecognitionEvent::Ended)], 1000);
        assert!(capture.start().await);
        assert_eq!(capture.next_final().await, None);
        assert_eq!(capture.last_stop(), Some(StopReason::Ended));
    }

    #[tokio::test]
    async fn test_restart_starts_with_empty_transcript() {
        let mut capture = session(vec![(0, final_event("help", None))], 50);
        assert!(capture.start().await);
        assert_eq!(capture.next_final().await, None);
        assert_eq!(capture.transcript(), "help");
        assert_eq!(capture.last_stop(), Some(StopReason::IdleTimeout));

        assert!(capture.restart().await);
        assert!(capture.is_listening());
        assert_eq!(capture.transcript(), "");
        assert_eq!(capture.interim(), "");
    }

    #[tokio::test]
    async fn test_reset_keeps_listening() {
        let mut capture = session(vec![(0, final_event("what's the price", Some(0.9)))], 1000);
        assert!(capture.start().await);
        capture.next_final().await.unwrap();

        capture.reset();
        assert_eq!(capture.transcript(), "");
        assert!(capture.is_listening());

        capture.stop().await;
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.last_stop(), Some(StopReason::Requested));
    }
}
