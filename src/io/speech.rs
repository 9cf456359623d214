//! Speech-to-text capability
//!
//! `SpeechRecognizer` is what the capture session drives: request microphone
//! access, begin streaming `RecognitionEvent`s into a channel, end.
//!
//! `LineRecognizer` treats each line of a text stream (stdin in the CLI) as
//! one recognition result:
//! - `~text` interim transcript
//! - `@0.42 text` final transcript with recognizer confidence 0.42
//! - `?` no match
//! - anything else is a final transcript with confidence 0.9
//!
//! End of input ends recognition and closes the microphone for good.

use crate::domain::voice::RecognitionEvent;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Confidence assigned to plain lines without an explicit `@` score
const TYPED_LINE_CONFIDENCE: f32 = 0.9;

/// Recognition parameters passed to `begin`
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerSettings {
    pub lang: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u8,
}

impl RecognizerSettings {
    pub fn new(lang: &str) -> Self {
        Self { lang: lang.to_string(), continuous: true, interim_results: true, max_alternatives: 1 }
    }
}

#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Ask for microphone access; an error means access was refused
    async fn request_microphone(&mut self) -> anyhow::Result<()>;

    /// Start streaming recognition events into `events`
    async fn begin(
        &mut self,
        settings: &RecognizerSettings,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> anyhow::Result<()>;

    /// Stop delivering events
    async fn end(&mut self);
}

/// Parse one input line into a recognition event; blank lines are skipped
pub fn parse_line(line: &str) -> Option<RecognitionEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "?" {
        return Some(RecognitionEvent::NoMatch);
    }
    if let Some(text) = line.strip_prefix('~') {
        return Some(RecognitionEvent::Interim { text: text.trim().to_string() });
    }
    if let Some(rest) = line.strip_prefix('@') {
        if let Some((score, text)) = rest.split_once(char::is_whitespace) {
            if let Ok(confidence) = score.parse::<f32>() {
                return Some(RecognitionEvent::Final {
                    text: text.trim().to_string(),
                    confidence: Some(confidence.clamp(0.0, 1.0)),
                });
            }
        }
    }
    Some(RecognitionEvent::Final { text: line.to_string(), confidence: Some(TYPED_LINE_CONFIDENCE) })
}

type ActiveSlot = Option<mpsc::Sender<RecognitionEvent>>;

/// Recognizer fed by a line-oriented text stream
pub struct LineRecognizer {
    active: watch::Sender<ActiveSlot>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl LineRecognizer {
    pub fn spawn<R>(input: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (active, active_rx) = watch::channel(None);
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_lines(input, active_rx, closed.clone()));
        Self { active, closed, reader }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for LineRecognizer {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl SpeechRecognizer for LineRecognizer {
    async fn request_microphone(&mut self) -> anyhow::Result<()> {
        if self.is_closed() {
            anyhow::bail!("input stream closed");
        }
        Ok(())
    }

    async fn begin(
        &mut self,
        settings: &RecognizerSettings,
        events: mpsc::Sender<RecognitionEvent>,
    ) -> anyhow::Result<()> {
        if self.is_closed() {
            anyhow::bail!("input stream closed");
        }
        debug!(lang = %settings.lang, "line_recognizer_begin");
        self.active.send_replace(Some(events));
        Ok(())
    }

    async fn end(&mut self) {
        debug!("line_recognizer_end");
        self.active.send_replace(None);
    }
}

/// Reads lines only while a session is listening. A line read just before
/// the session stopped is held until the next session begins.
async fn read_lines<R>(input: R, mut active: watch::Receiver<ActiveSlot>, closed: Arc<AtomicBool>)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut lines = input.lines();
    loop {
        if active.wait_for(Option::is_some).await.is_err() {
            return;
        }

        let event = match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Some(event) => event,
                None => continue,
            },
            Ok(None) => {
                info!("speech_input_closed");
                closed.store(true, Ordering::Release);
                RecognitionEvent::Ended
            }
            Err(e) => {
                warn!(error = %e, "speech_input_error");
                closed.store(true, Ordering::Release);
                RecognitionEvent::Ended
            }
        };

        let sender = match active.wait_for(Option::is_some).await {
            Ok(slot) => slot.clone(),
            Err(_) => return,
        };
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }

        if closed.load(Ordering::Acquire) {
            return;
        }
    }
}
