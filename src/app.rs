//! Flow controller sequencing user commands onto the story session.
//!
//! Commands never fail outward: gateway errors and rejected commands are
//! reported as [`Notification`]s and the session stays usable.

use crate::ai::{GeminiGateway, ModelGateway};
use crate::models::{Config, PendingOperation, SourceImage};
use crate::session::{Completion, NarrationStep, Session};
use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    AnalysisFailed,
    NarrationFailed,
    ChatFailed,
    /// The command was not valid in the current session state.
    Rejected,
}

/// User-visible, non-blocking message raised by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub detail: String,
}

/// What a command did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The result arrived after the session was reset or replaced.
    Discarded,
    /// A duplicate request was ignored.
    Suppressed,
    Rejected,
    Failed,
}

/// Coordinates the single story session with the model gateway.
pub struct App {
    gateway: Arc<dyn ModelGateway>,
    session: Mutex<Session>,
    notifications: mpsc::UnboundedSender<Notification>,
    call_timeout: Duration,
}

impl App {
    /// Build an app around any gateway. The receiver yields every
    /// notification raised by later commands.
    pub fn with_gateway(
        gateway: Arc<dyn ModelGateway>,
        call_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Self {
            gateway,
            session: Mutex::new(Session::new()),
            notifications: tx,
            call_timeout,
        };
        (app, rx)
    }

    pub fn from_config(config: &Config) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let gateway = GeminiGateway::from_config(config);
        Self::with_gateway(Arc::new(gateway), config.timeout)
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<Notification>)> {
        let config = Config::from_env()?;
        Ok(Self::from_config(&config))
    }

    /// Read-only projection of the current session.
    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub async fn select_image(&self, bytes: Vec<u8>, mime_type: &str) -> Outcome {
        let image = match SourceImage::new(bytes, mime_type) {
            Ok(image) => image,
            Err(e) => return self.reject(e),
        };

        let ticket = {
            let mut session = self.session.lock().await;
            match session.begin_analysis(image.clone()) {
                Ok(ticket) => ticket,
                Err(e) => return self.reject(e),
            }
        };

        info!(
            "Analyzing {} image ({} bytes)",
            image.mime_type,
            image.bytes.len()
        );
        let result = self
            .with_timeout(PendingOperation::Analyzing, self.gateway.analyze_image(&image))
            .await;

        let completion = self.session.lock().await.complete_analysis(ticket, result);
        self.settle(
            completion,
            NotificationKind::AnalysisFailed,
            "The muse is silent. Please try another image.",
        )
    }

    /// Start over. Calls still in flight are left to finish and then ignored.
    pub async fn reset_session(&self) {
        self.session.lock().await.reset();
    }

    pub async fn send_chat_message(&self, text: &str) -> Outcome {
        let dispatch = {
            let mut session = self.session.lock().await;
            match session.begin_chat(text) {
                Ok(dispatch) => dispatch,
                Err(e) => return self.reject(e),
            }
        };

        let result = self
            .with_timeout(
                PendingOperation::Chatting,
                self.gateway
                    .chat(&dispatch.message, &dispatch.context, &dispatch.history),
            )
            .await;

        let completion = self
            .session
            .lock()
            .await
            .complete_chat(dispatch.ticket, result);
        self.settle(
            completion,
            NotificationKind::ChatFailed,
            "The connection to the muse was severed. Please try again.",
        )
    }

    /// Synthesize narration once per story; later requests toggle playback.
    pub async fn request_narration(&self) -> Outcome {
        let step = {
            let mut session = self.session.lock().await;
            match session.begin_narration() {
                Ok(step) => step,
                Err(e) => return self.reject(e),
            }
        };

        let (ticket, text) = match step {
            NarrationStep::Toggled { playing } => {
                info!(
                    "Narration {}",
                    if playing { "resumed" } else { "paused" }
                );
                return Outcome::Applied;
            }
            NarrationStep::Suppressed => return Outcome::Suppressed,
            NarrationStep::Synthesize { ticket, text } => (ticket, text),
        };

        let result = self
            .with_timeout(
                PendingOperation::SynthesizingSpeech,
                self.gateway.synthesize_speech(&text),
            )
            .await;

        let completion = self
            .session
            .lock()
            .await
            .complete_narration(ticket, result);
        self.settle(
            completion,
            NotificationKind::NarrationFailed,
            "The narrator lost their voice. Please try again.",
        )
    }

    /// Called by the presentation layer when playback reaches the end.
    pub async fn finish_playback(&self) {
        self.session.lock().await.finish_playback();
    }

    async fn with_timeout<T, F>(&self, operation: PendingOperation, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let reason = Error::Timeout(self.call_timeout).to_string();
                Err(match operation {
                    PendingOperation::Analyzing => Error::Analysis(reason),
                    PendingOperation::SynthesizingSpeech => Error::SpeechSynthesis(reason),
                    PendingOperation::Chatting | PendingOperation::None => Error::Chat(reason),
                })
            }
        }
    }

    fn settle(&self, completion: Result<Completion>, kind: NotificationKind, message: &str) -> Outcome {
        match completion {
            Ok(Completion::Applied) => Outcome::Applied,
            Ok(Completion::Stale) => Outcome::Discarded,
            Err(e) => {
                error!("{}", e);
                self.notify(kind, message, &e);
                Outcome::Failed
            }
        }
    }

    fn reject(&self, e: Error) -> Outcome {
        warn!("Command rejected: {}", e);
        self.notify(NotificationKind::Rejected, &e.to_string(), &e);
        Outcome::Rejected
    }

    fn notify(&self, kind: NotificationKind, message: &str, e: &Error) {
        let notification = Notification {
            kind,
            message: message.to_string(),
            detail: e.to_string(),
        };
        if self.notifications.send(notification).is_err() {
            warn!("Notification dropped, no presentation layer is listening");
        }
    }
}
