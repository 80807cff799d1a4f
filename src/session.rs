//! Single active story session
//!
//! Every gateway-backed transition is split in two: `begin_*` validates the
//! request, marks the operation pending and hands back a [`Ticket`] stamped
//! with the current generation; `complete_*` applies the gateway result only
//! if that generation is still current. Resetting or starting a new session
//! bumps the generation, so results of abandoned calls are dropped instead of
//! being written into the wrong story.

use crate::models::{ChatTurn, NarrationAudio, PendingOperation, SourceImage, StoryResult};
use crate::{prompts, Error, Result};
use tracing::{debug, info, warn};

/// Proof that an operation was started against a given session generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    operation: PendingOperation,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn operation(&self) -> PendingOperation {
        self.operation
    }
}

/// Everything the gateway needs for one chat call.
#[derive(Debug, Clone)]
pub struct ChatDispatch {
    pub ticket: Ticket,
    pub message: String,
    pub context: String,
    /// Transcript as it was before `message` was appended.
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationStep {
    /// Audio was already cached; playback flipped to the given state.
    Toggled { playing: bool },
    /// A synthesis call is already running for this story.
    Suppressed,
    /// No audio yet; the caller must synthesize `text`.
    Synthesize { ticket: Ticket, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The ticket belongs to a superseded generation; nothing was changed.
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    generation: u64,
    source_image: Option<SourceImage>,
    story: Option<StoryResult>,
    transcript: Vec<ChatTurn>,
    narration: Option<NarrationAudio>,
    narration_playing: bool,
    analyzing: bool,
    synthesizing: bool,
    chatting: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source_image(&self) -> Option<&SourceImage> {
        self.source_image.as_ref()
    }

    pub fn story(&self) -> Option<&StoryResult> {
        self.story.as_ref()
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn narration(&self) -> Option<&NarrationAudio> {
        self.narration.as_ref()
    }

    pub fn is_narration_playing(&self) -> bool {
        self.narration_playing
    }

    pub fn is_pending(&self, operation: PendingOperation) -> bool {
        match operation {
            PendingOperation::None => !(self.analyzing || self.synthesizing || self.chatting),
            PendingOperation::Analyzing => self.analyzing,
            PendingOperation::SynthesizingSpeech => self.synthesizing,
            PendingOperation::Chatting => self.chatting,
        }
    }

    /// The most significant outstanding operation.
    pub fn pending_operation(&self) -> PendingOperation {
        if self.analyzing {
            PendingOperation::Analyzing
        } else if self.chatting {
            PendingOperation::Chatting
        } else if self.synthesizing {
            PendingOperation::SynthesizingSpeech
        } else {
            PendingOperation::None
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation
    }

    fn ticket(&self, operation: PendingOperation) -> Ticket {
        Ticket {
            generation: self.generation,
            operation,
        }
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.source_image = None;
        self.story = None;
        self.transcript.clear();
        self.narration = None;
        self.narration_playing = false;
        self.analyzing = false;
        self.synthesizing = false;
        self.chatting = false;
    }

    /// Discard the current story and anything in flight.
    pub fn reset(&mut self) {
        let abandoned = self.pending_operation();
        self.clear();
        if abandoned != PendingOperation::None {
            warn!(
                "Session reset with {} in flight; its result will be discarded",
                abandoned
            );
        }
        info!("Session reset (generation {})", self.generation);
    }

    /// Start a fresh session for `image`. The previous story, transcript and
    /// narration are dropped immediately.
    pub fn begin_analysis(&mut self, image: SourceImage) -> Result<Ticket> {
        if self.analyzing {
            return Err(Error::OperationPending(PendingOperation::Analyzing));
        }

        self.clear();
        self.source_image = Some(image);
        self.analyzing = true;
        info!("Analysis started (generation {})", self.generation);
        Ok(self.ticket(PendingOperation::Analyzing))
    }

    pub fn complete_analysis(
        &mut self,
        ticket: Ticket,
        result: Result<StoryResult>,
    ) -> Result<Completion> {
        if !self.is_current(&ticket) {
            warn!(
                "Discarding analysis result from generation {} (current {})",
                ticket.generation, self.generation
            );
            return Ok(Completion::Stale);
        }

        self.analyzing = false;
        match result {
            Ok(story) => {
                info!("Story ready (mood: {})", story.mood);
                self.story = Some(story);
                self.transcript.clear();
                Ok(Completion::Applied)
            }
            Err(e) => {
                self.source_image = None;
                self.story = None;
                Err(e)
            }
        }
    }

    /// Append the user turn and hand back what the gateway needs.
    pub fn begin_chat(&mut self, text: &str) -> Result<ChatDispatch> {
        let story = self.story.as_ref().ok_or(Error::NoStory)?;
        let message = text.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("Chat message is empty".to_string()));
        }
        if self.chatting {
            return Err(Error::OperationPending(PendingOperation::Chatting));
        }

        let dispatch = ChatDispatch {
            ticket: self.ticket(PendingOperation::Chatting),
            message: message.to_string(),
            context: story.opening_paragraph.clone(),
            history: self.transcript.clone(),
        };

        self.transcript.push(ChatTurn::user(message));
        self.chatting = true;
        debug!("Chat turn {} sent", self.transcript.len());
        Ok(dispatch)
    }

    /// On failure the user's turn stays in the transcript without a reply.
    pub fn complete_chat(&mut self, ticket: Ticket, result: Result<String>) -> Result<Completion> {
        if !self.is_current(&ticket) {
            warn!(
                "Discarding chat reply from generation {} (current {})",
                ticket.generation, self.generation
            );
            return Ok(Completion::Stale);
        }

        self.chatting = false;
        let reply = result?;
        let reply = if reply.trim().is_empty() {
            warn!("Empty chat reply, substituting fallback");
            prompts::CHAT_FALLBACK_REPLY.to_string()
        } else {
            reply
        };
        self.transcript.push(ChatTurn::assistant(reply));
        Ok(Completion::Applied)
    }

    pub fn begin_narration(&mut self) -> Result<NarrationStep> {
        let story = self.story.as_ref().ok_or(Error::NoStory)?;

        if self.narration.is_some() {
            self.narration_playing = !self.narration_playing;
            return Ok(NarrationStep::Toggled {
                playing: self.narration_playing,
            });
        }
        if self.synthesizing {
            debug!("Narration already being synthesized, ignoring request");
            return Ok(NarrationStep::Suppressed);
        }

        let text = story.opening_paragraph.clone();
        self.synthesizing = true;
        Ok(NarrationStep::Synthesize {
            ticket: self.ticket(PendingOperation::SynthesizingSpeech),
            text,
        })
    }

    /// Successful audio is cached for the rest of the session and starts playing.
    pub fn complete_narration(
        &mut self,
        ticket: Ticket,
        result: Result<NarrationAudio>,
    ) -> Result<Completion> {
        if !self.is_current(&ticket) {
            warn!(
                "Discarding narration from generation {} (current {})",
                ticket.generation, self.generation
            );
            return Ok(Completion::Stale);
        }

        self.synthesizing = false;
        let audio = result?;
        info!("Narration ready ({} bytes)", audio.data.len());
        self.narration = Some(audio);
        self.narration_playing = true;
        Ok(Completion::Applied)
    }

    /// Playback reached the end of the audio.
    pub fn finish_playback(&mut self) {
        self.narration_playing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image() -> SourceImage {
        SourceImage::new(vec![0x89, 0x50, 0x4E, 0x47], "image/png").unwrap()
    }

    fn story() -> StoryResult {
        StoryResult {
            opening_paragraph: "Once...".to_string(),
            mood: "melancholy".to_string(),
            scene_description: "A rainy alley".to_string(),
            captions: vec!["c1".into(), "c2".into(), "c3".into()],
            music_recommendations: vec!["m1".into(), "m2".into(), "m3".into()],
        }
    }

    fn audio() -> NarrationAudio {
        NarrationAudio {
            mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
            data: vec![0, 1],
        }
    }

    fn with_story() -> Session {
        let mut session = Session::new();
        let ticket = session.begin_analysis(image()).unwrap();
        session.complete_analysis(ticket, Ok(story())).unwrap();
        session
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::new();
        assert!(session.story().is_none());
        assert!(session.source_image().is_none());
        assert!(session.transcript().is_empty());
        assert_eq!(session.pending_operation(), PendingOperation::None);
        assert!(session.is_pending(PendingOperation::None));
    }

    #[test]
    fn test_analysis_success_populates_story() {
        let mut session = Session::new();
        let ticket = session.begin_analysis(image()).unwrap();
        assert_eq!(session.pending_operation(), PendingOperation::Analyzing);
        assert_eq!(ticket.operation(), PendingOperation::Analyzing);

        let completion = session.complete_analysis(ticket, Ok(story())).unwrap();
        assert_eq!(completion, Completion::Applied);
        assert_eq!(session.story(), Some(&story()));
        assert_eq!(session.source_image(), Some(&image()));
        assert!(session.transcript().is_empty());
        assert_eq!(session.pending_operation(), PendingOperation::None);
    }

    #[test]
    fn test_analysis_failure_leaves_story_empty() {
        let mut session = Session::new();
        let ticket = session.begin_analysis(image()).unwrap();

        let err = session
            .complete_analysis(ticket, Err(Error::Analysis("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::Analysis(_)));
        assert!(session.story().is_none());
        assert!(session.source_image().is_none());
        assert_eq!(session.pending_operation(), PendingOperation::None);
    }

    #[test]
    fn test_second_analysis_while_pending_is_rejected() {
        let mut session = Session::new();
        session.begin_analysis(image()).unwrap();
        let err = session.begin_analysis(image()).unwrap_err();
        assert!(matches!(
            err,
            Error::OperationPending(PendingOperation::Analyzing)
        ));
    }

    #[test]
    fn test_new_analysis_replaces_previous_story() {
        let mut session = with_story();
        session.begin_chat("hello").unwrap();

        let ticket = session.begin_analysis(image()).unwrap();
        assert!(session.story().is_none());
        assert!(session.transcript().is_empty());
        assert!(!session.is_pending(PendingOperation::Chatting));

        let mut next = story();
        next.mood = "joyful".to_string();
        session.complete_analysis(ticket, Ok(next.clone())).unwrap();
        assert_eq!(session.story(), Some(&next));
    }

    #[test]
    fn test_reset_discards_stale_analysis() {
        let mut session = Session::new();
        let ticket = session.begin_analysis(image()).unwrap();
        session.reset();

        let completion = session.complete_analysis(ticket, Ok(story())).unwrap();
        assert_eq!(completion, Completion::Stale);
        assert_eq!(session.story(), None);
        assert!(session.source_image().is_none());
        assert!(session.transcript().is_empty());
        assert_eq!(session.pending_operation(), PendingOperation::None);
    }

    #[test]
    fn test_stale_failure_is_swallowed() {
        let mut session = Session::new();
        let ticket = session.begin_analysis(image()).unwrap();
        session.reset();

        let completion = session
            .complete_analysis(ticket, Err(Error::Analysis("late".to_string())))
            .unwrap();
        assert_eq!(completion, Completion::Stale);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = with_story();
        let dispatch = session.begin_chat("hi").unwrap();
        session
            .complete_chat(dispatch.ticket, Ok("hello".to_string()))
            .unwrap();
        let before = session.generation();

        session.reset();
        assert!(session.story().is_none());
        assert!(session.transcript().is_empty());
        assert!(session.source_image().is_none());
        assert!(session.narration().is_none());
        assert!(session.generation() > before);
    }

    #[test]
    fn test_chat_requires_story() {
        let mut session = Session::new();
        assert!(matches!(session.begin_chat("hi"), Err(Error::NoStory)));
        assert!(matches!(session.begin_narration(), Err(Error::NoStory)));
    }

    #[test]
    fn test_chat_rejects_blank_message() {
        let mut session = with_story();
        assert!(matches!(
            session.begin_chat("   "),
            Err(Error::InvalidInput(_))
        ));
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_chat_appends_user_turn_optimistically() {
        let mut session = with_story();
        let dispatch = session.begin_chat("  Tell me more  ").unwrap();

        assert_eq!(dispatch.message, "Tell me more");
        assert_eq!(dispatch.context, "Once...");
        assert!(dispatch.history.is_empty());
        assert_eq!(session.transcript(), &[ChatTurn::user("Tell me more")]);
        assert_eq!(session.pending_operation(), PendingOperation::Chatting);
    }

    #[test]
    fn test_chat_is_serialized() {
        let mut session = with_story();
        session.begin_chat("one").unwrap();
        assert!(matches!(
            session.begin_chat("two"),
            Err(Error::OperationPending(PendingOperation::Chatting))
        ));
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn test_chat_history_excludes_new_message() {
        let mut session = with_story();
        let first = session.begin_chat("one").unwrap();
        session.complete_chat(first.ticket, Ok("uno".to_string())).unwrap();

        let second = session.begin_chat("two").unwrap();
        assert_eq!(
            second.history,
            vec![ChatTurn::user("one"), ChatTurn::assistant("uno")]
        );
    }

    #[test]
    fn test_empty_reply_uses_fallback() {
        let mut session = with_story();
        let dispatch = session.begin_chat("hi").unwrap();
        session
            .complete_chat(dispatch.ticket, Ok("  ".to_string()))
            .unwrap();

        assert_eq!(
            session.transcript().last(),
            Some(&ChatTurn::assistant(prompts::CHAT_FALLBACK_REPLY))
        );
    }

    #[test]
    fn test_chat_failure_keeps_user_turn_only() {
        let mut session = with_story();
        let dispatch = session.begin_chat("Tell me more").unwrap();

        let err = session
            .complete_chat(dispatch.ticket, Err(Error::Chat("network".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::Chat(_)));
        assert_eq!(session.transcript(), &[ChatTurn::user("Tell me more")]);
        assert_eq!(session.pending_operation(), PendingOperation::None);
    }

    #[test]
    fn test_stale_chat_reply_is_discarded() {
        let mut session = with_story();
        let dispatch = session.begin_chat("hi").unwrap();
        session.reset();

        let completion = session
            .complete_chat(dispatch.ticket, Ok("late".to_string()))
            .unwrap();
        assert_eq!(completion, Completion::Stale);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_narration_is_synthesized_once_then_toggled() {
        let mut session = with_story();

        let step = session.begin_narration().unwrap();
        let ticket = match step {
            NarrationStep::Synthesize { ticket, text } => {
                assert_eq!(text, "Once...");
                ticket
            }
            other => panic!("expected synthesis, got {:?}", other),
        };
        assert_eq!(session.begin_narration().unwrap(), NarrationStep::Suppressed);

        session.complete_narration(ticket, Ok(audio())).unwrap();
        assert!(session.is_narration_playing());
        assert_eq!(session.narration(), Some(&audio()));

        assert_eq!(
            session.begin_narration().unwrap(),
            NarrationStep::Toggled { playing: false }
        );
        assert_eq!(
            session.begin_narration().unwrap(),
            NarrationStep::Toggled { playing: true }
        );
    }

    #[test]
    fn test_narration_failure_allows_retry() {
        let mut session = with_story();
        let NarrationStep::Synthesize { ticket, .. } = session.begin_narration().unwrap() else {
            panic!("expected synthesis");
        };

        assert!(session
            .complete_narration(ticket, Err(Error::SpeechSynthesis("no audio".to_string())))
            .is_err());
        assert!(session.narration().is_none());
        assert!(!session.is_pending(PendingOperation::SynthesizingSpeech));
        assert!(matches!(
            session.begin_narration().unwrap(),
            NarrationStep::Synthesize { .. }
        ));
    }

    #[test]
    fn test_stale_narration_is_discarded() {
        let mut session = with_story();
        let NarrationStep::Synthesize { ticket, .. } = session.begin_narration().unwrap() else {
            panic!("expected synthesis");
        };
        session.reset();

        let completion = session.complete_narration(ticket, Ok(audio())).unwrap();
        assert_eq!(completion, Completion::Stale);
        assert!(session.narration().is_none());
        assert!(!session.is_narration_playing());
    }

    #[test]
    fn test_narration_from_previous_story_is_not_cached() {
        let mut session = with_story();
        let NarrationStep::Synthesize { ticket, .. } = session.begin_narration().unwrap() else {
            panic!("expected synthesis");
        };
        session.begin_analysis(image()).unwrap();

        let completion = session.complete_narration(ticket, Ok(audio())).unwrap();
        assert_eq!(completion, Completion::Stale);
        assert!(session.narration().is_none());
        assert!(!session.is_narration_playing());
        assert_eq!(session.pending_operation(), PendingOperation::Analyzing);
    }

    #[test]
    fn test_chat_and_narration_may_overlap() {
        let mut session = with_story();
        session.begin_chat("hi").unwrap();
        assert!(matches!(
            session.begin_narration().unwrap(),
            NarrationStep::Synthesize { .. }
        ));
        assert!(session.is_pending(PendingOperation::Chatting));
        assert!(session.is_pending(PendingOperation::SynthesizingSpeech));
        assert_eq!(session.pending_operation(), PendingOperation::Chatting);
    }

    #[test]
    fn test_finish_playback_stops_narration() {
        let mut session = with_story();
        let NarrationStep::Synthesize { ticket, .. } = session.begin_narration().unwrap() else {
            panic!("expected synthesis");
        };
        session.complete_narration(ticket, Ok(audio())).unwrap();

        session.finish_playback();
        assert!(!session.is_narration_playing());
        assert!(session.narration().is_some());
    }
}
