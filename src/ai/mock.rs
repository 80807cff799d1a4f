use super::ModelGateway;
use crate::models::{ChatTurn, NarrationAudio, SourceImage, StoryResult};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Clone)]
enum Canned<T> {
    Reply(T),
    Fail(String),
}

/// In-memory gateway for tests and harnesses.
///
/// Queued responses are consumed in order; once a queue is empty a default
/// response is returned. Clones share queues, counters and the latch.
#[derive(Clone)]
pub struct MockGateway {
    stories: Arc<Mutex<VecDeque<Canned<StoryResult>>>>,
    audio: Arc<Mutex<VecDeque<Canned<NarrationAudio>>>>,
    replies: Arc<Mutex<VecDeque<Canned<String>>>>,
    analysis_calls: Arc<Mutex<usize>>,
    speech_calls: Arc<Mutex<usize>>,
    chat_calls: Arc<Mutex<usize>>,
    chat_histories: Arc<Mutex<Vec<Vec<ChatTurn>>>>,
    latch: Option<Arc<Notify>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            stories: Arc::new(Mutex::new(VecDeque::new())),
            audio: Arc::new(Mutex::new(VecDeque::new())),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            analysis_calls: Arc::new(Mutex::new(0)),
            speech_calls: Arc::new(Mutex::new(0)),
            chat_calls: Arc::new(Mutex::new(0)),
            chat_histories: Arc::new(Mutex::new(Vec::new())),
            latch: None,
        }
    }

    pub fn with_story(self, story: StoryResult) -> Self {
        self.stories.lock().unwrap().push_back(Canned::Reply(story));
        self
    }

    pub fn with_analysis_failure(self, message: &str) -> Self {
        self.stories
            .lock()
            .unwrap()
            .push_back(Canned::Fail(message.to_string()));
        self
    }

    pub fn with_audio(self, audio: NarrationAudio) -> Self {
        self.audio.lock().unwrap().push_back(Canned::Reply(audio));
        self
    }

    pub fn with_speech_failure(self, message: &str) -> Self {
        self.audio
            .lock()
            .unwrap()
            .push_back(Canned::Fail(message.to_string()));
        self
    }

    pub fn with_chat_reply(self, reply: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Canned::Reply(reply.to_string()));
        self
    }

    pub fn with_chat_failure(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Canned::Fail(message.to_string()));
        self
    }

    /// Every call waits for one `notify_one` on `latch` before answering.
    pub fn with_latch(mut self, latch: Arc<Notify>) -> Self {
        self.latch = Some(latch);
        self
    }

    pub fn get_analysis_call_count(&self) -> usize {
        *self.analysis_calls.lock().unwrap()
    }

    pub fn get_speech_call_count(&self) -> usize {
        *self.speech_calls.lock().unwrap()
    }

    pub fn get_chat_call_count(&self) -> usize {
        *self.chat_calls.lock().unwrap()
    }

    /// History passed to each chat call, in call order.
    pub fn get_chat_histories(&self) -> Vec<Vec<ChatTurn>> {
        self.chat_histories.lock().unwrap().clone()
    }

    pub fn default_story() -> StoryResult {
        StoryResult {
            opening_paragraph: "The lanterns had burned all night.".to_string(),
            mood: "wistful".to_string(),
            scene_description: "A harbour at dawn".to_string(),
            captions: vec![
                "First light".to_string(),
                "Where the boats sleep".to_string(),
                "Salt and silence".to_string(),
            ],
            music_recommendations: vec![
                "ambient".to_string(),
                "lo-fi".to_string(),
                "neoclassical".to_string(),
            ],
        }
    }

    async fn wait_for_latch(&self) {
        if let Some(latch) = &self.latch {
            latch.notified().await;
        }
    }

    fn next<T: Clone>(queue: &Mutex<VecDeque<Canned<T>>>) -> Option<Canned<T>> {
        queue.lock().unwrap().pop_front()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn analyze_image(&self, _image: &SourceImage) -> Result<StoryResult> {
        *self.analysis_calls.lock().unwrap() += 1;
        self.wait_for_latch().await;

        match Self::next(&self.stories) {
            Some(Canned::Reply(story)) => Ok(story),
            Some(Canned::Fail(message)) => Err(Error::Analysis(message)),
            None => Ok(Self::default_story()),
        }
    }

    async fn synthesize_speech(&self, _text: &str) -> Result<NarrationAudio> {
        *self.speech_calls.lock().unwrap() += 1;
        self.wait_for_latch().await;

        match Self::next(&self.audio) {
            Some(Canned::Reply(audio)) => Ok(audio),
            Some(Canned::Fail(message)) => Err(Error::SpeechSynthesis(message)),
            None => Ok(NarrationAudio {
                mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
                data: vec![0x00, 0x00, 0x10, 0x00],
            }),
        }
    }

    async fn chat(&self, message: &str, _context: &str, history: &[ChatTurn]) -> Result<String> {
        *self.chat_calls.lock().unwrap() += 1;
        self.chat_histories.lock().unwrap().push(history.to_vec());
        self.wait_for_latch().await;

        match Self::next(&self.replies) {
            Some(Canned::Reply(reply)) => Ok(reply),
            Some(Canned::Fail(message)) => Err(Error::Chat(message)),
            None => Ok(format!("You asked: {}", message)),
        }
    }
}
