//! Model gateway: the boundary wrapping every call to the generative provider
//!
//! Three stateless operations: image analysis into a structured story,
//! narration synthesis, and multi-turn chat about the story.

pub mod client;
pub mod gemini;
pub mod mime;
pub mod mock;

pub use client::GeminiGateway;
pub use mock::MockGateway;

use crate::models::{ChatTurn, NarrationAudio, SourceImage, StoryResult};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Fails with `Error::Analysis` on provider failure or an incomplete payload.
    async fn analyze_image(&self, image: &SourceImage) -> Result<StoryResult>;

    /// Fails with `Error::SpeechSynthesis` when the response carries no audio.
    async fn synthesize_speech(&self, text: &str) -> Result<NarrationAudio>;

    /// Replays `history` under a system instruction built from `context`, then
    /// sends `message`. An empty reply is `Ok("")`; only provider failures
    /// yield `Error::Chat`.
    async fn chat(&self, message: &str, context: &str, history: &[ChatTurn]) -> Result<String>;
}
