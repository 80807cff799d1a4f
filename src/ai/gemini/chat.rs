use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentResponse};
use crate::models::ChatTurn;
use crate::{prompts, Error, Result};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

/// Stateless multi-turn chat: every call resends the whole history.
pub struct GeminiChatClient {
    http: GeminiHttpClient,
}

impl GeminiChatClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, Duration::from_secs(60), reqwest::Client::new())
    }

    pub fn new_with_client(
        api_key: String,
        model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, timeout, client),
        }
    }

    fn build_request(message: &str, context: &str, history: &[ChatTurn]) -> ChatRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content::text(Some(turn.speaker.gemini_role()), turn.text.clone()))
            .collect();
        contents.push(Content::text(Some("user"), message));

        ChatRequest {
            system_instruction: Content::text(
                None,
                prompts::render(prompts::CHAT_SYSTEM, &[("context", context)]),
            ),
            contents,
        }
    }

    /// Returns the reply text, or an empty string when Gemini answered with nothing.
    pub async fn chat(&self, message: &str, context: &str, history: &[ChatTurn]) -> Result<String> {
        tracing::debug!(
            "Sending chat message with {} turns of history",
            history.len()
        );

        let request = Self::build_request(message, context, history);
        let response: GenerateContentResponse = self
            .http
            .generate_content(&request)
            .await
            .map_err(|e| Error::Chat(e.to_string()))?;

        Ok(response.first_text().unwrap_or_default())
    }
}

super::impl_with_gemini_base_url!(GeminiChatClient);
