use super::gemini::{GeminiAnalysisClient, GeminiChatClient, GeminiSpeechClient};
use super::ModelGateway;
use crate::models::{ChatTurn, Config, NarrationAudio, SourceImage, StoryResult};
use crate::Result;
use async_trait::async_trait;
use tracing::info;

/// Gateway backed by Gemini's REST API, one client per capability.
pub struct GeminiGateway {
    analysis: GeminiAnalysisClient,
    speech: GeminiSpeechClient,
    chat: GeminiChatClient,
}

impl GeminiGateway {
    pub fn from_config(config: &Config) -> Self {
        // Reuse one HTTP connection pool across capability clients.
        let http_client = reqwest::Client::new();

        info!("Analysis model: {}", config.analysis_model);
        info!(
            "Speech model: {} (voice: {})",
            config.speech_model, config.voice
        );
        info!("Chat model: {}", config.chat_model);

        let mut gateway = Self {
            analysis: GeminiAnalysisClient::new_with_client(
                config.gemini_api_key.clone(),
                config.analysis_model.clone(),
                config.timeout,
                http_client.clone(),
            ),
            speech: GeminiSpeechClient::new_with_client(
                config.gemini_api_key.clone(),
                config.speech_model.clone(),
                config.voice.clone(),
                config.timeout,
                http_client.clone(),
            ),
            chat: GeminiChatClient::new_with_client(
                config.gemini_api_key.clone(),
                config.chat_model.clone(),
                config.timeout,
                http_client,
            ),
        };

        if let Some(base_url) = &config.gemini_base_url {
            info!("Using Gemini base URL override: {}", base_url);
            gateway = gateway.with_base_url(base_url.clone());
        }

        gateway
    }

    pub fn with_base_url(self, base_url: String) -> Self {
        Self {
            analysis: self.analysis.with_base_url(base_url.clone()),
            speech: self.speech.with_base_url(base_url.clone()),
            chat: self.chat.with_base_url(base_url),
        }
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn analyze_image(&self, image: &SourceImage) -> Result<StoryResult> {
        self.analysis.analyze_image(image).await
    }

    async fn synthesize_speech(&self, text: &str) -> Result<NarrationAudio> {
        self.speech.synthesize_speech(text).await
    }

    async fn chat(&self, message: &str, context: &str, history: &[ChatTurn]) -> Result<String> {
        self.chat.chat(message, context, history).await
    }
}
