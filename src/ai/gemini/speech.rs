use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentResponse};
use crate::models::NarrationAudio;
use crate::{prompts, Error, Result};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SpeechRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: SpeechGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechGenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

pub struct GeminiSpeechClient {
    http: GeminiHttpClient,
    voice: String,
}

impl GeminiSpeechClient {
    pub fn new(api_key: String, model: String, voice: String) -> Self {
        Self::new_with_client(
            api_key,
            model,
            voice,
            Duration::from_secs(60),
            reqwest::Client::new(),
        )
    }

    pub fn new_with_client(
        api_key: String,
        model: String,
        voice: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, timeout, client),
            voice,
        }
    }

    pub async fn synthesize_speech(&self, text: &str) -> Result<NarrationAudio> {
        tracing::debug!(
            "Synthesizing {} chars of narration with voice {}",
            text.len(),
            self.voice
        );

        let request = SpeechRequest {
            contents: vec![Content::text(
                None,
                prompts::render(prompts::SPEECH, &[("text", text)]),
            )],
            generation_config: SpeechGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice.clone(),
                        },
                    },
                },
            },
        };

        let response: GenerateContentResponse = self
            .http
            .generate_content(&request)
            .await
            .map_err(|e| Error::SpeechSynthesis(e.to_string()))?;

        let inline = response
            .first_inline_data()
            .filter(|inline| !inline.data.is_empty())
            .ok_or_else(|| {
                Error::SpeechSynthesis("No audio data in Gemini response".to_string())
            })?;

        use base64::Engine as _;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| {
                Error::SpeechSynthesis(format!("Failed to decode Gemini base64 audio: {}", e))
            })?;

        tracing::debug!(
            "Gemini returned {} bytes of {} audio",
            data.len(),
            inline.mime_type
        );

        Ok(NarrationAudio {
            mime_type: inline.mime_type.clone(),
            data,
        })
    }
}

super::impl_with_gemini_base_url!(GeminiSpeechClient);
