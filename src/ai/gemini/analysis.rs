use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentResponse, InlineData, Part};
use crate::models::{SourceImage, StoryResult};
use crate::{prompts, Error, Result};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct AnalysisRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: AnalysisGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisGenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

/// Response schema mirroring [`StoryResult`]; all five fields are required.
fn story_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "openingParagraph": { "type": "STRING" },
            "mood": { "type": "STRING" },
            "sceneDescription": { "type": "STRING" },
            "captions": { "type": "ARRAY", "items": { "type": "STRING" } },
            "musicRecommendations": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": [
            "openingParagraph",
            "mood",
            "sceneDescription",
            "captions",
            "musicRecommendations"
        ]
    })
}

/// Turns an image into a [`StoryResult`] via a schema-constrained JSON response.
pub struct GeminiAnalysisClient {
    http: GeminiHttpClient,
}

impl GeminiAnalysisClient {
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

    pub async fn analyze_image(&self, image: &SourceImage) -> Result<StoryResult> {
        tracing::debug!(
            "Analyzing image ({} bytes, {}) with {}",
            image.bytes.len(),
            image.mime_type,
            self.http.model()
        );

        use base64::Engine as _;
        let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);

        let request = AnalysisRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type.clone(),
                            data,
                        },
                    },
                    Part::Text {
                        text: prompts::ANALYSIS.to_string(),
                    },
                ],
            }],
            generation_config: AnalysisGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: story_schema(),
            },
        };

        let response: GenerateContentResponse = self
            .http
            .generate_content(&request)
            .await
            .map_err(|e| Error::Analysis(e.to_string()))?;

        let text = response
            .first_text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Analysis("No story in Gemini response".to_string()))?;

        parse_story(&text)
    }
}

super::impl_with_gemini_base_url!(GeminiAnalysisClient);

/// Parse the model's JSON text into a story, rejecting anything incomplete.
pub fn parse_story(text: &str) -> Result<StoryResult> {
    let trimmed = strip_code_fence(text.trim());
    serde_json::from_str(trimmed).map_err(|e| {
        tracing::error!("Gemini returned an unusable story payload: {}", e);
        Error::Analysis(format!("Malformed story payload: {}", e))
    })
}

fn strip_code_fence(text: &str) -> &str {
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(text)
}
