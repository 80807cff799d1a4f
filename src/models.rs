//! Data models and structures
//!
//! Defines the story payload returned by image analysis, the chat transcript
//! types, narration audio, and runtime configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Structured story generated from a single image.
///
/// Every field is required when deserializing a provider payload; a missing
/// field is a malformed response, not something to default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryResult {
    pub opening_paragraph: String,
    pub mood: String,
    pub scene_description: String,
    pub captions: Vec<String>,
    pub music_recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Role name used by Gemini's `contents[].role`.
    pub fn gemini_role(self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// Image bytes as selected by the user, tagged with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> crate::Result<Self> {
        let mime_type = mime_type.into();
        if !mime_type.starts_with("image/") {
            return Err(crate::Error::InvalidInput(format!(
                "'{}' is not an image MIME type",
                mime_type
            )));
        }
        if bytes.is_empty() {
            return Err(crate::Error::InvalidInput("Image is empty".to_string()));
        }
        Ok(Self { bytes, mime_type })
    }
}

/// Decoded narration payload and the codec the provider reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationAudio {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingOperation {
    #[default]
    None,
    Analyzing,
    SynthesizingSpeech,
    Chatting,
}

impl fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PendingOperation::None => "none",
            PendingOperation::Analyzing => "analysis",
            PendingOperation::SynthesizingSpeech => "narration",
            PendingOperation::Chatting => "chat",
        };
        f.write_str(name)
    }
}

pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_VOICE: &str = "Kore";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_base_url: Option<String>,
    pub analysis_model: String,
    pub speech_model: String,
    pub chat_model: String,
    pub voice: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| crate::Error::Config("GEMINI_API_KEY not set".to_string()))?;

        let timeout_secs = match lookup("MUSE_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(crate::Error::Config(format!(
                        "MUSE_TIMEOUT_SECS must be a positive integer, got '{}'",
                        raw
                    )))
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            gemini_api_key,
            gemini_base_url: lookup("GEMINI_BASE_URL"),
            analysis_model: lookup("MUSE_ANALYSIS_MODEL")
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            speech_model: lookup("MUSE_SPEECH_MODEL")
                .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            chat_model: lookup("MUSE_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            voice: lookup("MUSE_VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_story_result_uses_camel_case_fields() {
        let json = r#"{
            "openingParagraph": "Once...",
            "mood": "melancholy",
            "sceneDescription": "A rainy alley",
            "captions": ["c1", "c2", "c3"],
            "musicRecommendations": ["m1"]
        }"#;

        let story: StoryResult = serde_json::from_str(json).unwrap();
        assert_eq!(story.opening_paragraph, "Once...");
        assert_eq!(story.captions.len(), 3);
        assert_eq!(story.music_recommendations, vec!["m1".to_string()]);
    }

    #[test]
    fn test_story_result_rejects_missing_field() {
        let json = r#"{
            "openingParagraph": "Once...",
            "mood": "melancholy",
            "captions": [],
            "musicRecommendations": []
        }"#;

        let err = serde_json::from_str::<StoryResult>(json).unwrap_err();
        assert!(err.to_string().contains("sceneDescription"));
    }

    #[test]
    fn test_story_result_rejects_null_field() {
        let json = r#"{
            "openingParagraph": null,
            "mood": "calm",
            "sceneDescription": "A lake",
            "captions": [],
            "musicRecommendations": []
        }"#;

        assert!(serde_json::from_str::<StoryResult>(json).is_err());
    }

    #[test]
    fn test_speaker_maps_to_gemini_roles() {
        assert_eq!(Speaker::User.gemini_role(), "user");
        assert_eq!(Speaker::Assistant.gemini_role(), "model");
    }

    #[test]
    fn test_source_image_requires_image_mime() {
        assert!(SourceImage::new(vec![1], "image/png").is_ok());
        assert!(matches!(
            SourceImage::new(vec![1], "text/plain"),
            Err(crate::Error::InvalidInput(_))
        ));
        assert!(matches!(
            SourceImage::new(Vec::new(), "image/png"),
            Err(crate::Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.gemini_api_key, "k");
        assert_eq!(config.analysis_model, DEFAULT_ANALYSIS_MODEL);
        assert_eq!(config.speech_model, DEFAULT_SPEECH_MODEL);
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.voice, "Kore");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.gemini_base_url.is_none());
    }

    #[test]
    fn test_config_requires_api_key() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "k"),
            ("MUSE_CHAT_MODEL", "gemini-2.5-flash"),
            ("MUSE_VOICE", "Puck"),
            ("MUSE_TIMEOUT_SECS", "15"),
            ("GEMINI_BASE_URL", "http://localhost:9999"),
        ]))
        .unwrap();
        assert_eq!(config.chat_model, "gemini-2.5-flash");
        assert_eq!(config.voice, "Puck");
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(
            config.gemini_base_url.as_deref(),
            Some("http://localhost:9999")
        );
    }

    #[test]
    fn test_config_rejects_bad_timeout() {
        for raw in ["0", "-3", "soon"] {
            let err = Config::from_lookup(lookup_from(&[
                ("GEMINI_API_KEY", "k"),
                ("MUSE_TIMEOUT_SECS", raw),
            ]))
            .unwrap_err();
            assert!(matches!(err, crate::Error::Config(_)), "{}", raw);
        }
    }
}
