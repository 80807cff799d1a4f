//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.
//! The three gateway failure classes (`Analysis`, `SpeechSynthesis`, `Chat`)
//! are what the flow controller turns into user-facing notifications.

use crate::models::PendingOperation;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Image analysis failed: {0}")]
    Analysis(String),

    #[error("Speech synthesis failed: {0}")]
    SpeechSynthesis(String),

    #[error("Chat failed: {0}")]
    Chat(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No story has been generated yet")]
    NoStory,

    #[error("Another {0} request is already in progress")]
    OperationPending(PendingOperation),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
