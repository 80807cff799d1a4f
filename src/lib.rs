//! Muse - turns a photograph into a story with Gemini
//!
//! An uploaded image is analysed into a short story (opening paragraph, mood,
//! scene, social captions, music picks). The story can then be narrated
//! aloud or explored further in a chat with the model.

pub mod ai;
pub mod app;
pub mod audio;
pub mod error;
pub mod models;
pub mod prompts;
pub mod session;

pub use error::{Error, Result};
