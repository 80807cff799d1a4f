/// Implements `with_base_url` for a client wrapping a `GeminiHttpClient` in `http`.
macro_rules! impl_with_gemini_base_url {
    ($client:ty) => {
        impl $client {
            pub fn with_base_url(mut self, base_url: String) -> Self {
                self.http = self.http.with_base_url(base_url);
                self
            }
        }
    };
}
pub(crate) use impl_with_gemini_base_url;

pub mod analysis;
pub mod chat;
pub mod client;
pub mod speech;
pub mod types;

pub use analysis::GeminiAnalysisClient;
pub use chat::GeminiChatClient;
pub use client::GeminiHttpClient;
pub use speech::GeminiSpeechClient;
