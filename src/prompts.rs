pub const ANALYSIS: &str = include_str!("../data/prompts/analysis.txt");
pub const SPEECH: &str = include_str!("../data/prompts/speech.txt");
pub const CHAT_SYSTEM: &str = include_str!("../data/prompts/chat_system.txt");

/// Assistant turn appended when the provider answers a chat message with nothing.
pub const CHAT_FALLBACK_REPLY: &str = "I'm lost in the story...";

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.trim_end().to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}
