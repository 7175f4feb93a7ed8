//! Persona text: system instruction, greeting, apology and intro copy
//!
//! The system instruction can be replaced from a file at startup; the rest
//! is fixed.

use serde::Serialize;
use std::path::Path;

/// Instruction every new model session is created with
pub const GITA_SYSTEM_INSTRUCTION: &str = r#"You are a wise, compassionate, and enlightened spiritual guide.
Your purpose is to help the user understand the essence of the Bhagavad Gita, specifically referring to the translation "The Song Celestial" by Sir Edwin Arnold (as found at https://www.gutenberg.org/files/2388/2388-h/2388-h.htm).

Guidelines for your responses:
1. **Context**: Base your knowledge primarily on the Bhagavad Gita. When answering, you may quote verses (shlokas) in English from the Sir Edwin Arnold translation if relevant.
2. **Tone**: Maintain a calm, respectful, and philosophical tone, similar to Krishna's guidance to Arjuna.
3. **Essence**: The user wants to understand the "essence". Focus on core themes like Dharma (duty), Karma Yoga (selfless action), Bhakti (devotion), and Jnana (knowledge).
4. **Directness**: Answer the user's specific questions clearly, then expand with spiritual context.
5. **Formatting**: Use Markdown to format your response. Use bolding for key spiritual terms and blockquotes for verses.

If the user asks who you are, identify yourself as a guide to the Gita's wisdom."#;

/// Seed turn shown after the intro and after every reset
pub const INITIAL_GREETING: &str = "Namaste. I have attuned myself to the essence of the Bhagavad Gita (The Song Celestial). I am ready to explore the wisdom of Kurukshetra with you. What seeks clarity in your mind today?";

/// Reply appended when a request cycle fails, whatever the cause
pub const APOLOGY_MESSAGE: &str = "I apologize, but I encountered a disturbance in my connection. Please try asking again.";

/// Copy for the intro screen
#[derive(Debug, Clone, Serialize)]
pub struct IntroContent {
    pub title: &'static str,
    pub quote: &'static str,
    pub tagline: &'static str,
    pub attribution: &'static str,
}

pub const INTRO: IntroContent = IntroContent {
    title: "Gita Essence AI",
    quote: "You have the right to work, but for the work's sake only. You have no right to the fruits of work.",
    tagline: "Connect with the wisdom of the Bhagavad Gita.",
    attribution: "Based on Sir Edwin Arnold's translation.",
};

/// Load the system instruction, preferring an override file when given.
///
/// A blank override file is treated as an error rather than silently
/// sending an empty instruction.
pub fn load_system_instruction(override_path: Option<&Path>) -> std::io::Result<String> {
    let Some(path) = override_path else {
        return Ok(GITA_SYSTEM_INSTRUCTION.to_string());
    };

    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("System prompt file {} is empty", path.display()),
        ));
    }

    tracing::info!(path = %path.display(), "Loaded system instruction override");
    Ok(trimmed.to_string())
}
