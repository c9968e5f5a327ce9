//! Natural-language lesson text.
//!
//! Epistemic foundation:
//! - K_i: Every component has a deterministic fallback template
//! - B_i: The generator may fail or answer with refusals → fallback, never an error
//! - I^B: Endpoint availability unknowable → generation is best-effort

pub mod fallback;
pub mod prompts;
mod writer;

pub use prompts::ExampleStats;
pub use writer::{ContentWriter, LessonText};

use crate::models::Result;
use async_trait::async_trait;

/// External text generator.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Phrases marking an apology, refusal or error echoed back as content.
const REJECTED_PHRASES: [&str; 7] = [
    "i cannot",
    "i'm sorry",
    "as an ai",
    "i don't have access",
    "content generation failed",
    "error",
    "failed to generate",
];

/// Trimmed length at least `min_chars` and no rejected phrase (case-insensitive).
pub fn is_valid_content(text: &str, min_chars: usize) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < min_chars {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !REJECTED_PHRASES.iter().any(|phrase| lower.contains(phrase))
}
