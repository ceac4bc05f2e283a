//! System prompt profile and the fixed instructions wrapped around it.

use std::path::Path;
use tracing::{info, warn};

/// Placeholder in the profile replaced by the working language.
pub const LANG_PLACEHOLDER: &str = "{LANG_OVERRIDE}";

/// Appended after the profile on every turn.
pub const BREVITY_INSTRUCTION: &str =
    "[Instruction]: Answer briefly and clearly, step by step, and never give a diagnosis.";

/// Used when no profile file can be read.
pub const FALLBACK_PROFILE: &str = "You are Mamascota, a calm and caring assistant that helps pet owners \
understand their pet's symptoms and decide on next steps. You never diagnose and never prescribe \
medication; when signs are serious you tell the owner to see a veterinarian promptly. \
Always answer in {LANG_OVERRIDE}.";

/// Loaded system prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptProfile {
    template: String,
}

impl PromptProfile {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Reads the profile file; an unreadable or empty file yields the built-in fallback.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => {
                info!("[PROMPT] Loaded {} ({} chars)", path.display(), text.len());
                Self::new(text)
            }
            Ok(_) => {
                warn!("[PROMPT] {} is empty, using built-in profile", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("[PROMPT] {} not loaded: {}, using built-in profile", path.display(), e);
                Self::default()
            }
        }
    }

    /// Profile with the language filled in, followed by the override marker and the
    /// brevity instruction.
    pub fn system_prompt(&self, lang: &str) -> String {
        format!(
            "{}\n\n[LANG_OVERRIDE]: {}\n{}",
            self.template.replace(LANG_PLACEHOLDER, lang),
            lang,
            BREVITY_INSTRUCTION
        )
    }
}

impl Default for PromptProfile {
    fn default() -> Self {
        Self::new(FALLBACK_PROFILE)
    }
}

/// Guard message that pins the reply language.
pub fn language_guard(lang: &str) -> String {
    format!("Reply only in this language: {}. Never switch to another language.", lang)
}
