//! Chat agent turn: clinical context on the first turn, prompt assembly, completion call.
//!
//! Conversation storage lives with the caller; `ChatAgent::respond` takes the prior turns
//! and returns only the reply text.

use crate::completion::{ChatMessage, CompletionError, CompletionService, Role};
use crate::context::{AssemblyRequest, ContextAssembler, ContextPayload, DEFAULT_LEVEL_FILTER};
use crate::lang::{resolve_language, DEFAULT_LANG};
use crate::pet;
use crate::prompts::{language_guard, PromptProfile};
use crate::symptoms::symptom_keys_from_value;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Conversations with this id prefix are one-shot (no stored history).
pub const SUMMARY_PREFIX: &str = "summary-";

/// User-facing text when a turn cannot be answered.
pub const GENERIC_FAILURE: &str = "Could not produce a response.";

pub const NO_PET_DATA: &str = "NO_PET_DATA";

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("pet record has no species")]
    NoPetData,

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Body of `POST /agent`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub pet: Value,
    pub symptom_keys: Vec<String>,
    pub user_lang: Option<String>,
    pub conversation_id: Option<String>,
    pub conversation_history: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Lenient decode: wrong-typed fields read as absent; history keeps only non-empty
    /// `user`/`assistant` turns.
    pub fn from_value(body: &Value) -> Self {
        Self {
            message: body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            pet: body.get("pet").cloned().unwrap_or(Value::Null),
            symptom_keys: symptom_keys_from_value(body.get("symptomKeys")),
            user_lang: non_blank(body.get("userLang")),
            conversation_id: non_blank(body.get("conversationId")),
            conversation_history: history_from_value(body.get("conversationHistory")),
        }
    }

    pub fn is_one_shot(&self) -> bool {
        self.conversation_id
            .as_deref()
            .is_some_and(|id| id.starts_with(SUMMARY_PREFIX))
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn history_from_value(value: Option<&Value>) -> Vec<ChatMessage> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let content = item.get("content").and_then(Value::as_str)?;
            if content.trim().is_empty() {
                return None;
            }
            match item.get("role").and_then(Value::as_str)? {
                "user" => Some(ChatMessage::user(content)),
                "assistant" => Some(ChatMessage::assistant(content)),
                _ => None,
            }
        })
        .collect()
}

/// Response body of `POST /agent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl AgentResponse {
    pub fn reply(reply: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            ok: true,
            reply: Some(reply.into()),
            error: None,
            details: None,
            conversation_id: Some(conversation_id.into()),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            reply: None,
            error: Some(error.into()),
            details: None,
            conversation_id: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// First turn: symptoms were selected, or nothing real was said before.
pub fn is_first_turn(symptom_keys: &[String], prior: &[ChatMessage]) -> bool {
    !symptom_keys.is_empty()
        || prior.is_empty()
        || (prior.len() == 1 && prior[0].content.trim().is_empty())
}

/// Prompt order: system, language guard, context (first turn only), history tail, current
/// message unless the history already ends with it.
pub fn build_messages(
    system_prompt: String,
    lang: &str,
    context_json: Option<String>,
    history: &[ChatMessage],
    message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 4);
    messages.push(ChatMessage::system(system_prompt));
    messages.push(ChatMessage::user(language_guard(lang)));
    if let Some(ctx) = context_json {
        messages.push(ChatMessage::user(ctx));
    }
    messages.extend_from_slice(history);

    let already_last = history
        .last()
        .is_some_and(|m| m.role == Role::User && m.content == message);
    if !already_last {
        messages.push(ChatMessage::user(message));
    }
    messages
}

/// Last `limit` turns of `history`.
pub fn history_tail(history: &[ChatMessage], limit: usize) -> &[ChatMessage] {
    &history[history.len().saturating_sub(limit)..]
}

pub struct ChatAgent {
    assembler: ContextAssembler,
    completion: Arc<dyn CompletionService>,
    profile: PromptProfile,
    default_lang: String,
    level_filter: String,
    history_limit: usize,
}

impl ChatAgent {
    pub fn new(
        assembler: ContextAssembler,
        completion: Arc<dyn CompletionService>,
        profile: PromptProfile,
    ) -> Self {
        Self {
            assembler,
            completion,
            profile,
            default_lang: DEFAULT_LANG.to_string(),
            level_filter: DEFAULT_LEVEL_FILTER.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_default_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_lang = lang.into();
        self
    }

    pub fn with_level_filter(mut self, level: impl Into<String>) -> Self {
        self.level_filter = level.into();
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn completion_name(&self) -> &str {
        self.completion.name()
    }

    /// Working language for this request.
    pub fn language_for(&self, request: &ChatRequest) -> String {
        resolve_language(
            request.user_lang.as_deref(),
            pet::pet_language(&request.pet).as_deref(),
            &self.default_lang,
        )
    }

    /// One turn. `prior` is the conversation before the current message.
    pub async fn respond(
        &self,
        request: &ChatRequest,
        prior: &[ChatMessage],
    ) -> Result<String, AgentError> {
        if !pet::has_species(&request.pet) {
            return Err(AgentError::NoPetData);
        }
        let lang = self.language_for(request);
        let first_turn = is_first_turn(&request.symptom_keys, prior);
        info!(
            conversation = request.conversation_id.as_deref().unwrap_or("-"),
            lang = %lang,
            first_turn,
            prior = prior.len(),
            "Chat turn"
        );

        let context_json = if first_turn {
            self.context_json(request, &lang).await
        } else {
            debug!("Follow-up turn, clinical context not resent");
            None
        };

        let messages = build_messages(
            self.profile.system_prompt(&lang),
            &lang,
            context_json,
            history_tail(prior, self.history_limit),
            &request.message,
        );

        match self.completion.complete(&messages).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(service = self.completion.name(), "Completion failed: {}", e);
                Err(e.into())
            }
        }
    }

    async fn context_json(&self, request: &ChatRequest, lang: &str) -> Option<String> {
        let assembly = AssemblyRequest::new(request.pet.clone())
            .with_symptoms(request.symptom_keys.iter().cloned())
            .with_lang(lang)
            .with_level(self.level_filter.clone());
        match self.assembler.assemble(&assembly).await {
            ContextPayload::Assembled(ctx) => match ctx.to_json() {
                Ok(json) => Some(json),
                Err(e) => {
                    warn!("Clinical context not serialised: {}", e);
                    None
                }
            },
            ContextPayload::Failed(failure) => {
                warn!(
                    "Clinical context unavailable: {} ({})",
                    failure.error, failure.details
                );
                None
            }
        }
    }
}
