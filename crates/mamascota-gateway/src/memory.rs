//! Per-conversation turn memory for `/agent`, bounded in conversations and turns.

use dashmap::DashMap;
use mamascota_core::agent::history_tail;
use mamascota_core::{ChatMessage, ChatRequest, Role};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Conversation {
    turns: Vec<ChatMessage>,
    touched: u64,
}

pub struct ConversationMemory {
    conversations: DashMap<String, Conversation>,
    clock: AtomicU64,
    limit: usize,
    max_conversations: usize,
}

impl ConversationMemory {
    pub fn new(limit: usize, max_conversations: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            clock: AtomicU64::new(0),
            limit: limit.max(1),
            max_conversations: max_conversations.max(1),
        }
    }

    /// Turns before the current message. Stored memory wins; otherwise the client-supplied
    /// history seeds the conversation. One-shot conversations only see the client history.
    pub fn prior_for(&self, conversation_id: &str, request: &ChatRequest) -> Vec<ChatMessage> {
        if !request.is_one_shot() {
            if let Some(stored) = self.conversations.get(conversation_id) {
                if !stored.turns.is_empty() {
                    return stored.turns.clone();
                }
            }
        }
        history_tail(&request.conversation_history, self.limit).to_vec()
    }

    /// Appends the user message and the reply to the stored turns. A conversation with no
    /// stored turns is seeded with `prior` first.
    pub fn record(&self, conversation_id: &str, prior: Vec<ChatMessage>, message: &str, reply: &str) {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        {
            let mut entry = self
                .conversations
                .entry(conversation_id.to_string())
                .or_default();
            let conversation = entry.value_mut();
            if conversation.turns.is_empty() {
                conversation.turns = prior;
            }
            let turns = &mut conversation.turns;
            let already_last = turns
                .last()
                .is_some_and(|m| m.role == Role::User && m.content == message);
            if !already_last {
                turns.push(ChatMessage::user(message));
            }
            turns.push(ChatMessage::assistant(reply));
            let start = turns.len().saturating_sub(self.limit);
            turns.drain(..start);
            conversation.touched = tick;
        }
        self.evict_over_cap(conversation_id);
    }

    /// Drops least recently recorded conversations until the cap holds. `keep` is never evicted.
    fn evict_over_cap(&self, keep: &str) {
        while self.conversations.len() > self.max_conversations {
            let oldest = self
                .conversations
                .iter()
                .filter(|c| c.key() != keep)
                .min_by_key(|c| c.value().touched)
                .map(|c| c.key().clone());
            match oldest {
                Some(id) => {
                    self.conversations.remove(&id);
                    tracing::debug!("[MAMASCOTA] Evicted conversation {}", id);
                }
                None => break,
            }
        }
    }

    #[cfg(test)]
    pub fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.conversations
            .get(conversation_id)
            .map(|c| c.turns.clone())
            .unwrap_or_default()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
}
