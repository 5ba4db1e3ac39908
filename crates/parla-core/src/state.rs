//! UI-agnostic conversation state types
//!
//! This module contains data structures that are shared between different UIs
//! and don't depend on any specific UI framework. The conversation log is
//! owned by the UI; the turn orchestrator only hands back new messages.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Greeting shown before the user has said anything
pub const GREETING: &str = "你好！我是你的語言學習助手。請開始對話。";
pub const GREETING_LANG: &str = "zh-TW";

/// Unique, creation-ordered message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

/// Shared monotonic source of message ids
#[derive(Debug, Clone, Default)]
pub struct IdSequence(Arc<AtomicU64>);

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> MessageId {
        MessageId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Bot,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    pub lang: String,
}

impl Message {
    pub fn user(id: MessageId, text: &str, lang: &str) -> Self {
        Self {
            id,
            sender: Sender::User,
            text: text.to_string(),
            lang: lang.to_string(),
        }
    }

    pub fn bot(id: MessageId, text: &str, lang: &str) -> Self {
        Self {
            id,
            sender: Sender::Bot,
            text: text.to_string(),
            lang: lang.to_string(),
        }
    }
}

/// The pair of messages produced for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user: Message,
    pub bot: Message,
}

/// Languages in play plus the message log
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub source_lang: String,
    pub target_lang: String,
    pub messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(source_lang: &str, target_lang: &str, ids: &IdSequence) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            messages: vec![Message::bot(ids.next(), GREETING, GREETING_LANG)],
        }
    }

    /// Append the user message, then the bot message
    pub fn apply_turn(&mut self, turn: Turn) {
        self.messages.push(turn.user);
        self.messages.push(turn.bot);
    }

    /// Exchange source and target. Equal values are allowed.
    pub fn swap_languages(&mut self) {
        std::mem::swap(&mut self.source_lang, &mut self.target_lang);
    }

    pub fn set_source(&mut self, code: &str) {
        self.source_lang = code.to_string();
    }

    pub fn set_target(&mut self, code: &str) {
        self.target_lang = code.to_string();
    }

    pub fn user_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.sender == Sender::User)
    }

    pub fn bot_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.sender == Sender::Bot)
    }

    pub fn last_bot_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.sender == Sender::Bot)
    }
}
