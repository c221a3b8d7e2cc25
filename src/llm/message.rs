// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types exchanged with providers
//!
//! Providers consume [`ChatMessage`] lists and produce [`TokenDelta`]s,
//! whatever their wire format looks like.

use serde::{Deserialize, Serialize};

/// A message in a provider-agnostic chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: Role,

    /// Plain text content
    pub text: String,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl ChatMessage {
    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// One increment of generated output.
///
/// `cumulative_tokens` is the running count for the whole response so far;
/// backends that only report usage at the end leave it at zero until the
/// final delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenDelta {
    pub text: String,
    pub is_final: bool,
    pub cumulative_tokens: u64,
}

impl TokenDelta {
    /// A non-final delta carrying text
    pub fn text(text: impl Into<String>, cumulative_tokens: u64) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            cumulative_tokens,
        }
    }

    /// The closing delta of a response
    pub fn finished(text: impl Into<String>, cumulative_tokens: u64) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            cumulative_tokens,
        }
    }
}

/// Split a message list into the joined system text and the remaining turns.
///
/// Backends that take the system prompt as a separate field use this; several
/// system messages are joined with a blank line.
pub fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.text.as_str())
        .collect();
    let rest = messages.iter().filter(|m| m.role != Role::System).collect();

    if system.is_empty() {
        (None, rest)
    } else {
        (Some(system.join("\n\n")), rest)
    }
}
