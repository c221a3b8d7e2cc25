// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Wire protocol between a session and its client
//!
//! Both directions are JSON objects tagged by a `type` field. One message
//! travels per line on the stdio transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::orchestrator::AgentConfig;

/// Commands sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    UserMessage {
        content: String,
        #[serde(default)]
        mentioned_models: Vec<String>,
    },
    Pause,
    Resume,
    Stop,
    UpdateConfig,
}

/// Events pushed to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Ready,
    RoundStart {
        round: u32,
    },
    Thinking {
        model_id: String,
        model_name: String,
        color: String,
    },
    Chunk {
        model_id: String,
        model_name: String,
        content: String,
        tokens: u64,
        tokens_per_second: f64,
        color: String,
    },
    Complete {
        model_id: String,
        model_name: String,
        content: String,
        tokens: u64,
        tokens_per_second: f64,
        color: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_name: Option<String>,
        error: String,
    },
    RoundEnd {
        round: u32,
    },
    TokenUsage {
        usage: BTreeMap<String, u64>,
    },
    Paused,
    Resumed,
    Checkpoint {
        round: u32,
    },
    Stopped,
}

impl ServerEvent {
    pub fn thinking(agent: &AgentConfig) -> Self {
        ServerEvent::Thinking {
            model_id: agent.short_id.clone(),
            model_name: agent.display_name.clone(),
            color: agent.color_tag.clone(),
        }
    }

    pub fn chunk(agent: &AgentConfig, content: String, tokens: u64, tokens_per_second: f64) -> Self {
        ServerEvent::Chunk {
            model_id: agent.short_id.clone(),
            model_name: agent.display_name.clone(),
            content,
            tokens,
            tokens_per_second,
            color: agent.color_tag.clone(),
        }
    }

    pub fn complete(
        agent: &AgentConfig,
        content: String,
        tokens: u64,
        tokens_per_second: f64,
    ) -> Self {
        ServerEvent::Complete {
            model_id: agent.short_id.clone(),
            model_name: agent.display_name.clone(),
            content,
            tokens,
            tokens_per_second,
            color: agent.color_tag.clone(),
        }
    }

    /// Error attributed to one agent's turn
    pub fn agent_error(agent: &AgentConfig, error: impl Into<String>) -> Self {
        ServerEvent::Error {
            model_id: Some(agent.short_id.clone()),
            model_name: Some(agent.display_name.clone()),
            error: error.into(),
        }
    }

    /// Error not tied to any agent
    pub fn error(error: impl Into<String>) -> Self {
        ServerEvent::Error {
            model_id: None,
            model_name: None,
            error: error.into(),
        }
    }

    /// The `type` tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Ready => "ready",
            ServerEvent::RoundStart { .. } => "round_start",
            ServerEvent::Thinking { .. } => "thinking",
            ServerEvent::Chunk { .. } => "chunk",
            ServerEvent::Complete { .. } => "complete",
            ServerEvent::Error { .. } => "error",
            ServerEvent::RoundEnd { .. } => "round_end",
            ServerEvent::TokenUsage { .. } => "token_usage",
            ServerEvent::Paused => "paused",
            ServerEvent::Resumed => "resumed",
            ServerEvent::Checkpoint { .. } => "checkpoint",
            ServerEvent::Stopped => "stopped",
        }
    }
}
