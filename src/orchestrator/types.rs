// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Core types for a round-table conversation
//!
//! Agents, the roster policy that orders them, and the turns they produce.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Speaker id used for turns written by the human
pub const USER_SPEAKER: &str = "user";

const SHORT_ID_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";
const SHORT_ID_LEN: usize = 4;

/// What an agent is best used for; drives keyword-based turn selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    #[default]
    General,
    Planner,
    Coder,
    Reviewer,
}

impl AgentRole {
    /// Parse a role name; empty or unknown names become `General`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "planner" => AgentRole::Planner,
            "coder" => AgentRole::Coder,
            "reviewer" => AgentRole::Reviewer,
            _ => AgentRole::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::General => "general",
            AgentRole::Planner => "planner",
            AgentRole::Coder => "coder",
            AgentRole::Reviewer => "reviewer",
        }
    }
}

impl<'de> Deserialize<'de> for AgentRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.map(|v| AgentRole::parse(&v)).unwrap_or_default())
    }
}

/// One model taking part in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model id routed through the registry, e.g. "anthropic:claude-3-opus-20240229"
    #[serde(alias = "model_id")]
    pub model_ref: String,

    /// Name shown to the user and to peers
    #[serde(alias = "name")]
    pub display_name: String,

    /// Short handle used in `@mentions`, unique within a roster
    #[serde(default)]
    pub short_id: String,

    /// Extra instructions appended after the agent's name
    #[serde(default)]
    pub system_prompt: String,

    #[serde(default)]
    pub role: AgentRole,

    /// UI color passed through to events
    #[serde(default, alias = "color")]
    pub color_tag: String,
}

impl AgentConfig {
    pub fn new(
        model_ref: impl Into<String>,
        display_name: impl Into<String>,
        short_id: impl Into<String>,
        role: AgentRole,
    ) -> Self {
        Self {
            model_ref: model_ref.into(),
            display_name: display_name.into(),
            short_id: short_id.into(),
            system_prompt: String::new(),
            role,
            color_tag: String::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color_tag = color.into();
        self
    }

    /// Whether a mention names this agent (case-insensitive)
    pub fn matches_mention(&self, mention: &str) -> bool {
        self.short_id.eq_ignore_ascii_case(mention)
            || self.display_name.to_lowercase() == mention.to_lowercase()
    }
}

/// Ordered agents plus the number of unattended rounds after each user turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPolicy {
    #[serde(default)]
    pub agents: Vec<AgentConfig>,

    #[serde(default)]
    pub autonomy_rounds: u32,
}

impl RosterPolicy {
    pub fn new(agents: Vec<AgentConfig>, autonomy_rounds: u32) -> Self {
        Self {
            agents,
            autonomy_rounds,
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Look up an agent by short id
    pub fn agent(&self, short_id: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.short_id == short_id)
    }

    /// Repair short ids and clamp the autonomy count
    pub fn normalized(mut self, max_autonomy_rounds: u32) -> Self {
        repair_short_ids(&mut self.agents);
        self.autonomy_rounds = self.autonomy_rounds.min(max_autonomy_rounds);
        self
    }
}

/// Handles an agent may not use: the `@all` mention and the human's speaker id
const RESERVED_SHORT_IDS: &[&str] = &["all", USER_SPEAKER];

fn is_reserved(short_id: &str) -> bool {
    RESERVED_SHORT_IDS
        .iter()
        .any(|r| r.eq_ignore_ascii_case(short_id))
}

/// Give every agent a unique short id.
///
/// Empty ids, the reserved `all` and `user`, and ids that repeat an earlier
/// entry (case-insensitively) are replaced with freshly generated ones. The
/// first holder of an id keeps it.
pub fn repair_short_ids(agents: &mut [AgentConfig]) {
    let taken: HashSet<String> = agents.iter().map(|a| a.short_id.to_lowercase()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rng = rand::rng();

    for agent in agents.iter_mut() {
        let key = agent.short_id.to_lowercase();
        if !key.is_empty() && !is_reserved(&key) && seen.insert(key) {
            continue;
        }

        let old = std::mem::take(&mut agent.short_id);
        agent.short_id = loop {
            let candidate: String = (0..SHORT_ID_LEN)
                .map(|_| SHORT_ID_ALPHABET[rng.random_range(0..SHORT_ID_ALPHABET.len())] as char)
                .collect();
            if !is_reserved(&candidate)
                && !taken.contains(&candidate)
                && seen.insert(candidate.clone())
            {
                break candidate;
            }
        };
        tracing::debug!(
            target: "roundtable.orchestrator",
            agent = %agent.display_name,
            old = %old,
            new = %agent.short_id,
            "repaired short id"
        );
    }
}

/// One produced message, authored by the user or by an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,

    /// `"user"` or the author's short id
    pub speaker: String,

    /// Display name of the authoring agent at the time of writing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_name: Option<String>,

    pub content: String,

    pub round_number: u32,

    pub token_count: u64,

    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// A turn written by the human
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker: USER_SPEAKER.to_string(),
            speaker_name: None,
            content: content.into(),
            round_number: 0,
            token_count: 0,
            timestamp: Utc::now(),
        }
    }

    /// A turn written by an agent
    pub fn agent(
        agent: &AgentConfig,
        content: impl Into<String>,
        round_number: u32,
        token_count: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker: agent.short_id.clone(),
            speaker_name: Some(agent.display_name.clone()),
            content: content.into(),
            round_number,
            token_count,
            timestamp: Utc::now(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.speaker == USER_SPEAKER
    }
}
