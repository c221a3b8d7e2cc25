// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn selection: which agents answer a user message, in what order

use super::classify::classify_task;
use super::mentions::mentions_all;
use super::types::{AgentConfig, AgentRole};

/// Pick the responding agents for a prompt.
///
/// `@all` selects the whole roster. Otherwise agents named by a mention
/// respond in roster order; without a match the prompt is classified and the
/// first agent with the matching role answers, then the first `general`
/// agent, then simply the first agent.
pub fn select_responders<'a>(
    roster: &'a [AgentConfig],
    mentions: &[String],
    prompt: &str,
) -> Vec<&'a AgentConfig> {
    if roster.is_empty() {
        return Vec::new();
    }

    if mentions_all(mentions) {
        return roster.iter().collect();
    }

    if !mentions.is_empty() {
        let mentioned: Vec<&AgentConfig> = roster
            .iter()
            .filter(|agent| mentions.iter().any(|m| agent.matches_mention(m)))
            .collect();
        if !mentioned.is_empty() {
            return mentioned;
        }
        tracing::debug!(
            target: "roundtable.orchestrator",
            mentions = ?mentions,
            "no roster member matched mentions, classifying"
        );
    }

    let role = classify_task(prompt);
    let chosen = roster
        .iter()
        .find(|agent| agent.role == role)
        .or_else(|| roster.iter().find(|agent| agent.role == AgentRole::General))
        .or_else(|| roster.first());

    tracing::debug!(
        target: "roundtable.orchestrator",
        category = role.as_str(),
        agent = chosen.map(|a| a.short_id.as_str()).unwrap_or(""),
        "selected by classification"
    );

    chosen.into_iter().collect()
}
