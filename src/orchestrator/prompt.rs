// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-agent prompt construction
//!
//! Every agent sees the same history, rendered from its own point of view:
//! its own turns are `assistant` messages and everyone else's are `user`
//! messages tagged with the author.

use crate::llm::message::ChatMessage;

use super::mentions::strip_mentions;
use super::types::{AgentConfig, ConversationTurn};

const BEHAVIOR_RULES: &str = "\n\nRules:\n\
- Only discuss what the user actually said. Do not invent or assume topics.\n\
- Do not pretend to have had previous conversations that didn't happen.\n\
- Do not claim capabilities you don't have (like browsing the web, generating images, or executing code).\n\
- You are a text-based assistant. You can only provide text responses.\n\
- If you don't know something, say so.\n";

const COLLABORATION_RULES: &str = "\n## Multi-Agent Collaboration\n\
You are one of several AI assistants in this conversation.\n\
- Messages from other assistants appear as [AssistantName (#id)]: content.\n\
- You CAN see and reference what other assistants have said.\n\
- You CAN build upon, agree with, or respectfully disagree with other assistants.\n\
- Only respond if you have something NEW and valuable to add.\n\
- Do not repeat what another assistant already said.\n\
- For simple greetings, one brief response is enough.\n\
- Focus on the user's task; do not start small talk when there is no active task.\n\
- If you agree with another assistant and have nothing to add, say 'I agree with [name]' or stay silent.\n";

const CODE_BLOCK_HINT: &str = "\nUse markdown code blocks with language tags when sharing code.";

/// The system prompt for one agent
pub fn system_prompt(agent: &AgentConfig, roster_size: usize) -> String {
    let mut prompt = format!("Your name is {}.", agent.display_name);
    if !agent.system_prompt.trim().is_empty() {
        prompt.push(' ');
        prompt.push_str(agent.system_prompt.trim());
    }
    prompt.push_str(BEHAVIOR_RULES);
    if roster_size > 1 {
        prompt.push_str(COLLABORATION_RULES);
    }
    prompt.push_str(CODE_BLOCK_HINT);
    prompt
}

/// How a peer's turn is shown to other agents
pub fn peer_citation(name: &str, short_id: &str, content: &str) -> String {
    format!("[{} (#{})]: {}", name, short_id, content)
}

/// Build the full message list for one agent's turn.
///
/// `current_prompt` is appended as a trailing user message unless it is
/// empty or identical to the latest user turn already in history.
pub fn build_chat_messages(
    agent: &AgentConfig,
    roster_size: usize,
    history: &[ConversationTurn],
    current_prompt: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt(agent, roster_size)));

    let mut last_user = None;
    for turn in history {
        if turn.is_user() {
            let text = strip_mentions(&turn.content);
            last_user = Some(text.clone());
            messages.push(ChatMessage::user(text));
        } else if turn.speaker == agent.short_id {
            messages.push(ChatMessage::assistant(turn.content.clone()));
        } else {
            let name = turn.speaker_name.as_deref().unwrap_or(&turn.speaker);
            messages.push(ChatMessage::user(peer_citation(
                name,
                &turn.speaker,
                &turn.content,
            )));
        }
    }

    if !current_prompt.is_empty() && last_user.as_deref() != Some(current_prompt) {
        messages.push(ChatMessage::user(current_prompt));
    }

    messages
}
