// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation orchestration
//!
//! [`ConversationOrchestrator`] owns one session's roster policy, turn
//! history and lifecycle phase. It decides who answers a user message and
//! renders the context each agent sees; the streaming itself is driven by
//! [`crate::session::SessionStreamController`].

pub mod classify;
pub mod mentions;
pub mod prompt;
pub mod selection;
pub mod types;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::llm::message::ChatMessage;

pub use types::{AgentConfig, AgentRole, ConversationTurn, RosterPolicy, USER_SPEAKER};

/// Lifecycle of a session's current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

/// The agents chosen for a user message and the prompt they share
#[derive(Debug, Clone)]
pub struct Selection {
    pub agents: Vec<AgentConfig>,
    pub prompt: String,
}

/// Per-session conversation state
#[derive(Debug)]
pub struct ConversationOrchestrator {
    session_id: String,
    policy: RosterPolicy,
    history: Vec<ConversationTurn>,
    phase: SessionPhase,
}

/// Orchestrator shared between a session's control loop and its runs
pub type SharedOrchestrator = Arc<Mutex<ConversationOrchestrator>>;

/// Lock a shared orchestrator, recovering from poisoning
pub fn lock(orchestrator: &SharedOrchestrator) -> MutexGuard<'_, ConversationOrchestrator> {
    match orchestrator.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(target: "roundtable.orchestrator", "orchestrator lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl ConversationOrchestrator {
    pub fn new(
        session_id: impl Into<String>,
        policy: RosterPolicy,
        history: Vec<ConversationTurn>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            policy,
            history,
            phase: SessionPhase::Idle,
        }
    }

    /// Wrap for sharing across tasks
    pub fn shared(self) -> SharedOrchestrator {
        Arc::new(Mutex::new(self))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn policy(&self) -> &RosterPolicy {
        &self.policy
    }

    /// Replace the roster policy. Runs already in flight keep their snapshot.
    pub fn set_policy(&mut self, policy: RosterPolicy) {
        tracing::debug!(
            target: "roundtable.orchestrator",
            session = %self.session_id,
            agents = policy.len(),
            autonomy_rounds = policy.autonomy_rounds,
            "policy updated"
        );
        self.policy = policy;
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Append a finished turn
    pub fn append_turn(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }

    /// Decide who answers a user message.
    ///
    /// Mentions in the text are merged after the explicit list. Keyword
    /// classification sees the message as typed, mentions included; the
    /// shared prompt is the text with mention syntax removed.
    pub fn select(&self, policy: &RosterPolicy, content: &str, explicit: &[String]) -> Selection {
        let mentions = mentions::merge_mentions(explicit, mentions::extract_mentions(content));
        let prompt = mentions::strip_mentions(content);
        let agents = selection::select_responders(&policy.agents, &mentions, content)
            .into_iter()
            .cloned()
            .collect();
        Selection { agents, prompt }
    }

    /// Messages for one agent's turn, from the current history
    pub fn messages_for(
        &self,
        agent: &AgentConfig,
        roster_size: usize,
        prompt: &str,
    ) -> Vec<ChatMessage> {
        prompt::build_chat_messages(agent, roster_size, &self.history, prompt)
    }

    // Phase transitions

    /// A new run starts; any previous pause or stop is cleared
    pub fn begin_run(&mut self) {
        self.phase = SessionPhase::Running;
    }

    /// Pause applies to a running run only
    pub fn pause(&mut self) -> bool {
        if self.phase == SessionPhase::Running {
            self.phase = SessionPhase::Paused;
            true
        } else {
            false
        }
    }

    /// Resume a paused run, or settle to idle if the run already ended
    pub fn resume(&mut self, run_active: bool) {
        if self.phase == SessionPhase::Paused {
            self.phase = if run_active {
                SessionPhase::Running
            } else {
                SessionPhase::Idle
            };
        }
    }

    pub fn stop(&mut self) {
        if matches!(self.phase, SessionPhase::Running | SessionPhase::Paused) {
            self.phase = SessionPhase::Stopped;
        }
    }

    /// The run reached a checkpoint and waits for the caller
    pub fn checkpoint(&mut self) {
        if self.phase == SessionPhase::Running {
            self.phase = SessionPhase::Paused;
        }
    }

    /// The run finished; a checkpoint pause or a stop outlives it
    pub fn end_run(&mut self) {
        if self.phase == SessionPhase::Running {
            self.phase = SessionPhase::Idle;
        }
    }
}
