// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::ConversationStore;
use crate::error::{Result, RoundtableError};
use crate::orchestrator::{ConversationTurn, RosterPolicy};

#[derive(Debug, Default)]
struct StoredSession {
    policy: RosterPolicy,
    turns: Vec<ConversationTurn>,
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session under a chosen id
    pub fn insert_session(&self, session_id: impl Into<String>, policy: RosterPolicy) {
        self.sessions().insert(
            session_id.into(),
            StoredSession {
                policy,
                turns: Vec::new(),
            },
        );
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, StoredSession>> {
        self.sessions.lock().unwrap_or_else(|p| {
            tracing::warn!(target: "roundtable.store", "memory store lock was poisoned, recovering");
            p.into_inner()
        })
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_session(&self, _name: &str, policy: &RosterPolicy) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.insert_session(id.clone(), policy.clone());
        Ok(id)
    }

    async fn append_message(&self, session_id: &str, turn: &ConversationTurn) -> Result<()> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| RoundtableError::SessionNotFound(session_id.to_string()))?;
        session.turns.push(turn.clone());
        Ok(())
    }

    async fn load_history(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .sessions()
            .get(session_id)
            .map(|s| s.turns.clone())
            .unwrap_or_default())
    }

    async fn load_roster(&self, session_id: &str) -> Result<Option<RosterPolicy>> {
        Ok(self.sessions().get(session_id).map(|s| s.policy.clone()))
    }

    async fn save_roster(&self, session_id: &str, policy: &RosterPolicy) -> Result<()> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| RoundtableError::SessionNotFound(session_id.to_string()))?;
        session.policy = policy.clone();
        Ok(())
    }
}
