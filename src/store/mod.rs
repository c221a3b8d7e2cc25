// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation persistence
//!
//! Sessions own a roster policy and an append-only list of turns.
//! [`SqliteStore`] is the durable backend; [`MemoryStore`] keeps
//! everything in process.

mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::orchestrator::{ConversationTurn, RosterPolicy};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage for sessions, their rosters and their turns
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a session and return its id
    async fn create_session(&self, name: &str, policy: &RosterPolicy) -> Result<String>;

    /// Append one turn to a session's history
    async fn append_message(&self, session_id: &str, turn: &ConversationTurn) -> Result<()>;

    /// All turns of a session in append order
    async fn load_history(&self, session_id: &str) -> Result<Vec<ConversationTurn>>;

    /// The session's roster, or `None` when the session does not exist
    async fn load_roster(&self, session_id: &str) -> Result<Option<RosterPolicy>>;

    /// Replace the session's roster
    async fn save_roster(&self, session_id: &str, policy: &RosterPolicy) -> Result<()>;
}
