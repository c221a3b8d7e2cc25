// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::ConversationStore;
use crate::error::{Result, RoundtableError};
use crate::orchestrator::{AgentConfig, ConversationTurn, RosterPolicy};

fn parse_uuid_from_db(id: &str, column: usize) -> std::result::Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_datetime_from_db(
    timestamp: &str,
    column: usize,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| RoundtableError::Store(format!("Failed to open database: {}", e)))?;
        tracing::debug!(target: "roundtable.store", path = %path.display(), "opened database");
        Self::with_connection(conn)
    }

    /// A private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| {
            tracing::warn!(target: "roundtable.store", "database lock was poisoned, recovering");
            p.into_inner()
        })
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    roster TEXT NOT NULL,
                    autonomy_rounds INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                    speaker TEXT NOT NULL,
                    speaker_name TEXT,
                    content TEXT NOT NULL,
                    round_number INTEGER NOT NULL,
                    token_count INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);",
            )
            .map_err(|e| RoundtableError::Store(format!("Failed to create schema: {}", e)))?;
        Ok(())
    }

    fn session_exists(conn: &Connection, session_id: &str) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM sessions WHERE id = ?1",
                params![session_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_session(&self, name: &str, policy: &RosterPolicy) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let roster = serde_json::to_string(&policy.agents)?;
        self.conn().execute(
            "INSERT INTO sessions (id, name, roster, autonomy_rounds, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                name,
                roster,
                policy.autonomy_rounds,
                Utc::now().to_rfc3339()
            ],
        )?;
        tracing::info!(target: "roundtable.store", session = %id, name, "session created");
        Ok(id)
    }

    async fn append_message(&self, session_id: &str, turn: &ConversationTurn) -> Result<()> {
        let conn = self.conn();
        if !Self::session_exists(&conn, session_id)? {
            return Err(RoundtableError::SessionNotFound(session_id.to_string()));
        }
        conn.execute(
            "INSERT INTO messages
            (id, session_id, speaker, speaker_name, content, round_number, token_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                turn.id.to_string(),
                session_id,
                &turn.speaker,
                &turn.speaker_name,
                &turn.content,
                turn.round_number,
                turn.token_count as i64,
                turn.timestamp.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn load_history(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, speaker, speaker_name, content, round_number, token_count, created_at
            FROM messages
            WHERE session_id = ?1
            ORDER BY rowid",
        )?;
        let turns = stmt
            .query_map(params![session_id], |row| {
                let id: String = row.get(0)?;
                let token_count: i64 = row.get(5)?;
                let created_at: String = row.get(6)?;
                Ok(ConversationTurn {
                    id: parse_uuid_from_db(&id, 0)?,
                    speaker: row.get(1)?,
                    speaker_name: row.get(2)?,
                    content: row.get(3)?,
                    round_number: row.get(4)?,
                    token_count: token_count.max(0) as u64,
                    timestamp: parse_datetime_from_db(&created_at, 6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    async fn load_roster(&self, session_id: &str) -> Result<Option<RosterPolicy>> {
        let row: Option<(String, u32)> = self
            .conn()
            .query_row(
                "SELECT roster, autonomy_rounds FROM sessions WHERE id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((roster, autonomy_rounds)) = row else {
            return Ok(None);
        };
        let agents: Vec<AgentConfig> = serde_json::from_str(&roster)?;
        Ok(Some(RosterPolicy::new(agents, autonomy_rounds)))
    }

    async fn save_roster(&self, session_id: &str, policy: &RosterPolicy) -> Result<()> {
        let roster = serde_json::to_string(&policy.agents)?;
        let updated = self.conn().execute(
            "UPDATE sessions SET roster = ?1, autonomy_rounds = ?2 WHERE id = ?3",
            params![roster, policy.autonomy_rounds, session_id],
        )?;
        if updated == 0 {
            return Err(RoundtableError::SessionNotFound(session_id.to_string()));
        }
        Ok(())
    }
}
