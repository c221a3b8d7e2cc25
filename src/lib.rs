// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Roundtable - several language models in one live conversation.
//!
//! Architecture highlights:
//! - `llm`: provider abstraction, streaming clients for Ollama, Anthropic,
//!   Gemini and the OpenAI-compatible family, and the model-id registry
//! - `orchestrator`: roster policy, mention routing, role classification and
//!   per-agent prompt construction
//! - `session`: the control loop and the streaming run driver with pause,
//!   resume, stop and autonomy checkpoints
//! - `store`: session and turn persistence (SQLite or in memory)
//! - `transport`: JSON-lines client protocol over stdio

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod transport;

pub use error::{ProviderError, Result, RoundtableError};
