// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for roundtable
//!
//! Handles loading and saving settings from ~/.roundtable/settings.json

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::llm::providers::ollama::DEFAULT_OLLAMA_URL;

mod io;
mod validation;

pub use validation::{EnabledProvider, ProviderCatalog};

/// Main settings structure, stored in ~/.roundtable/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Live session tuning
    #[serde(default)]
    pub session: SessionConfig,

    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Configuration for chat providers
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProvidersConfig {
    /// Local Ollama daemon
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Hosted providers keyed by name ("anthropic", "groq", ...)
    #[serde(default)]
    pub cloud: BTreeMap<String, CloudProviderConfig>,
}

/// Ollama-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Register the local provider at startup
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Context window requested for local models
    #[serde(default = "default_context_tokens")]
    pub context_tokens: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            enabled: true,
            context_tokens: default_context_tokens(),
        }
    }
}

/// Configuration for a hosted provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudProviderConfig {
    /// API key (can also be set via environment variable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the key; defaults to `<NAME>_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Custom base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Register the provider when a key is available
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CloudProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            base_url: None,
            enabled: true,
        }
    }
}

/// Timing and limits for live sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Interval between coalesced chunk deliveries
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// How often a paused turn checks whether it may continue
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,

    /// Response length cap sent to every provider
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Upper bound for a session's autonomy rounds
    #[serde(default = "default_max_autonomy_rounds")]
    pub max_autonomy_rounds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            pause_poll_ms: default_pause_poll_ms(),
            max_output_tokens: default_max_output_tokens(),
            max_autonomy_rounds: default_max_autonomy_rounds(),
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageConfig {
    /// SQLite database file; defaults to ~/.roundtable/roundtable.db
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_ollama_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_context_tokens() -> u32 {
    8192
}

fn default_flush_interval_ms() -> u64 {
    25
}

fn default_pause_poll_ms() -> u64 {
    100
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_max_autonomy_rounds() -> u32 {
    999
}

impl Settings {
    /// Configuration for a hosted provider, falling back to defaults
    pub fn cloud_provider(&self, name: &str) -> CloudProviderConfig {
        self.providers.cloud.get(name).cloned().unwrap_or_default()
    }

    /// Database path, honoring the configured override
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::roundtable_home().join("roundtable.db"))
    }
}
