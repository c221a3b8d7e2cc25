// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat provider trait and related types
//!
//! Defines the abstraction layer over the different chat backends. A new
//! backend is added by implementing [`ChatProvider`] and registering it with
//! the [`ProviderRegistry`](crate::llm::registry::ProviderRegistry).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::message::{ChatMessage, TokenDelta};

/// Callback receiving normalized deltas as they are decoded
pub type DeltaCallback<'a> = &'a mut (dyn FnMut(TokenDelta) + Send);

/// Main trait for chat providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Get the provider name (e.g., "anthropic", "ollama")
    fn name(&self) -> &str;

    /// List the models this provider can serve, in `"<provider>:<model>"` form
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    /// Check if a model id belongs to this provider.
    ///
    /// The prefixed form `"<provider>:<model>"` is always accepted, even for
    /// models missing from the catalog.
    fn supports_model(&self, model: &str) -> bool;

    /// Stream a chat completion.
    ///
    /// Deltas are pushed through `on_delta` as they arrive; on success the
    /// last delta delivered has `is_final` set. Cancelling `cancel` aborts the
    /// in-flight request with [`ProviderError::Cancelled`].
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_delta: DeltaCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;
}

/// Information about a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier, prefixed with the provider name
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Provider that serves the model
    pub provider: String,

    /// On-disk size for local models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ModelInfo {
    /// Catalog entry for a model served by `provider`
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            id: format!("{}:{}", provider, model),
            name: model.to_string(),
            provider: provider.to_string(),
            size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_info_new_prefixes_id() {
        let info = ModelInfo::new("gemini", "gemini-2.5-pro");
        assert_eq!(info.id, "gemini:gemini-2.5-pro");
        assert_eq!(info.name, "gemini-2.5-pro");
        assert_eq!(info.provider, "gemini");
        assert!(info.size.is_none());
    }

    #[test]
    fn test_model_info_serialization_skips_size() {
        let info = ModelInfo::new("openai", "gpt-4o");
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("size"));
        assert!(json.contains("\"id\":\"openai:gpt-4o\""));
    }
}
