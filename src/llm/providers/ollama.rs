// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Ollama local model provider implementation
//!
//! Talks to the local daemon's `/api/chat` endpoint, which streams one JSON
//! object per line. The token count only appears on the closing line.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::message::{ChatMessage, TokenDelta};
use crate::llm::provider::{ChatProvider, DeltaCallback, ModelInfo};
use crate::llm::providers::common::{
    check_status, drive_lines, error_message, has_cloud_prefix, has_provider_prefix,
    send_with_cancel, strip_provider_prefix, Decoded, LineDecoder,
};
use crate::llm::providers::is_cloud_catalog_model;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const PROVIDER_NAME: &str = "ollama";
const NOT_RUNNING: &str = "Ollama is not running. Start the Ollama app or run 'ollama serve'";

/// Ollama local model provider
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    max_output_tokens: u32,
    context_tokens: u32,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default base URL (http://localhost:11434)
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_output_tokens: 4096,
            context_tokens: 8192,
        }
    }

    /// Override generation limits
    pub fn with_limits(mut self, max_output_tokens: u32, context_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.context_tokens = context_tokens;
        self
    }

    /// Check if Ollama is running and reachable
    pub async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => Err(Self::map_send_error(e)),
        }
    }

    fn map_send_error(e: reqwest::Error) -> ProviderError {
        if e.is_connect() {
            ProviderError::Transport(NOT_RUNNING.to_string())
        } else {
            ProviderError::from(e)
        }
    }

    fn build_request(&self, model: &str, messages: &[ChatMessage]) -> OllamaRequest {
        OllamaRequest {
            model: strip_provider_prefix(model, PROVIDER_NAME).to_string(),
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.text.clone(),
                })
                .collect(),
            stream: true,
            options: OllamaOptions {
                num_predict: self.max_output_tokens,
                num_ctx: self.context_tokens,
            },
        }
    }

    /// Parse an error response
    fn parse_error(status: u16, body: &str) -> ProviderError {
        let message = error_message(body);
        if message.contains("model") && message.contains("not found") {
            ProviderError::NotFound(message)
        } else {
            ProviderError::from_status(status, message)
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;
        let response = check_status(response, Self::parse_error).await?;

        let body: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedStream(e.to_string()))?;

        Ok(body
            .models
            .into_iter()
            .map(|m| ModelInfo {
                size: m.size,
                ..ModelInfo::new(PROVIDER_NAME, &m.name)
            })
            .collect())
    }

    /// Anything that is not addressed to a hosted provider is a local model.
    fn supports_model(&self, model: &str) -> bool {
        if has_provider_prefix(model, PROVIDER_NAME) {
            return true;
        }
        !model.is_empty() && !has_cloud_prefix(model) && !is_cloud_catalog_model(model)
    }

    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_delta: DeltaCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_request(model, messages);

        tracing::debug!(
            target: "roundtable.provider",
            provider = PROVIDER_NAME,
            model = %body.model,
            messages = body.messages.len(),
            "starting stream"
        );

        let request = self.client.post(&url).json(&body);
        let response = send_with_cancel(request, cancel, Self::map_send_error).await?;
        let response = check_status(response, Self::parse_error).await?;

        drive_lines(
            PROVIDER_NAME,
            response,
            NdjsonDecoder::default(),
            on_delta,
            cancel,
        )
        .await
    }
}

/// Decodes Ollama's newline-delimited JSON chat stream
#[derive(Debug, Default)]
pub(crate) struct NdjsonDecoder;

impl LineDecoder for NdjsonDecoder {
    fn decode_line(&mut self, line: &str) -> Decoded {
        let chunk: OllamaStreamResponse = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(target: "roundtable.provider", provider = PROVIDER_NAME, error = %e, "skipping malformed line");
                return Decoded::Skip;
            }
        };

        if let Some(error) = chunk.error {
            return Decoded::Failed(ProviderError::Backend {
                status: 200,
                message: error,
            });
        }

        let text = chunk.message.map(|m| m.content).unwrap_or_default();
        let tokens = chunk.eval_count.unwrap_or(0);
        if chunk.done {
            Decoded::Delta(TokenDelta::finished(text, tokens))
        } else if text.is_empty() {
            Decoded::Skip
        } else {
            Decoded::Delta(TokenDelta::text(text, tokens))
        }
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelEntry>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelEntry {
    name: String,
    #[serde(default)]
    size: Option<u64>,
}
