// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Anthropic Claude API provider implementation
//!
//! The Messages API takes the system prompt as a top-level field and streams
//! server-sent events. Output token usage arrives in `message_delta`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::message::{split_system, ChatMessage, TokenDelta};
use crate::llm::provider::{ChatProvider, DeltaCallback, ModelInfo};
use crate::llm::providers::common::{
    check_status, drive_lines, error_message, has_provider_prefix, send_with_cancel, sse_data,
    strip_provider_prefix, Decoded, LineDecoder,
};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER_NAME: &str = "anthropic";

/// Models offered in the catalog
pub const MODELS: &[&str] = &[
    "claude-sonnet-4-20250514",
    "claude-opus-4-20250514",
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
];

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    max_output_tokens: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, ANTHROPIC_API_URL)
    }

    /// Create with a custom API root; requests go to `{base_url}/v1/messages`
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_output_tokens: 4096,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    /// Override the response length cap
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    fn build_request(&self, model: &str, messages: &[ChatMessage]) -> AnthropicRequest {
        let (system, turns) = split_system(messages);
        AnthropicRequest {
            model: strip_provider_prefix(model, PROVIDER_NAME).to_string(),
            max_tokens: self.max_output_tokens,
            system,
            messages: turns
                .into_iter()
                .map(|m| AnthropicMessage {
                    role: m.role.as_str().to_string(),
                    content: m.text.clone(),
                })
                .collect(),
            stream: true,
        }
    }

    /// Extract retry-after header value (in seconds)
    fn extract_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    }

    /// Map an Anthropic error type onto the provider taxonomy
    fn classify(error_type: &str, status: u16, message: String) -> ProviderError {
        match error_type {
            "authentication_error" | "permission_error" => ProviderError::Auth(message),
            "rate_limit_error" => ProviderError::RateLimited(message),
            "not_found_error" => ProviderError::NotFound(message),
            _ => ProviderError::from_status(status, message),
        }
    }

    /// Parse an error response
    fn parse_error(status: u16, body: &str, retry_after: Option<u64>) -> ProviderError {
        let error = match serde_json::from_str::<AnthropicError>(body) {
            Ok(parsed) => {
                Self::classify(&parsed.error.error_type, status, parsed.error.message)
            }
            Err(_) => ProviderError::from_status(status, error_message(body)),
        };
        match (error, retry_after) {
            (ProviderError::RateLimited(message), Some(secs)) => {
                ProviderError::RateLimited(format!("{} (retry after {}s)", message, secs))
            }
            (error, _) => error,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(MODELS
            .iter()
            .map(|m| ModelInfo::new(PROVIDER_NAME, m))
            .collect())
    }

    fn supports_model(&self, model: &str) -> bool {
        has_provider_prefix(model, PROVIDER_NAME) || MODELS.contains(&model)
    }

    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_delta: DeltaCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let body = self.build_request(model, messages);
        let url = self.messages_url();

        tracing::debug!(
            target: "roundtable.provider",
            provider = PROVIDER_NAME,
            model = %body.model,
            messages = body.messages.len(),
            "starting stream"
        );

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = send_with_cancel(request, cancel, ProviderError::from).await?;
        let retry_after = Self::extract_retry_after(response.headers());
        let response =
            check_status(response, |status, body| Self::parse_error(status, body, retry_after))
                .await?;

        drive_lines(
            PROVIDER_NAME,
            response,
            SseDecoder::default(),
            on_delta,
            cancel,
        )
        .await
    }
}

/// Decodes the Messages API event stream
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    output_tokens: u64,
}

impl LineDecoder for SseDecoder {
    fn decode_line(&mut self, line: &str) -> Decoded {
        // `event:` lines repeat the `type` field of the data payload
        let Some(data) = sse_data(line) else {
            return Decoded::Skip;
        };
        let event: AnthropicStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(target: "roundtable.provider", provider = PROVIDER_NAME, error = %e, "skipping malformed event");
                return Decoded::Skip;
            }
        };

        match event.event_type.as_str() {
            "content_block_delta" => match event.delta.and_then(|d| d.text) {
                Some(text) if !text.is_empty() => {
                    Decoded::Delta(TokenDelta::text(text, self.output_tokens))
                }
                _ => Decoded::Skip,
            },
            "message_delta" => {
                if let Some(tokens) = event.usage.and_then(|u| u.output_tokens) {
                    self.output_tokens = tokens;
                }
                Decoded::Skip
            }
            "message_stop" => Decoded::Delta(TokenDelta::finished("", self.output_tokens)),
            "error" => {
                let (error_type, message) = event
                    .error
                    .map(|e| (e.error_type, e.message))
                    .unwrap_or_else(|| ("api_error".to_string(), data.to_string()));
                let status = if error_type == "overloaded_error" { 529 } else { 500 };
                Decoded::Failed(AnthropicProvider::classify(&error_type, status, message))
            }
            _ => Decoded::Skip,
        }
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<AnthropicDelta>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default)]
    error: Option<AnthropicErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
