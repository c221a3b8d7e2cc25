// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Google Gemini provider implementation
//!
//! Uses `streamGenerateContent` with `alt=sse`. Assistant turns are sent with
//! the `model` role, the system prompt goes in `systemInstruction`, and usage
//! metadata is repeated on every chunk.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::message::{split_system, ChatMessage, Role, TokenDelta};
use crate::llm::provider::{ChatProvider, DeltaCallback, ModelInfo};
use crate::llm::providers::common::{
    check_status, drive_lines, has_provider_prefix, parse_http_error, send_with_cancel, sse_data,
    strip_provider_prefix, Decoded, LineDecoder,
};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
const PROVIDER_NAME: &str = "gemini";

/// Models offered in the catalog
pub const MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    max_output_tokens: u32,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GEMINI_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_output_tokens: 4096,
        }
    }

    /// Override the response length cap
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.base_url,
            strip_provider_prefix(model, PROVIDER_NAME)
        )
    }

    fn build_request(&self, messages: &[ChatMessage]) -> GeminiRequest {
        let (system, turns) = split_system(messages);
        GeminiRequest {
            contents: turns
                .into_iter()
                .map(|m| GeminiContent {
                    role: match m.role {
                        Role::Assistant => "model".to_string(),
                        _ => "user".to_string(),
                    },
                    parts: vec![GeminiPart {
                        text: m.text.clone(),
                    }],
                })
                .collect(),
            system_instruction: system.map(|text| GeminiSystemInstruction {
                parts: vec![GeminiPart { text }],
            }),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
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
        let url = self.endpoint(model);
        let body = self.build_request(messages);

        tracing::debug!(
            target: "roundtable.provider",
            provider = PROVIDER_NAME,
            url = %url,
            contents = body.contents.len(),
            "starting stream"
        );

        let request = self
            .client
            .post(&url)
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&body);

        let response = send_with_cancel(request, cancel, ProviderError::from).await?;
        let response = check_status(response, parse_http_error).await?;

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

/// Decodes `streamGenerateContent` server-sent events
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    total_tokens: u64,
}

impl LineDecoder for SseDecoder {
    fn decode_line(&mut self, line: &str) -> Decoded {
        let Some(data) = sse_data(line) else {
            return Decoded::Skip;
        };
        let chunk: GeminiStreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(target: "roundtable.provider", provider = PROVIDER_NAME, error = %e, "skipping malformed event");
                return Decoded::Skip;
            }
        };

        if let Some(error) = chunk.error {
            return Decoded::Failed(ProviderError::from_status(error.code, error.message));
        }

        if let Some(tokens) = chunk.usage_metadata.and_then(|u| u.total_token_count) {
            self.total_tokens = tokens;
        }

        let mut text = String::new();
        let mut finished = false;
        if let Some(candidate) = chunk.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    text.push_str(&part.text);
                }
            }
            finished = candidate
                .finish_reason
                .is_some_and(|reason| !reason.is_empty());
        }

        if finished {
            Decoded::Delta(TokenDelta::finished(text, self.total_tokens))
        } else if text.is_empty() {
            Decoded::Skip
        } else {
            Decoded::Delta(TokenDelta::text(text, self.total_tokens))
        }
    }

    /// A clean end of stream counts as completion.
    fn finish(&mut self) -> Option<TokenDelta> {
        Some(TokenDelta::finished("", self.total_tokens))
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}
