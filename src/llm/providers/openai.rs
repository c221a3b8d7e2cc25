// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! OpenAI-compatible chat completions provider
//!
//! One client type serves every backend that speaks the `/chat/completions`
//! streaming dialect. Each backend is described by a [`ProviderPreset`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::message::{ChatMessage, TokenDelta};
use crate::llm::provider::{ChatProvider, DeltaCallback, ModelInfo};
use crate::llm::providers::common::{
    check_status, drive_lines, has_provider_prefix, parse_http_error, send_with_cancel, sse_data,
    strip_provider_prefix, Decoded, LineDecoder,
};

/// Static description of an OpenAI-compatible backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub display_name: &'static str,
    pub base_url: &'static str,
    pub models: &'static [&'static str],
}

pub const OPENAI: ProviderPreset = ProviderPreset {
    name: "openai",
    display_name: "OpenAI",
    base_url: "https://api.openai.com/v1",
    models: &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"],
};

pub const DEEPSEEK: ProviderPreset = ProviderPreset {
    name: "deepseek",
    display_name: "DeepSeek",
    base_url: "https://api.deepseek.com",
    models: &["deepseek-chat", "deepseek-coder"],
};

pub const GROQ: ProviderPreset = ProviderPreset {
    name: "groq",
    display_name: "Groq",
    base_url: "https://api.groq.com/openai/v1",
    models: &[
        "llama-3.3-70b-versatile",
        "llama-3.1-8b-instant",
        "mixtral-8x7b-32768",
        "gemma2-9b-it",
    ],
};

pub const TOGETHER: ProviderPreset = ProviderPreset {
    name: "together",
    display_name: "Together AI",
    base_url: "https://api.together.xyz/v1",
    models: &[
        "meta-llama/Llama-3.3-70B-Instruct-Turbo",
        "meta-llama/Llama-3.2-3B-Instruct-Turbo",
        "mistralai/Mixtral-8x7B-Instruct-v0.1",
    ],
};

pub const OPENROUTER: ProviderPreset = ProviderPreset {
    name: "openrouter",
    display_name: "OpenRouter",
    base_url: "https://openrouter.ai/api/v1",
    models: &[
        "openai/gpt-4o",
        "anthropic/claude-3.5-sonnet",
        "google/gemini-pro-1.5",
        "meta-llama/llama-3.3-70b-instruct",
    ],
};

/// Every OpenAI-compatible backend known to the crate
/// Referer sent to OpenRouter for app attribution
pub const OPENROUTER_SITE_URL: &str = "http://localhost";

pub const PRESETS: &[ProviderPreset] = &[OPENAI, DEEPSEEK, GROQ, TOGETHER, OPENROUTER];

/// Look up a preset by provider name
pub fn preset(name: &str) -> Option<ProviderPreset> {
    PRESETS.iter().copied().find(|p| p.name == name)
}

/// OpenAI-compatible provider
pub struct OpenAiCompatibleProvider {
    client: Client,
    preset: ProviderPreset,
    api_key: String,
    base_url: String,
    max_output_tokens: u32,
    /// Optional app URL and name for OpenRouter rankings
    site_url: Option<String>,
    site_name: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Create a provider for a preset with its default base URL
    pub fn new(preset: ProviderPreset, api_key: impl Into<String>) -> Self {
        Self::with_base_url(preset, api_key, preset.base_url)
    }

    /// Create with a custom base URL
    pub fn with_base_url(
        preset: ProviderPreset,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            preset,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_output_tokens: 4096,
            site_url: None,
            site_name: None,
        }
    }

    /// Override the response length cap
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Set the app URL sent as `HTTP-Referer`
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    /// Set the app name sent as `X-Title`
    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = Some(site_name.into());
        self
    }

    /// Human-readable backend name
    pub fn display_name(&self) -> &'static str {
        self.preset.display_name
    }

    fn build_request(&self, model: &str, messages: &[ChatMessage]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: strip_provider_prefix(model, self.preset.name).to_string(),
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.as_str().to_string(),
                    content: m.text.clone(),
                })
                .collect(),
            stream: true,
            max_tokens: self.max_output_tokens,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        self.preset.name
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(self
            .preset
            .models
            .iter()
            .map(|m| ModelInfo::new(self.preset.name, m))
            .collect())
    }

    fn supports_model(&self, model: &str) -> bool {
        has_provider_prefix(model, self.preset.name) || self.preset.models.contains(&model)
    }

    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_delta: DeltaCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(model, messages);

        tracing::debug!(
            target: "roundtable.provider",
            provider = self.preset.name,
            model = %body.model,
            messages = body.messages.len(),
            "starting stream"
        );

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("Content-Type", "application/json");
        if let Some(ref site_url) = self.site_url {
            request = request.header("HTTP-Referer", site_url);
        }
        if let Some(ref site_name) = self.site_name {
            request = request.header("X-Title", site_name);
        }
        let request = request.json(&body);

        let response = send_with_cancel(request, cancel, ProviderError::from).await?;
        let response = check_status(response, parse_http_error).await?;

        drive_lines(
            self.preset.name,
            response,
            SseDecoder::default(),
            on_delta,
            cancel,
        )
        .await
    }
}

/// Decodes chat-completion chunks
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    total_tokens: u64,
}

impl LineDecoder for SseDecoder {
    fn decode_line(&mut self, line: &str) -> Decoded {
        let Some(data) = sse_data(line) else {
            return Decoded::Skip;
        };
        if data == "[DONE]" {
            return Decoded::Delta(TokenDelta::finished("", self.total_tokens));
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(target: "roundtable.provider", error = %e, "skipping malformed chunk");
                return Decoded::Skip;
            }
        };

        if let Some(error) = chunk.error {
            return Decoded::Failed(ProviderError::from_status(
                error
                    .code
                    .and_then(|c| c.as_u64())
                    .and_then(|c| u16::try_from(c).ok())
                    .unwrap_or(500),
                error.message,
            ));
        }

        if let Some(tokens) = chunk.usage.and_then(|u| u.total_tokens) {
            self.total_tokens = tokens;
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Decoded::Skip;
        };
        let text = choice.delta.and_then(|d| d.content).unwrap_or_default();

        if choice.finish_reason.is_some() {
            Decoded::Delta(TokenDelta::finished(text, self.total_tokens))
        } else if text.is_empty() {
            Decoded::Skip
        } else {
            Decoded::Delta(TokenDelta::text(text, self.total_tokens))
        }
    }
}

// Chat completions API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    stream: bool,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    /// Numeric on most backends, a string slug on some
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}
