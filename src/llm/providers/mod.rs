// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider implementations
//!
//! - `ollama`: local daemon, newline-delimited JSON
//! - `anthropic`, `gemini`: native server-sent-event APIs
//! - `openai`: every OpenAI-compatible backend via presets

pub mod anthropic;
pub mod common;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::{OpenAiCompatibleProvider, ProviderPreset};

/// True when an unprefixed id appears in a hosted provider's static catalog.
pub fn is_cloud_catalog_model(model: &str) -> bool {
    anthropic::MODELS.contains(&model)
        || gemini::MODELS.contains(&model)
        || openai::PRESETS.iter().any(|p| p.models.contains(&model))
}

/// Human-readable name for a provider, derived from a model id prefix or a
/// provider name.
pub fn display_name_for(model_or_provider: &str) -> &'static str {
    let provider = model_or_provider
        .split(':')
        .next()
        .unwrap_or(model_or_provider);
    match provider {
        "anthropic" => "Anthropic",
        "gemini" => "Google Gemini",
        "ollama" => "Ollama",
        other => openai::preset(other)
            .map(|p| p.display_name)
            .unwrap_or("Ollama"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_cloud_catalog_model() {
        assert!(is_cloud_catalog_model("claude-3-opus-20240229"));
        assert!(is_cloud_catalog_model("gemini-2.5-flash"));
        assert!(is_cloud_catalog_model("deepseek-chat"));
        assert!(!is_cloud_catalog_model("llama3.2:latest"));
    }

    #[test]
    fn test_display_name_for() {
        assert_eq!(display_name_for("anthropic:claude-3-opus-20240229"), "Anthropic");
        assert_eq!(display_name_for("groq:gemma2-9b-it"), "Groq");
        assert_eq!(display_name_for("openrouter"), "OpenRouter");
        assert_eq!(display_name_for("llama3.2:latest"), "Ollama");
    }
}
