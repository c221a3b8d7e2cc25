// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! User-facing text for failed turns

use crate::error::ProviderError;
use crate::llm::providers::display_name_for;

const MAX_RAW_CHARS: usize = 200;

/// Short message for an error event. The raw error is logged by the caller.
pub fn user_facing_message(err: &ProviderError, model_id: &str) -> String {
    let provider = display_name_for(model_id);
    let raw = err.raw_message();
    let lower = raw.to_lowercase();

    match err {
        ProviderError::Cancelled => "Stopped by user.".to_string(),
        ProviderError::RateLimited(_) => {
            if lower.contains("limit: 0") || lower.contains("limit\":0") {
                format!(
                    "This model has no free tier access on {}. Try a different model or enable billing.",
                    provider
                )
            } else if lower.contains("quota") {
                format!(
                    "Quota exceeded for {}. Wait a bit or check your plan.",
                    provider
                )
            } else {
                format!(
                    "Rate limit reached for {}. Please wait a moment before trying again.",
                    provider
                )
            }
        }
        ProviderError::Auth(_) => {
            if lower.contains("invalid") {
                format!(
                    "Invalid API key for {}. Check the key in your settings.",
                    provider
                )
            } else {
                format!(
                    "Authentication failed for {}. Please verify your API key.",
                    provider
                )
            }
        }
        ProviderError::NotFound(_) => format!(
            "Model not found. The model '{}' may have been deprecated or renamed.",
            model_id
        ),
        ProviderError::Transport(_) => {
            format!("Connection error with {}: {}", provider, truncate(raw))
        }
        ProviderError::Configuration(_) => truncate(raw),
        ProviderError::MalformedStream(_) | ProviderError::Backend { .. } => {
            if lower.contains("credit") && (lower.contains("balance") || lower.contains("low")) {
                format!("{} requires credits. Please add credits with the provider.", provider)
            } else {
                format!("{} error: {}", provider, truncate(raw))
            }
        }
    }
}

fn truncate(raw: &str) -> String {
    if raw.chars().count() <= MAX_RAW_CHARS {
        return raw.to_string();
    }
    let mut cut: String = raw.chars().take(MAX_RAW_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota() {
        let err = ProviderError::RateLimited("You exceeded your current quota".into());
        let msg = user_facing_message(&err, "gemini:gemini-2.5-pro");
        assert!(msg.starts_with("Quota exceeded for Google Gemini"));
    }

    #[test]
    fn test_free_tier() {
        let err = ProviderError::RateLimited("quota exceeded, limit: 0".into());
        let msg = user_facing_message(&err, "gemini:gemini-2.5-pro");
        assert!(msg.contains("no free tier"));
    }

    #[test]
    fn test_rate_limit() {
        let err = ProviderError::RateLimited("slow down".into());
        let msg = user_facing_message(&err, "groq:llama-3.3-70b-versatile");
        assert!(msg.starts_with("Rate limit reached for Groq"));
    }

    #[test]
    fn test_invalid_key() {
        let err = ProviderError::Auth("invalid x-api-key".into());
        let msg = user_facing_message(&err, "anthropic:claude-3-opus-20240229");
        assert!(msg.starts_with("Invalid API key for Anthropic"));
    }

    #[test]
    fn test_not_found_names_model() {
        let err = ProviderError::NotFound("gone".into());
        let msg = user_facing_message(&err, "openai:gpt-3");
        assert!(msg.contains("'openai:gpt-3'"));
    }

    #[test]
    fn test_transport() {
        let err = ProviderError::Transport("Ollama is not running".into());
        let msg = user_facing_message(&err, "llama3.2");
        assert_eq!(msg, "Connection error with Ollama: Ollama is not running");
    }

    #[test]
    fn test_backend_truncated() {
        let err = ProviderError::Backend {
            status: 500,
            message: "x".repeat(500),
        };
        let msg = user_facing_message(&err, "deepseek:deepseek-chat");
        assert!(msg.starts_with("DeepSeek error: "));
        assert!(msg.ends_with("..."));
        assert!(msg.len() < 260);
    }

    #[test]
    fn test_credits() {
        let err = ProviderError::Backend {
            status: 400,
            message: "Your credit balance is too low".into(),
        };
        let msg = user_facing_message(&err, "anthropic:claude-3-opus-20240229");
        assert!(msg.contains("requires credits"));
    }

    #[test]
    fn test_configuration_passes_through() {
        let err = ProviderError::Configuration("no provider found for model: x".into());
        assert_eq!(
            user_facing_message(&err, "x"),
            "no provider found for model: x"
        );
    }
}
