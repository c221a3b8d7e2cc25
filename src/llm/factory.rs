// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider factory for creating chat providers
//!
//! Turns the catalog of enabled providers into a populated registry.

use std::sync::Arc;

use crate::config::{EnabledProvider, ProviderCatalog, Settings};
use crate::error::{Result, RoundtableError};
use crate::llm::provider::ChatProvider;
use crate::llm::providers::{openai, AnthropicProvider, GeminiProvider, OllamaProvider, OpenAiCompatibleProvider};
use crate::llm::registry::ProviderRegistry;

/// Factory for creating chat providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider from its catalog entry
    pub fn create(entry: &EnabledProvider, settings: &Settings) -> Result<Arc<dyn ChatProvider>> {
        let max_output_tokens = settings.session.max_output_tokens;
        let require_key = || {
            entry.api_key.clone().ok_or_else(|| {
                RoundtableError::Config(format!(
                    "No API key found for {}. Set {} or add it to settings.json.",
                    entry.name,
                    settings.api_key_env(&entry.name)
                ))
            })
        };

        let provider: Arc<dyn ChatProvider> = match entry.name.as_str() {
            "ollama" => {
                let base_url = entry
                    .base_url
                    .clone()
                    .unwrap_or_else(|| settings.providers.ollama.base_url.clone());
                Arc::new(
                    OllamaProvider::with_base_url(base_url)
                        .with_limits(max_output_tokens, settings.providers.ollama.context_tokens),
                )
            }
            "anthropic" => {
                let api_key = require_key()?;
                let provider = match entry.base_url {
                    Some(ref base_url) => AnthropicProvider::with_base_url(api_key, base_url),
                    None => AnthropicProvider::new(api_key),
                };
                Arc::new(provider.with_max_output_tokens(max_output_tokens))
            }
            "gemini" => {
                let api_key = require_key()?;
                let provider = match entry.base_url {
                    Some(ref base_url) => GeminiProvider::with_base_url(api_key, base_url),
                    None => GeminiProvider::new(api_key),
                };
                Arc::new(provider.with_max_output_tokens(max_output_tokens))
            }
            other => {
                let preset = openai::preset(other).ok_or_else(|| {
                    RoundtableError::Config(format!("Unknown provider: {}", other))
                })?;
                let api_key = require_key()?;
                let mut provider = match entry.base_url {
                    Some(ref base_url) => {
                        OpenAiCompatibleProvider::with_base_url(preset, api_key, base_url)
                    }
                    None => OpenAiCompatibleProvider::new(preset, api_key),
                }
                .with_max_output_tokens(max_output_tokens);
                if preset == openai::OPENROUTER {
                    provider = provider
                        .with_site_url(openai::OPENROUTER_SITE_URL)
                        .with_site_name("roundtable");
                }
                Arc::new(provider)
            }
        };

        Ok(provider)
    }

    /// Build a registry holding every enabled provider.
    ///
    /// Entries that fail to construct are logged and skipped.
    pub fn build_registry(settings: &Settings) -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        for entry in settings.enabled_providers() {
            match Self::create(&entry, settings) {
                Ok(provider) => registry.register(provider),
                Err(e) => {
                    tracing::warn!(
                        target: "roundtable.registry",
                        provider = %entry.name,
                        error = %e,
                        "skipping provider"
                    );
                }
            }
        }
        registry
    }

    /// Check if a provider is configured (has required credentials)
    pub fn is_configured(provider_name: &str, settings: &Settings) -> bool {
        settings.is_provider_configured(provider_name)
    }
}
