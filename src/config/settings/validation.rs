// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::llm::providers::common::CLOUD_PROVIDERS;

use super::Settings;

/// A provider that is enabled and has what it needs to be constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledProvider {
    pub name: String,
    /// Absent for providers that need no credentials
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Source of truth for which providers can be used
pub trait ProviderCatalog: Send + Sync {
    /// Whether the provider has a usable configuration
    fn is_provider_configured(&self, name: &str) -> bool;

    /// Providers that are both configured and enabled, local first
    fn enabled_providers(&self) -> Vec<EnabledProvider>;
}

impl Settings {
    /// All provider names the crate can construct
    pub fn supported_providers() -> Vec<&'static str> {
        let mut names = vec!["ollama"];
        names.extend_from_slice(CLOUD_PROVIDERS);
        names
    }

    /// Environment variable consulted for a provider's key
    pub fn api_key_env(&self, name: &str) -> String {
        self.providers
            .cloud
            .get(name)
            .and_then(|c| c.api_key_env.clone())
            .unwrap_or_else(|| format!("{}_API_KEY", name.to_uppercase()))
    }

    /// Get the API key for a hosted provider, checking env var first.
    pub fn api_key(&self, name: &str) -> Option<String> {
        // Priority: env var > config file.
        std::env::var(self.api_key_env(name))
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| {
                self.providers
                    .cloud
                    .get(name)
                    .and_then(|c| c.api_key.clone())
                    .filter(|key| !key.is_empty())
            })
    }
}

impl ProviderCatalog for Settings {
    fn is_provider_configured(&self, name: &str) -> bool {
        match name {
            "ollama" => true,
            other if CLOUD_PROVIDERS.contains(&other) => self.api_key(other).is_some(),
            _ => false,
        }
    }

    fn enabled_providers(&self) -> Vec<EnabledProvider> {
        let mut enabled = Vec::new();
        if self.providers.ollama.enabled {
            enabled.push(EnabledProvider {
                name: "ollama".to_string(),
                api_key: None,
                base_url: Some(self.providers.ollama.base_url.clone()),
            });
        }
        for name in CLOUD_PROVIDERS {
            let config = self.cloud_provider(name);
            if !config.enabled {
                continue;
            }
            if let Some(api_key) = self.api_key(name) {
                enabled.push(EnabledProvider {
                    name: name.to_string(),
                    api_key: Some(api_key),
                    base_url: config.base_url,
                });
            }
        }
        enabled
    }
}
