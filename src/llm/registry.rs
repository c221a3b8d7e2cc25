// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider registry
//!
//! Holds the enabled providers for a process and routes each model id to the
//! single provider that claims it. The registry is an owned value shared via
//! `Arc`; it is only mutated through [`ProviderRegistry::register`] and
//! [`ProviderRegistry::unregister`].

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::message::ChatMessage;
use crate::llm::provider::{ChatProvider, DeltaCallback, ModelInfo};

/// Registry of enabled providers, keyed by provider name
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<BTreeMap<String, Arc<dyn ChatProvider>>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<dyn ChatProvider>>> {
        self.providers.read().unwrap_or_else(|poisoned| {
            tracing::warn!(target: "roundtable.registry", "registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<dyn ChatProvider>>> {
        self.providers.write().unwrap_or_else(|poisoned| {
            tracing::warn!(target: "roundtable.registry", "registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Add a provider, replacing any provider registered under the same name
    pub fn register(&self, provider: Arc<dyn ChatProvider>) {
        let name = provider.name().to_string();
        tracing::debug!(target: "roundtable.registry", provider = %name, "registering provider");
        if self.write().insert(name.clone(), provider).is_some() {
            tracing::info!(target: "roundtable.registry", provider = %name, "replaced existing provider");
        }
    }

    /// Remove a provider by name. Returns true if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.write().remove(name).is_some();
        tracing::debug!(target: "roundtable.registry", provider = name, removed, "unregistering provider");
        removed
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ChatProvider>> {
        self.read().get(name).cloned()
    }

    /// Names of all registered providers, sorted
    pub fn provider_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Whether no provider is registered
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn claimants(&self, model: &str) -> Vec<Arc<dyn ChatProvider>> {
        self.read()
            .values()
            .filter(|p| p.supports_model(model))
            .cloned()
            .collect()
    }

    /// Find the provider that owns a model id.
    ///
    /// Returns `None` when no provider claims the id, or when more than one
    /// does (an ambiguous configuration).
    pub fn resolve(&self, model: &str) -> Option<Arc<dyn ChatProvider>> {
        let mut claimants = self.claimants(model);
        if claimants.len() == 1 {
            claimants.pop()
        } else {
            None
        }
    }

    fn resolve_strict(&self, model: &str) -> Result<Arc<dyn ChatProvider>, ProviderError> {
        let mut claimants = self.claimants(model);
        match claimants.len() {
            0 => Err(ProviderError::Configuration(format!(
                "no provider found for model: {}",
                model
            ))),
            1 => claimants.pop().ok_or_else(|| {
                ProviderError::Configuration(format!("no provider found for model: {}", model))
            }),
            _ => {
                let names: Vec<&str> = claimants.iter().map(|p| p.name()).collect();
                Err(ProviderError::Configuration(format!(
                    "model {} is claimed by multiple providers: {}",
                    model,
                    names.join(", ")
                )))
            }
        }
    }

    /// Resolve the model's provider and stream a chat through it
    pub async fn dispatch(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_delta: DeltaCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let provider = self.resolve_strict(model).inspect_err(|e| {
            tracing::warn!(target: "roundtable.registry", model, error = %e, "dispatch failed");
        })?;
        tracing::debug!(target: "roundtable.registry", model, provider = provider.name(), "dispatching");
        provider.stream_chat(model, messages, on_delta, cancel).await
    }

    /// Aggregate the catalogs of every provider, skipping providers that fail
    pub async fn list_all_models(&self) -> Vec<ModelInfo> {
        let providers: Vec<Arc<dyn ChatProvider>> = self.read().values().cloned().collect();
        let mut models = Vec::new();
        for provider in providers {
            match provider.list_models().await {
                Ok(mut list) => models.append(&mut list),
                Err(e) => {
                    tracing::warn!(
                        target: "roundtable.registry",
                        provider = provider.name(),
                        error = %e,
                        "failed to list models"
                    );
                }
            }
        }
        models
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::TokenDelta;
    use crate::llm::mock_provider::{MockProvider, MockStep};

    fn registry_with(providers: Vec<MockProvider>) -> ProviderRegistry {
        let registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(Arc::new(provider));
        }
        registry
    }

    #[test]
    fn test_register_and_get() {
        let registry = registry_with(vec![MockProvider::named("alpha", &["a-1"])]);
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("beta").is_none());
        assert_eq!(registry.provider_names(), vec!["alpha"]);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = registry_with(vec![
            MockProvider::named("alpha", &["a-1"]),
            MockProvider::named("alpha", &["a-2"]),
        ]);
        assert_eq!(registry.provider_names().len(), 1);
        assert!(registry.resolve("a-2").is_some());
        assert!(registry.resolve("a-1").is_none());
    }

    #[test]
    fn test_unregister() {
        let registry = registry_with(vec![MockProvider::named("alpha", &["a-1"])]);
        assert!(registry.unregister("alpha"));
        assert!(!registry.unregister("alpha"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_single_claimant() {
        let registry = registry_with(vec![
            MockProvider::named("alpha", &["a-1"]),
            MockProvider::named("beta", &["b-1"]),
        ]);
        let provider = registry.resolve("b-1").unwrap();
        assert_eq!(provider.name(), "beta");
        assert!(registry.resolve("beta:anything").is_some());
    }

    #[test]
    fn test_resolve_ambiguous_is_none() {
        let registry = registry_with(vec![
            MockProvider::named("alpha", &["shared"]),
            MockProvider::named("beta", &["shared"]),
        ]);
        assert!(registry.resolve("shared").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_model_names_it() {
        let registry = registry_with(vec![MockProvider::named("alpha", &["a-1"])]);
        let mut on_delta = |_: TokenDelta| {};
        let err = registry
            .dispatch("mystery-model", &[], &mut on_delta, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(&err, ProviderError::Configuration(m) if m.contains("mystery-model")));
    }

    #[tokio::test]
    async fn test_dispatch_ambiguous_lists_claimants() {
        let registry = registry_with(vec![
            MockProvider::named("alpha", &["shared"]),
            MockProvider::named("beta", &["shared"]),
        ]);
        let mut on_delta = |_: TokenDelta| {};
        let err = registry
            .dispatch("shared", &[], &mut on_delta, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ProviderError::Configuration(message) => {
                assert!(message.contains("alpha"));
                assert!(message.contains("beta"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_delegates() {
        let provider = MockProvider::named("alpha", &["a-1"]).with_steps(vec![
            MockStep::Text("Hi".to_string()),
            MockStep::Finish(2),
        ]);
        let registry = registry_with(vec![provider]);

        let mut deltas = Vec::new();
        let mut on_delta = |d: TokenDelta| deltas.push(d);
        registry
            .dispatch("a-1", &[ChatMessage::user("hello")], &mut on_delta, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].text, "Hi");
        assert!(deltas[1].is_final);
    }

    #[tokio::test]
    async fn test_list_all_models_skips_failures() {
        let registry = registry_with(vec![
            MockProvider::named("alpha", &["a-1", "a-2"]),
            MockProvider::named("beta", &["b-1"]).with_list_error(),
        ]);
        let models = registry.list_all_models().await;
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha:a-1", "alpha:a-2"]);
    }
}
