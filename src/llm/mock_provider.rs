// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock chat provider for testing
//!
//! Plays back scripted streams without making network calls. Each call to
//! `stream_chat` consumes the next script; the last script is reused once the
//! queue is down to one.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::message::{ChatMessage, TokenDelta};
use crate::llm::provider::{ChatProvider, DeltaCallback, ModelInfo};
use crate::llm::providers::common::has_provider_prefix;

/// One scripted action of a mock stream
#[derive(Clone, Debug)]
pub enum MockStep {
    /// Emit a text delta; each text step counts as one token
    Text(String),
    /// Sleep, observing cancellation
    Delay(Duration),
    /// Emit the final delta with this total token count
    Finish(u64),
    /// Fail the call
    Fail(ProviderError),
    /// Block until the cancel token fires
    WaitForCancel,
}

/// A recorded `stream_chat` call
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// A mock chat provider for testing
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    models: Vec<String>,
    scripts: Arc<Mutex<VecDeque<Vec<MockStep>>>>,
    call_count: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<RecordedCall>>>,
    list_error: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockProvider {
    /// Create a mock provider named "mock" serving "mock-model"
    pub fn new() -> Self {
        Self::named("mock", &["mock-model"])
    }

    /// Create a mock provider with a custom name and catalog
    pub fn named(name: impl Into<String>, models: &[&str]) -> Self {
        Self {
            name: name.into(),
            models: models.iter().map(|m| m.to_string()).collect(),
            scripts: Arc::new(Mutex::new(VecDeque::from(vec![vec![
                MockStep::Text("Mock response".to_string()),
                MockStep::Finish(2),
            ]]))),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded: Arc::new(Mutex::new(Vec::new())),
            list_error: false,
        }
    }

    /// Replace all scripts with a single one
    pub fn with_steps(self, steps: Vec<MockStep>) -> Self {
        self.with_scripts(vec![steps])
    }

    /// Queue scripts, one per call (returned in order)
    pub fn with_scripts(self, scripts: Vec<Vec<MockStep>>) -> Self {
        {
            let mut queue = lock(&self.scripts);
            queue.clear();
            queue.extend(scripts);
        }
        self
    }

    /// Reply with the given text as a single delta followed by a final one
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_steps(vec![MockStep::Text(text.into()), MockStep::Finish(1)])
    }

    /// Make `list_models` fail
    pub fn with_list_error(mut self) -> Self {
        self.list_error = true;
        self
    }

    /// Number of `stream_chat` calls made
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Calls made so far
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        lock(&self.recorded).clone()
    }

    fn next_script(&self) -> Vec<MockStep> {
        let mut queue = lock(&self.scripts);
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        if self.list_error {
            return Err(ProviderError::Transport("mock listing failed".to_string()));
        }
        Ok(self
            .models
            .iter()
            .map(|m| ModelInfo::new(&self.name, m))
            .collect())
    }

    fn supports_model(&self, model: &str) -> bool {
        has_provider_prefix(model, &self.name) || self.models.iter().any(|m| m == model)
    }

    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_delta: DeltaCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded).push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
        });

        let mut tokens = 0u64;
        for step in self.next_script() {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            match step {
                MockStep::Text(text) => {
                    tokens += 1;
                    on_delta(TokenDelta::text(text, tokens));
                }
                MockStep::Delay(duration) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        _ = tokio::time::sleep(duration) => {}
                    }
                }
                MockStep::Finish(total) => {
                    on_delta(TokenDelta::finished("", total.max(tokens)));
                    return Ok(());
                }
                MockStep::Fail(err) => return Err(err),
                MockStep::WaitForCancel => {
                    cancel.cancelled().await;
                    return Err(ProviderError::Cancelled);
                }
            }
        }

        Err(ProviderError::MalformedStream(
            "stream ended before completion".to_string(),
        ))
    }
}
