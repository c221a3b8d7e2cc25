// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Live run driver
//!
//! A run answers one user message: round 0 with the selected agents, then
//! any autonomy rounds with the whole roster, each followed by a checkpoint
//! pause. Turns within a run are strictly sequential.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::errors::user_facing_message;
use super::protocol::ServerEvent;
use super::sink::EventSink;
use crate::config::SessionConfig;
use crate::error::ProviderError;
use crate::llm::message::TokenDelta;
use crate::llm::ProviderRegistry;
use crate::orchestrator::{self, AgentConfig, ConversationTurn, RosterPolicy, SharedOrchestrator};
use crate::store::ConversationStore;

/// Suffix committed after partial text when the user stops a turn
pub const STOPPED_MARKER: &str = "\n\n*[Response stopped by user]*";

/// Control flags for one run. Replaced at the start of every run.
#[derive(Debug, Default)]
pub struct RunControl {
    stopped: AtomicBool,
    paused: AtomicBool,
    cancel: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the run and abort any in-flight provider call
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Block while paused. Returns false if the run was stopped.
    pub async fn wait_while_paused(&self, poll: Duration) -> bool {
        while self.is_paused() && !self.is_stopped() {
            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = self.cancel.cancelled() => break,
            }
        }
        !self.is_stopped()
    }
}

/// Timing knobs for streaming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTuning {
    pub flush_interval: Duration,
    pub pause_poll: Duration,
}

impl Default for StreamTuning {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for StreamTuning {
    fn from(config: &SessionConfig) -> Self {
        Self {
            flush_interval: Duration::from_millis(config.flush_interval_ms.max(1)),
            pause_poll: Duration::from_millis(config.pause_poll_ms.max(1)),
        }
    }
}

/// Tokens per second over the whole turn, paused time included
pub fn tokens_per_second(tokens: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if tokens == 0 || secs <= 0.0 {
        return 0.0;
    }
    tokens as f64 / secs
}

/// What a turn left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Text was committed to history
    Committed { tokens: u64, stopped: bool },
    /// The provider failed before producing text
    Failed,
    /// Stopped before any text arrived
    Discarded,
}

/// Drives runs for one session
pub struct SessionStreamController {
    session_id: String,
    registry: Arc<ProviderRegistry>,
    orchestrator: SharedOrchestrator,
    store: Arc<dyn ConversationStore>,
    sink: Arc<dyn EventSink>,
    tuning: StreamTuning,
}

impl SessionStreamController {
    pub fn new(
        session_id: impl Into<String>,
        registry: Arc<ProviderRegistry>,
        orchestrator: SharedOrchestrator,
        store: Arc<dyn ConversationStore>,
        sink: Arc<dyn EventSink>,
        tuning: StreamTuning,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            registry,
            orchestrator,
            store,
            sink,
            tuning,
        }
    }

    pub fn tuning(&self) -> StreamTuning {
        self.tuning
    }

    /// Answer one user message, then run the policy's autonomy rounds.
    ///
    /// `policy` is the snapshot taken when the run began; config updates
    /// during the run do not affect it.
    pub async fn run_utterance(
        &self,
        control: &RunControl,
        policy: &RosterPolicy,
        content: &str,
        explicit_mentions: &[String],
    ) {
        let user_turn = ConversationTurn::user(content);
        let selection = {
            let mut orch = orchestrator::lock(&self.orchestrator);
            orch.append_turn(user_turn.clone());
            orch.select(policy, content, explicit_mentions)
        };
        self.persist(&user_turn).await;

        tracing::info!(
            target: "roundtable.session",
            session = %self.session_id,
            responders = selection.agents.len(),
            autonomy_rounds = policy.autonomy_rounds,
            "run started"
        );

        let mut usage: BTreeMap<String, u64> = policy
            .agents
            .iter()
            .map(|a| (a.display_name.clone(), 0))
            .collect();

        self.sink.emit(ServerEvent::RoundStart { round: 0 });
        self.run_round(control, policy, &selection.agents, &selection.prompt, 0, &mut usage)
            .await;
        self.sink.emit(ServerEvent::RoundEnd { round: 0 });

        let rounds = policy.autonomy_rounds;
        if rounds > 0 && policy.len() >= 2 {
            for round in 1..=rounds {
                if control.is_stopped() {
                    break;
                }
                self.sink.emit(ServerEvent::RoundStart { round });
                self.run_round(control, policy, &policy.agents, "", round, &mut usage)
                    .await;
                self.sink.emit(ServerEvent::RoundEnd { round });
                if control.is_stopped() {
                    break;
                }

                self.checkpoint(control, round);
                if round < rounds && !control.wait_while_paused(self.tuning.pause_poll).await {
                    break;
                }
            }
        }

        orchestrator::lock(&self.orchestrator).end_run();
        self.sink.emit(ServerEvent::TokenUsage { usage });
        tracing::info!(
            target: "roundtable.session",
            session = %self.session_id,
            stopped = control.is_stopped(),
            "run finished"
        );
    }

    async fn run_round(
        &self,
        control: &RunControl,
        policy: &RosterPolicy,
        agents: &[AgentConfig],
        prompt: &str,
        round: u32,
        usage: &mut BTreeMap<String, u64>,
    ) {
        for agent in agents {
            if !control.wait_while_paused(self.tuning.pause_poll).await {
                break;
            }
            let outcome = self
                .run_turn(control, agent, prompt, round, policy.len())
                .await;
            if let TurnOutcome::Committed { tokens, .. } = outcome {
                *usage.entry(agent.display_name.clone()).or_insert(0) += tokens;
            }
        }
    }

    fn checkpoint(&self, control: &RunControl, round: u32) {
        tracing::debug!(target: "roundtable.session", session = %self.session_id, round, "checkpoint");
        control.pause();
        orchestrator::lock(&self.orchestrator).checkpoint();
        self.sink.emit(ServerEvent::Checkpoint { round });
    }

    /// Stream one agent's reply and commit it.
    ///
    /// Events for the turn are `thinking`, then chunks, then exactly one of
    /// `complete` or `error`, except that a turn stopped before any text
    /// arrived emits nothing after `thinking`.
    pub async fn run_turn(
        &self,
        control: &RunControl,
        agent: &AgentConfig,
        prompt: &str,
        round: u32,
        roster_size: usize,
    ) -> TurnOutcome {
        self.sink.emit(ServerEvent::thinking(agent));

        let messages =
            orchestrator::lock(&self.orchestrator).messages_for(agent, roster_size, prompt);
        let started = Instant::now();

        let (tx, mut rx) = mpsc::unbounded_channel::<TokenDelta>();
        let registry = Arc::clone(&self.registry);
        let model = agent.model_ref.clone();
        let cancel = control.cancel_token().clone();
        let call = tokio::spawn(async move {
            let mut on_delta = move |delta: TokenDelta| {
                let _ = tx.send(delta);
            };
            registry
                .dispatch(&model, &messages, &mut on_delta, &cancel)
                .await
        });

        let mut text = String::new();
        let mut pending = String::new();
        let mut tokens = 0u64;

        let mut ticker = tokio::time::interval(self.tuning.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                delta = rx.recv() => {
                    let Some(delta) = delta else { break };
                    if control.is_stopped() {
                        continue;
                    }
                    text.push_str(&delta.text);
                    pending.push_str(&delta.text);
                    tokens = tokens.max(delta.cumulative_tokens);
                    if delta.is_final && !control.is_paused() {
                        self.flush(agent, &mut pending, tokens, started);
                    }
                }
                _ = ticker.tick() => {
                    if !control.is_paused() && !control.is_stopped() {
                        self.flush(agent, &mut pending, tokens, started);
                    }
                }
            }
        }

        let result = match call.await {
            Ok(result) => result,
            Err(e) => Err(ProviderError::MalformedStream(format!(
                "provider task failed: {}",
                e
            ))),
        };

        // Held-back output goes out once the user resumes.
        if control.wait_while_paused(self.tuning.pause_poll).await {
            self.flush(agent, &mut pending, tokens, started);
        }

        let stopped =
            control.is_stopped() || matches!(&result, Err(e) if e.is_cancellation());

        if stopped {
            if text.is_empty() {
                tracing::debug!(
                    target: "roundtable.stream",
                    agent = %agent.short_id,
                    "turn stopped before any output"
                );
                return TurnOutcome::Discarded;
            }
            text.push_str(STOPPED_MARKER);
        } else if let Err(e) = &result {
            tracing::warn!(
                target: "roundtable.stream",
                agent = %agent.short_id,
                model = %agent.model_ref,
                error = %e,
                partial_chars = text.len(),
                "provider call failed"
            );
            if text.is_empty() {
                self.sink.emit(ServerEvent::agent_error(
                    agent,
                    user_facing_message(e, &agent.model_ref),
                ));
                return TurnOutcome::Failed;
            }
        }

        let rate = tokens_per_second(tokens, started.elapsed());
        let turn = ConversationTurn::agent(agent, text.clone(), round, tokens);
        orchestrator::lock(&self.orchestrator).append_turn(turn.clone());
        self.persist(&turn).await;
        self.sink
            .emit(ServerEvent::complete(agent, text, tokens, rate));

        tracing::debug!(
            target: "roundtable.stream",
            agent = %agent.short_id,
            round,
            tokens,
            tokens_per_second = rate,
            stopped,
            "turn committed"
        );
        TurnOutcome::Committed { tokens, stopped }
    }

    fn flush(&self, agent: &AgentConfig, pending: &mut String, tokens: u64, started: Instant) {
        if pending.is_empty() {
            return;
        }
        let content = std::mem::take(pending);
        let rate = tokens_per_second(tokens, started.elapsed());
        self.sink
            .emit(ServerEvent::chunk(agent, content, tokens, rate));
    }

    async fn persist(&self, turn: &ConversationTurn) {
        if let Err(e) = self.store.append_message(&self.session_id, turn).await {
            tracing::warn!(
                target: "roundtable.store",
                session = %self.session_id,
                turn = %turn.id,
                error = %e,
                "failed to persist turn"
            );
        }
    }
}
