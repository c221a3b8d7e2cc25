// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Live sessions
//!
//! A [`Session`] is one client connection to one stored conversation. Its
//! control loop handles commands serially while each user message runs as
//! its own task, so pause and stop stay responsive during generation.

pub mod controller;
pub mod errors;
pub mod protocol;
pub mod sink;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::{Result, RoundtableError};
use crate::llm::ProviderRegistry;
use crate::orchestrator::{self, ConversationOrchestrator, SessionPhase, SharedOrchestrator};
use crate::store::ConversationStore;

pub use controller::{RunControl, SessionStreamController, StreamTuning, TurnOutcome, STOPPED_MARKER};
pub use protocol::{ClientMessage, ServerEvent};
pub use sink::{ChannelSink, EventSink, RecordingSink};

struct ActiveRun {
    control: Arc<RunControl>,
    handle: JoinHandle<()>,
}

impl ActiveRun {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// One client's view of a stored conversation
pub struct Session {
    session_id: String,
    store: Arc<dyn ConversationStore>,
    orchestrator: SharedOrchestrator,
    controller: Arc<SessionStreamController>,
    sink: Arc<dyn EventSink>,
    max_autonomy_rounds: u32,
    active: Option<ActiveRun>,
}

impl Session {
    /// Load a session and announce it with `ready`.
    ///
    /// An unknown id is reported to the client as an error event and
    /// returned as [`RoundtableError::SessionNotFound`].
    pub async fn open(
        session_id: &str,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn ConversationStore>,
        sink: Arc<dyn EventSink>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let Some(policy) = store.load_roster(session_id).await? else {
            tracing::warn!(target: "roundtable.session", session = session_id, "session not found");
            sink.emit(ServerEvent::error("Session not found"));
            return Err(RoundtableError::SessionNotFound(session_id.to_string()));
        };
        let history = store.load_history(session_id).await?;
        let policy = policy.normalized(config.max_autonomy_rounds);

        tracing::info!(
            target: "roundtable.session",
            session = session_id,
            agents = policy.len(),
            turns = history.len(),
            "session opened"
        );

        let orchestrator = ConversationOrchestrator::new(session_id, policy, history).shared();
        let controller = Arc::new(SessionStreamController::new(
            session_id,
            registry,
            orchestrator.clone(),
            store.clone(),
            sink.clone(),
            StreamTuning::from(config),
        ));

        sink.emit(ServerEvent::Ready);

        Ok(Self {
            session_id: session_id.to_string(),
            store,
            orchestrator,
            controller,
            sink,
            max_autonomy_rounds: config.max_autonomy_rounds,
            active: None,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn orchestrator(&self) -> &SharedOrchestrator {
        &self.orchestrator
    }

    pub fn phase(&self) -> SessionPhase {
        orchestrator::lock(&self.orchestrator).phase()
    }

    /// Whether a run task is still going, parked checkpoints included
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(ActiveRun::is_live)
    }

    /// Process inbound commands until the channel closes, then stop any run
    pub async fn run(mut self, mut inbound: mpsc::UnboundedReceiver<ClientMessage>) {
        while let Some(message) = inbound.recv().await {
            self.handle(message).await;
        }
        tracing::info!(target: "roundtable.session", session = %self.session_id, "client disconnected");
        self.shutdown().await;
    }

    /// Apply one command
    pub async fn handle(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::UserMessage {
                content,
                mentioned_models,
            } => self.start_run(content, mentioned_models).await,
            ClientMessage::Pause => {
                if let Some(run) = &self.active {
                    run.control.pause();
                }
                orchestrator::lock(&self.orchestrator).pause();
                self.sink.emit(ServerEvent::Paused);
            }
            ClientMessage::Resume => {
                if let Some(run) = &self.active {
                    run.control.resume();
                }
                let live = self.is_running();
                orchestrator::lock(&self.orchestrator).resume(live);
                self.sink.emit(ServerEvent::Resumed);
            }
            ClientMessage::Stop => {
                if let Some(run) = &self.active {
                    run.control.stop();
                }
                orchestrator::lock(&self.orchestrator).stop();
                self.sink.emit(ServerEvent::Stopped);
            }
            ClientMessage::UpdateConfig => self.reload_policy().await,
        }
    }

    async fn start_run(&mut self, content: String, mentions: Vec<String>) {
        self.stop_active().await;

        let control = Arc::new(RunControl::new());
        let policy = {
            let mut orch = orchestrator::lock(&self.orchestrator);
            orch.begin_run();
            orch.policy().clone()
        };

        let controller = Arc::clone(&self.controller);
        let run_control = Arc::clone(&control);
        let handle = tokio::spawn(async move {
            controller
                .run_utterance(&run_control, &policy, &content, &mentions)
                .await;
        });
        self.active = Some(ActiveRun { control, handle });
    }

    async fn reload_policy(&mut self) {
        match self.store.load_roster(&self.session_id).await {
            Ok(Some(policy)) => {
                let policy = policy.normalized(self.max_autonomy_rounds);
                orchestrator::lock(&self.orchestrator).set_policy(policy);
            }
            Ok(None) => {
                tracing::warn!(target: "roundtable.session", session = %self.session_id, "session vanished from store");
            }
            Err(e) => {
                tracing::warn!(target: "roundtable.session", session = %self.session_id, error = %e, "failed to reload roster");
            }
        }
    }

    /// Stop the current run, if any, and wait for it to wind down
    async fn stop_active(&mut self) {
        let Some(run) = self.active.take() else {
            return;
        };
        if run.is_live() {
            tracing::debug!(target: "roundtable.session", session = %self.session_id, "stopping active run");
            run.control.stop();
            orchestrator::lock(&self.orchestrator).stop();
        }
        if let Err(e) = run.handle.await {
            tracing::warn!(target: "roundtable.session", session = %self.session_id, error = %e, "run task failed");
        }
    }

    /// Wait for the current run to finish on its own
    pub async fn wait_for_run(&mut self) {
        if let Some(run) = self.active.take() {
            if let Err(e) = run.handle.await {
                tracing::warn!(target: "roundtable.session", session = %self.session_id, error = %e, "run task failed");
            }
        }
    }

    /// Stop any active run
    pub async fn shutdown(&mut self) {
        self.stop_active().await;
    }
}
