// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;
use std::time::Duration;

use roundtable::config::SessionConfig;
use roundtable::error::ProviderError;
use roundtable::llm::message::Role;
use roundtable::llm::mock_provider::{MockProvider, MockStep};
use roundtable::llm::ProviderRegistry;
use roundtable::orchestrator::{self, AgentConfig, AgentRole, RosterPolicy, SessionPhase};
use roundtable::session::{ClientMessage, RecordingSink, ServerEvent, Session, STOPPED_MARKER};
use roundtable::store::{ConversationStore, MemoryStore};

const SESSION: &str = "session-1";

struct Harness {
    session: Session,
    sink: Arc<RecordingSink>,
    store: Arc<MemoryStore>,
}

async fn harness(policy: RosterPolicy, providers: Vec<MockProvider>) -> Harness {
    let registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(Arc::new(provider));
    }
    let store = Arc::new(MemoryStore::new());
    store.insert_session(SESSION, policy);
    let sink = Arc::new(RecordingSink::new());
    let config = SessionConfig {
        flush_interval_ms: 5,
        pause_poll_ms: 5,
        ..SessionConfig::default()
    };
    let session = Session::open(SESSION, Arc::new(registry), store.clone(), sink.clone(), &config)
        .await
        .unwrap();
    Harness {
        session,
        sink,
        store,
    }
}

fn user_message(content: &str) -> ClientMessage {
    ClientMessage::UserMessage {
        content: content.to_string(),
        mentioned_models: Vec::new(),
    }
}

fn chunk_text(events: &[ServerEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::Chunk { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

async fn wait_until(sink: &RecordingSink, condition: impl Fn(&[ServerEvent]) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if condition(&sink.events()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn single_agent(provider: &str, model: &str) -> RosterPolicy {
    let model_ref = format!("{}:{}", provider, model);
    RosterPolicy::new(
        vec![AgentConfig::new(model_ref, "Solo", "solo", AgentRole::General).with_color("blue")],
        0,
    )
}

#[tokio::test]
async fn test_coder_reviewer_autonomy_ends_in_checkpoint() {
    let coder = MockProvider::named("alpha", &["alpha-1"])
        .with_scripts(vec![
            vec![MockStep::Text("fn reverse".into()), MockStep::Finish(3)],
            vec![MockStep::Text("refined".into()), MockStep::Finish(2)],
        ]);
    let reviewer = MockProvider::named("beta", &["beta-1"])
        .with_steps(vec![MockStep::Text("looks good".into()), MockStep::Finish(4)]);
    let policy = RosterPolicy::new(
        vec![
            AgentConfig::new("alpha-1", "Alpha", "alp", AgentRole::Coder),
            AgentConfig::new("beta-1", "Beta", "bet", AgentRole::Reviewer),
        ],
        1,
    );
    let mut h = harness(policy, vec![coder.clone(), reviewer.clone()]).await;

    h.session
        .handle(user_message("write a function to reverse a string"))
        .await;
    h.session.wait_for_run().await;

    let kinds: Vec<&str> = h
        .sink
        .kinds()
        .into_iter()
        .filter(|k| *k != "chunk")
        .collect();
    assert_eq!(
        kinds,
        vec![
            "ready",
            "round_start",
            "thinking",
            "complete",
            "round_end",
            "round_start",
            "thinking",
            "complete",
            "thinking",
            "complete",
            "round_end",
            "checkpoint",
            "token_usage",
        ]
    );

    let events = h.sink.events();
    assert!(events.contains(&ServerEvent::Checkpoint { round: 1 }));
    assert!(!events.iter().any(|e| matches!(e, ServerEvent::RoundStart { round: 2 })));

    assert_eq!(coder.call_count(), 2);
    assert_eq!(reviewer.call_count(), 1);
    assert_eq!(h.session.phase(), SessionPhase::Paused);

    let usage = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::TokenUsage { usage } => Some(usage.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(usage.get("Alpha"), Some(&5));
    assert_eq!(usage.get("Beta"), Some(&4));

    let history = h.store.load_history(SESSION).await.unwrap();
    let speakers: Vec<&str> = history.iter().map(|t| t.speaker.as_str()).collect();
    assert_eq!(speakers, vec!["user", "alp", "alp", "bet"]);
    assert_eq!(history[2].round_number, 1);

    // A resume after the final checkpoint settles the session.
    h.session.handle(ClientMessage::Resume).await;
    assert_eq!(h.session.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn test_autonomy_prompt_comes_from_history() {
    let alpha = MockProvider::named("alpha", &["alpha-1"]).with_response("first thoughts");
    let beta = MockProvider::named("beta", &["beta-1"]).with_response("second thoughts");
    let policy = RosterPolicy::new(
        vec![
            AgentConfig::new("alpha-1", "Alpha", "alp", AgentRole::General),
            AgentConfig::new("beta-1", "Beta", "bet", AgentRole::General),
        ],
        1,
    );
    let mut h = harness(policy, vec![alpha, beta.clone()]).await;

    h.session.handle(user_message("hello there")).await;
    h.session.wait_for_run().await;

    let call = beta.recorded_calls().pop().unwrap();
    let last = call.messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(call
        .messages
        .iter()
        .any(|m| m.text.contains("first thoughts")));
}

#[tokio::test]
async fn test_checkpoint_waits_for_resume_between_rounds() {
    let alpha = MockProvider::named("alpha", &["alpha-1"]).with_response("a");
    let beta = MockProvider::named("beta", &["beta-1"]).with_response("b");
    let policy = RosterPolicy::new(
        vec![
            AgentConfig::new("alpha-1", "Alpha", "alp", AgentRole::General),
            AgentConfig::new("beta-1", "Beta", "bet", AgentRole::General),
        ],
        2,
    );
    let mut h = harness(policy, vec![alpha, beta]).await;

    h.session.handle(user_message("hi")).await;
    wait_until(&h.sink, |events| {
        events.contains(&ServerEvent::Checkpoint { round: 1 })
    })
    .await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!h
        .sink
        .events()
        .contains(&ServerEvent::RoundStart { round: 2 }));
    assert!(h.session.is_running());

    h.session.handle(ClientMessage::Resume).await;
    h.session.wait_for_run().await;

    let events = h.sink.events();
    assert!(events.contains(&ServerEvent::RoundStart { round: 2 }));
    assert!(events.contains(&ServerEvent::Checkpoint { round: 2 }));
    assert!(!events.contains(&ServerEvent::RoundStart { round: 3 }));
}

#[tokio::test]
async fn test_stop_mid_stream_commits_partial_text() {
    let provider = MockProvider::named("alpha", &["alpha-1"]).with_steps(vec![
        MockStep::Text("Hello".into()),
        MockStep::Text(" wor".into()),
        MockStep::WaitForCancel,
    ]);
    let mut h = harness(single_agent("alpha", "alpha-1"), vec![provider]).await;

    h.session.handle(user_message("say hello")).await;
    wait_until(&h.sink, |events| chunk_text(events) == "Hello wor").await;

    h.session.handle(ClientMessage::Stop).await;
    h.session.wait_for_run().await;

    let events = h.sink.events();
    let stopped_at = events
        .iter()
        .position(|e| *e == ServerEvent::Stopped)
        .unwrap();
    assert!(!events[stopped_at..]
        .iter()
        .any(|e| matches!(e, ServerEvent::Chunk { .. })));

    let expected = format!("Hello wor{}", STOPPED_MARKER);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::Complete { content, .. } if *content == expected)));

    let orch = orchestrator::lock(h.session.orchestrator());
    assert_eq!(orch.history().last().unwrap().content, expected);
    assert_eq!(orch.phase(), SessionPhase::Stopped);
}

#[tokio::test]
async fn test_stop_before_output_writes_nothing() {
    let provider =
        MockProvider::named("alpha", &["alpha-1"]).with_steps(vec![MockStep::WaitForCancel]);
    let mut h = harness(single_agent("alpha", "alpha-1"), vec![provider]).await;

    h.session.handle(user_message("hi")).await;
    wait_until(&h.sink, |events| {
        events.iter().any(|e| matches!(e, ServerEvent::Thinking { .. }))
    })
    .await;
    h.session.handle(ClientMessage::Stop).await;
    h.session.wait_for_run().await;

    let kinds = h.sink.kinds();
    assert!(!kinds.contains(&"complete"));
    assert!(!kinds.contains(&"error"));
    let history = h.store.load_history(SESSION).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_user());
}

#[tokio::test]
async fn test_pause_holds_output_without_reissuing_request() {
    let provider = MockProvider::named("alpha", &["alpha-1"]).with_steps(vec![
        MockStep::Text("a".into()),
        MockStep::Delay(Duration::from_millis(30)),
        MockStep::Text("b".into()),
        MockStep::Delay(Duration::from_millis(30)),
        MockStep::Text("c".into()),
        MockStep::Finish(3),
    ]);
    let mut h = harness(single_agent("alpha", "alpha-1"), vec![provider.clone()]).await;

    h.session.handle(user_message("go")).await;
    wait_until(&h.sink, |events| chunk_text(events) == "a").await;

    h.session.handle(ClientMessage::Pause).await;
    assert_eq!(h.session.phase(), SessionPhase::Paused);
    let chunks_at_pause = chunk_text(&h.sink.events());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(chunk_text(&h.sink.events()), chunks_at_pause);
    assert!(!h.sink.kinds().contains(&"complete"));

    h.session.handle(ClientMessage::Resume).await;
    assert_eq!(h.session.phase(), SessionPhase::Running);
    h.session.wait_for_run().await;

    assert_eq!(provider.call_count(), 1);
    let events = h.sink.events();
    assert_eq!(chunk_text(&events), "abc");

    let tokens: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::Chunk { tokens, .. } | ServerEvent::Complete { tokens, .. } => {
                Some(*tokens)
            }
            _ => None,
        })
        .collect();
    assert!(tokens.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(tokens.last(), Some(&3));
    assert_eq!(h.session.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn test_provider_error_without_text_emits_error_event() {
    let provider = MockProvider::named("alpha", &["alpha-1"]).with_steps(vec![MockStep::Fail(
        ProviderError::RateLimited("You exceeded your current quota".into()),
    )]);
    let mut h = harness(single_agent("alpha", "alpha-1"), vec![provider]).await;

    h.session.handle(user_message("hi")).await;
    h.session.wait_for_run().await;

    let events = h.sink.events();
    let error = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::Error {
                model_id, error, ..
            } => Some((model_id.clone(), error.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(error.0.as_deref(), Some("solo"));
    assert!(error.1.starts_with("Quota exceeded"));
    assert!(!h.sink.kinds().contains(&"complete"));

    let orch = orchestrator::lock(h.session.orchestrator());
    assert_eq!(orch.history().len(), 1);
}

#[tokio::test]
async fn test_unknown_model_fails_turn_but_not_round() {
    let beta = MockProvider::named("beta", &["beta-1"]).with_response("still here");
    let policy = RosterPolicy::new(
        vec![
            AgentConfig::new("ghost:none", "Ghost", "gho", AgentRole::General),
            AgentConfig::new("beta-1", "Beta", "bet", AgentRole::General),
        ],
        0,
    );
    let mut h = harness(policy, vec![beta]).await;

    h.session.handle(user_message("@all hi")).await;
    h.session.wait_for_run().await;

    let kinds: Vec<&str> = h
        .sink
        .kinds()
        .into_iter()
        .filter(|k| *k != "chunk")
        .collect();
    assert_eq!(
        kinds,
        vec![
            "ready",
            "round_start",
            "thinking",
            "error",
            "thinking",
            "complete",
            "round_end",
            "token_usage"
        ]
    );
}

#[tokio::test]
async fn test_mentions_route_and_are_stripped() {
    let alpha = MockProvider::named("alpha", &["alpha-1"]).with_response("from alpha");
    let beta = MockProvider::named("beta", &["beta-1"]).with_response("from beta");
    let policy = RosterPolicy::new(
        vec![
            AgentConfig::new("alpha-1", "Alpha", "alp", AgentRole::Coder),
            AgentConfig::new("beta-1", "Beta", "bet", AgentRole::Reviewer),
        ],
        0,
    );
    let mut h = harness(policy, vec![alpha.clone(), beta.clone()]).await;

    h.session
        .handle(user_message("@bet write a function please"))
        .await;
    h.session.wait_for_run().await;

    assert_eq!(alpha.call_count(), 0);
    let call = beta.recorded_calls().pop().unwrap();
    assert_eq!(call.messages.last().unwrap().text, "write a function please");

    // The stored user turn keeps the original wording.
    let history = h.store.load_history(SESSION).await.unwrap();
    assert_eq!(history[0].content, "@bet write a function please");
}

#[tokio::test]
async fn test_explicit_mentions_from_client() {
    let alpha = MockProvider::named("alpha", &["alpha-1"]).with_response("a");
    let beta = MockProvider::named("beta", &["beta-1"]).with_response("b");
    let policy = RosterPolicy::new(
        vec![
            AgentConfig::new("alpha-1", "Alpha", "alp", AgentRole::General),
            AgentConfig::new("beta-1", "Beta", "bet", AgentRole::General),
        ],
        0,
    );
    let mut h = harness(policy, vec![alpha.clone(), beta.clone()]).await;

    h.session
        .handle(ClientMessage::UserMessage {
            content: "thoughts?".into(),
            mentioned_models: vec!["bet".into()],
        })
        .await;
    h.session.wait_for_run().await;

    assert_eq!(alpha.call_count(), 0);
    assert_eq!(beta.call_count(), 1);
}

#[tokio::test]
async fn test_new_message_stops_previous_run() {
    let provider = MockProvider::named("alpha", &["alpha-1"]).with_scripts(vec![
        vec![MockStep::Text("first".into()), MockStep::WaitForCancel],
        vec![MockStep::Text("second".into()), MockStep::Finish(1)],
    ]);
    let mut h = harness(single_agent("alpha", "alpha-1"), vec![provider]).await;

    h.session.handle(user_message("one")).await;
    wait_until(&h.sink, |events| chunk_text(events) == "first").await;
    h.session.handle(user_message("two")).await;
    h.session.wait_for_run().await;

    let history = h.store.load_history(SESSION).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
    let stopped = format!("first{}", STOPPED_MARKER);
    assert_eq!(contents, vec!["one", stopped.as_str(), "two", "second"]);
}

#[tokio::test]
async fn test_policy_snapshot_survives_update() {
    let alpha = MockProvider::named("alpha", &["alpha-1"]).with_steps(vec![
        MockStep::Delay(Duration::from_millis(50)),
        MockStep::Text("done".into()),
        MockStep::Finish(1),
    ]);
    let beta = MockProvider::named("beta", &["beta-1"]).with_response("late");
    let policy = RosterPolicy::new(
        vec![AgentConfig::new("alpha-1", "Alpha", "alp", AgentRole::General)],
        0,
    );
    let mut h = harness(policy, vec![alpha, beta.clone()]).await;

    h.session.handle(user_message("@all hi")).await;
    let updated = RosterPolicy::new(
        vec![
            AgentConfig::new("alpha-1", "Alpha", "alp", AgentRole::General),
            AgentConfig::new("beta-1", "Beta", "bet", AgentRole::General),
        ],
        0,
    );
    h.store.save_roster(SESSION, &updated).await.unwrap();
    h.session.handle(ClientMessage::UpdateConfig).await;
    h.session.wait_for_run().await;

    assert_eq!(beta.call_count(), 0);
    assert_eq!(
        orchestrator::lock(h.session.orchestrator()).policy().len(),
        2
    );
}

#[tokio::test]
async fn test_run_loop_stops_active_run_on_disconnect() {
    let provider = MockProvider::named("alpha", &["alpha-1"])
        .with_steps(vec![MockStep::Text("x".into()), MockStep::WaitForCancel]);
    let h = harness(single_agent("alpha", "alpha-1"), vec![provider]).await;
    let sink = h.sink.clone();
    let orch = h.session.orchestrator().clone();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let loop_task = tokio::spawn(h.session.run(rx));
    tx.send(user_message("hi")).unwrap();
    wait_until(&sink, |events| chunk_text(events) == "x").await;
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), loop_task)
        .await
        .expect("session loop did not exit")
        .unwrap();
    assert_eq!(orchestrator::lock(&orch).phase(), SessionPhase::Stopped);
}

#[tokio::test]
async fn test_fast_deltas_are_coalesced_into_few_chunks() {
    let mut steps: Vec<MockStep> = (0..200).map(|i| MockStep::Text(format!("t{} ", i))).collect();
    steps.push(MockStep::Finish(200));
    let expected: String = (0..200).map(|i| format!("t{} ", i)).collect();
    let provider = MockProvider::named("alpha", &["alpha-1"]).with_steps(steps);
    let mut h = harness(single_agent("alpha", "alpha-1"), vec![provider]).await;

    h.session.handle(user_message("go")).await;
    h.session.wait_for_run().await;

    let events = h.sink.events();
    let chunks = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::Chunk { .. }))
        .count();
    assert!(chunks >= 1 && chunks < 50, "{} chunk events for 200 deltas", chunks);
    assert_eq!(chunk_text(&events), expected);

    let complete = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::Complete { content, tokens, .. } => Some((content.clone(), *tokens)),
            _ => None,
        })
        .unwrap();
    assert_eq!(complete, (expected, 200));
}

#[tokio::test]
async fn test_agents_on_same_model_are_distinguishable() {
    let provider = MockProvider::named("alpha", &["alpha-1"]).with_response("ok");
    let policy = RosterPolicy::new(
        vec![
            AgentConfig::new("alpha-1", "Planner", "pln", AgentRole::Planner),
            AgentConfig::new("alpha-1", "Coder", "cod", AgentRole::Coder),
        ],
        0,
    );
    let mut h = harness(policy, vec![provider]).await;

    h.session.handle(user_message("@all status?")).await;
    h.session.wait_for_run().await;

    let thinking: Vec<String> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::Thinking { model_id, .. } => Some(model_id),
            _ => None,
        })
        .collect();
    assert_eq!(thinking, vec!["pln", "cod"]);

    let completed: Vec<String> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::Complete { model_id, .. } => Some(model_id),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec!["pln", "cod"]);
}
