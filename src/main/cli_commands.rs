// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::Path;
use std::sync::Arc;

use roundtable::cli::{CreateArgs, OutputFormat, ServeArgs};
use roundtable::config::Settings;
use roundtable::error::{Result, RoundtableError};
use roundtable::llm::factory::ProviderFactory;
use roundtable::llm::providers::display_name_for;
use roundtable::orchestrator::{AgentConfig, RosterPolicy};
use roundtable::session::{ChannelSink, Session};
use roundtable::store::{ConversationStore, SqliteStore};
use roundtable::transport::StdioTransport;

/// Open a stored session and drive it over stdin/stdout
pub async fn run_serve(args: ServeArgs, settings: &Settings) -> Result<()> {
    let store: Arc<dyn ConversationStore> = Arc::new(SqliteStore::open(settings.database_path())?);
    let registry = Arc::new(ProviderFactory::build_registry(settings));
    if registry.is_empty() {
        tracing::warn!(target: "roundtable.registry", "no providers are enabled");
    }

    let (sink, events) = ChannelSink::channel();
    let (inbound, tasks) = StdioTransport::stdio().start(sink.clone(), events);

    let opened = Session::open(
        &args.session_id,
        registry,
        store,
        Arc::new(sink),
        &settings.session,
    )
    .await;

    let outcome = match opened {
        Ok(session) => {
            session.run(inbound).await;
            Ok(())
        }
        Err(e) => Err(e),
    };

    tasks.finish().await?;
    outcome
}

/// Read a roster file: either an array of agents (no autonomy rounds) or a
/// full policy object
pub fn read_roster(path: &Path) -> Result<RosterPolicy> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    if value.is_array() {
        let agents: Vec<AgentConfig> = serde_json::from_value(value)?;
        return Ok(RosterPolicy::new(agents, 0));
    }
    Ok(serde_json::from_value(value)?)
}

/// The policy a new session starts with; `--autonomy-rounds` wins over the file
pub fn roster_policy(args: &CreateArgs, settings: &Settings) -> Result<RosterPolicy> {
    let mut policy = read_roster(&args.roster)?;
    if policy.is_empty() {
        return Err(RoundtableError::Config(format!(
            "roster {} has no agents",
            args.roster.display()
        )));
    }
    if let Some(rounds) = args.autonomy_rounds {
        policy.autonomy_rounds = rounds;
    }
    Ok(policy.normalized(settings.session.max_autonomy_rounds))
}

/// Create a session and print its id
pub async fn run_create(args: CreateArgs, settings: &Settings) -> Result<()> {
    let policy = roster_policy(&args, settings)?;
    let store = SqliteStore::open(settings.database_path())?;
    let id = store.create_session(&args.name, &policy).await?;
    println!("{}", id);
    Ok(())
}

/// Print every model the enabled providers offer
pub async fn run_models(settings: &Settings, format: &OutputFormat) -> Result<()> {
    let registry = ProviderFactory::build_registry(settings);
    let models = registry.list_all_models().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&models)?),
        OutputFormat::Text => {
            if models.is_empty() {
                println!("No models available. Check `roundtable providers`.");
            }
            for model in models {
                println!("{:<50} {}", model.id, display_name_for(&model.provider));
            }
        }
    }
    Ok(())
}

/// Print supported providers and their configuration state
pub fn run_providers(settings: &Settings, format: &OutputFormat) -> Result<()> {
    let rows: Vec<(&str, bool)> = Settings::supported_providers()
        .into_iter()
        .map(|name| (name, ProviderFactory::is_configured(name, settings)))
        .collect();

    match format {
        OutputFormat::Json => {
            let value: serde_json::Map<String, serde_json::Value> = rows
                .iter()
                .map(|(name, configured)| (name.to_string(), serde_json::Value::Bool(*configured)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            for (name, configured) in rows {
                let state = if configured { "configured" } else { "not configured" };
                println!("{:<12} {:<16} {}", name, display_name_for(name), state);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_read_roster_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"[{"model_id":"ollama:llama3","name":"Llama","short_id":"lla","role":"coder"}]"#,
        )
        .unwrap();
        let policy = read_roster(&path).unwrap();
        assert_eq!(policy.agents.len(), 1);
        assert_eq!(policy.agents[0].model_ref, "ollama:llama3");
        assert_eq!(policy.autonomy_rounds, 0);
    }

    #[test]
    fn test_read_roster_policy_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"{"agents":[{"model_ref":"mock-model","display_name":"M"}],"autonomy_rounds":3}"#,
        )
        .unwrap();
        let policy = read_roster(&path).unwrap();
        assert_eq!(policy.agents[0].display_name, "M");
        assert_eq!(policy.autonomy_rounds, 3);
    }

    fn create_args(roster: PathBuf, autonomy_rounds: Option<u32>) -> CreateArgs {
        CreateArgs {
            name: "pair".to_string(),
            roster,
            autonomy_rounds,
        }
    }

    #[test]
    fn test_roster_policy_keeps_file_rounds_without_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"{"agents":[{"model_ref":"mock-model","display_name":"M","short_id":"m"}],"autonomy_rounds":3}"#,
        )
        .unwrap();
        let settings = Settings::default();

        let policy = roster_policy(&create_args(path.clone(), None), &settings).unwrap();
        assert_eq!(policy.autonomy_rounds, 3);

        let policy = roster_policy(&create_args(path, Some(1)), &settings).unwrap();
        assert_eq!(policy.autonomy_rounds, 1);
    }

    #[test]
    fn test_roster_policy_rejects_empty_roster() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, "[]").unwrap();
        let err = roster_policy(&create_args(path, None), &Settings::default()).unwrap_err();
        assert!(matches!(err, RoundtableError::Config(_)));
    }

    #[test]
    fn test_read_roster_missing_file() {
        assert!(read_roster(Path::new("/nonexistent/roster.json")).is_err());
    }
}
