// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Roundtable - multi-model conversations with live streaming control
//!
//! Entry point for the `roundtable` binary.

use clap::Parser;

use roundtable::cli::{Cli, Commands};
use roundtable::config::Settings;
use roundtable::error::Result;

#[path = "main/cli_commands.rs"]
mod cli_commands;

use cli_commands::{run_create, run_models, run_providers, run_serve};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on session diagnostics, `-vv` adds provider traffic.
    // `RUST_LOG` still takes precedence.
    let mut directives = Vec::new();
    if cli.verbose > 0 {
        directives.extend([
            "roundtable.session=debug",
            "roundtable.orchestrator=debug",
            "roundtable.store=debug",
        ]);
    }
    if cli.verbose > 1 {
        directives.extend([
            "roundtable.stream=debug",
            "roundtable.registry=debug",
            "roundtable.provider=debug",
            "roundtable.transport=debug",
        ]);
    }
    for directive in directives {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    // stdout carries protocol events
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    settings.ensure_directories()?;

    match cli.command {
        Commands::Serve(args) => run_serve(args, &settings).await,
        Commands::Create(args) => run_create(args, &settings).await,
        Commands::Models => run_models(&settings, &cli.format).await,
        Commands::Providers => run_providers(&settings, &cli.format),
    }
}
