// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Roundtable - several language models in one conversation
#[derive(Parser, Debug)]
#[command(name = "roundtable")]
#[command(version, about = "Multi-model round-table conversations with live streaming")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format for listings
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a stored session over stdin/stdout JSON lines
    Serve(ServeArgs),

    /// Create a session from a roster file
    Create(CreateArgs),

    /// List models from every enabled provider
    Models,

    /// List supported providers and whether they are configured
    Providers,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Session to open
    pub session_id: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Session name
    #[arg(long)]
    pub name: String,

    /// JSON file holding an array of agent configs or a full roster policy
    #[arg(long)]
    pub roster: PathBuf,

    /// Unattended rounds after each user message; overrides the roster file
    #[arg(long)]
    pub autonomy_rounds: Option<u32>,
}

/// Output format
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
