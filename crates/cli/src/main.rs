// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fns` - minimal CLI entrypoint over `fns-lifecycle`.
//!
//! Wiring an HTTP (or other) transport is out of scope for this workspace
//! (`spec.md` §1); this binary only exercises the parts that are in scope -
//! loading configuration and assembling the ambient `Runtime` - so a host
//! application can confirm its config document is valid before it supplies
//! its own `fns_lifecycle::Transport` and calls `fns_lifecycle::run`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fns_dispatch::NoRemoteCaller;
use fns_lifecycle::Config;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fns", about = "fns runtime CLI")]
struct Cli {
    /// Path to the configuration document (YAML or JSON)
    #[arg(short, long, default_value = "fns.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate the configuration document, printing it as JSON
    CheckConfig,
    /// Load configuration, assemble the runtime, and print a health report
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.command {
        Command::CheckConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Health => {
            fns_lifecycle::init_tracing(&config.log);
            let registry = Arc::new(fns_registry::ServiceRegistry::new(&config.cluster.node_id));
            let runtime = fns_lifecycle::Runtime::new(&config, registry, Arc::new(NoRemoteCaller));
            println!("{}", serde_json::to_string_pretty(&runtime.health())?);
        }
    }
    Ok(())
}
