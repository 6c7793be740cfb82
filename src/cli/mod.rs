// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// FHEVM session tools
#[derive(Parser, Debug)]
#[command(name = "fhevm-session-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Inspect FHE environments and manage decryption authorizations", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve chain id, endpoint and environment kind for an RPC URL
    Resolve(session::ResolveArgs),

    /// Check whether an RPC URL is a compatible simulated FHE node
    Probe(session::ProbeArgs),

    /// Build a session and load or sign a decryption authorization
    Authorize(session::AuthorizeArgs),

    /// Print build version and feature list as JSON
    Version,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resolve(args) => session::resolve(args).await,
        Commands::Probe(args) => session::probe(args).await,
        Commands::Authorize(args) => session::authorize(args).await,
        Commands::Version => {
            println!(
                "{}",
                serde_json::to_string_pretty(&crate::version::get_version_info())?
            );
            Ok(())
        }
    }
}
