// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley - bridge between chat contacts and a support-ticket backend.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod console;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use parley_config::ParleyConfig;
use parley_core::{ParleyError, TicketStatus};

/// Parley - bridge between chat contacts and a support-ticket backend.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bridge over the console transport until interrupted.
    Serve,
    /// Validate configuration and probe the ticket backend.
    Check,
    /// List contacts that have conversation logs.
    Contacts,
    /// List conversation segments with a contact, newest first.
    Segments {
        /// Contact address (a resource suffix is ignored).
        contact: String,
    },
    /// Print one conversation segment.
    Read {
        contact: String,
        /// Segment file name, as shown by `segments`.
        file: String,
    },
    /// List backend tickets for this channel.
    Tickets {
        /// Only tickets with this status (open, in_progress, resolved, closed).
        #[arg(long)]
        status: Option<TicketStatus>,
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show the open ticket of a contact.
    ActiveTicket {
        /// Bare contact address.
        jid: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => parley_config::load_and_validate_path(path),
        None => parley_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            parley_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, config).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

async fn run(command: Option<Commands>, config: ParleyConfig) -> Result<(), ParleyError> {
    match command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Check) => commands::run_check(&config).await,
        Some(Commands::Contacts) => commands::run_contacts(&config).await,
        Some(Commands::Segments { contact }) => commands::run_segments(&config, &contact).await,
        Some(Commands::Read { contact, file }) => {
            commands::run_read(&config, &contact, &file).await
        }
        Some(Commands::Tickets {
            status,
            skip,
            limit,
        }) => commands::run_tickets(&config, status, skip, limit).await,
        Some(Commands::ActiveTicket { jid }) => commands::run_active_ticket(&config, &jid).await,
        None => {
            println!("parley: use --help for available commands");
            Ok(())
        }
    }
}
