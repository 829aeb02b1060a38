// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands: `check`, `contacts`, `segments`, `read`, `tickets`
//! and `active-ticket`.

use std::io::IsTerminal;

use chrono::Local;
use colored::Colorize;
use parley_bridge::merge_contacts;
use parley_config::ParleyConfig;
use parley_core::{ContactId, HealthStatus, ParleyError, PluginAdapter, TicketQuery, TicketStatus};
use parley_helpdesk::HelpdeskBackend;
use parley_transcript::ConversationLogStore;

use crate::serve::build_backend;

/// Status of a `check` item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    message: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }
}

/// Log owner directory for the configured account.
pub fn owner_name(config: &ParleyConfig) -> Result<String, ParleyError> {
    config
        .account
        .username()
        .map(str::to_string)
        .ok_or_else(|| ParleyError::Config("account.jid is required".into()))
}

fn transcript_store(config: &ParleyConfig) -> ConversationLogStore {
    ConversationLogStore::new(&config.transcript.dir)
}

fn require_backend(config: &ParleyConfig) -> Result<HelpdeskBackend, ParleyError> {
    if config.backend.base_url.is_none() {
        return Err(ParleyError::Config("backend.base_url is required".into()));
    }
    HelpdeskBackend::new(&config.backend)
}

/// Runs the `parley check` command. Fails when any check fails.
pub async fn run_check(config: &ParleyConfig) -> Result<(), ParleyError> {
    let results = vec![
        CheckResult::new("config", CheckStatus::Pass, "configuration is valid"),
        check_account(config),
        check_transcript_dir(config).await,
        check_backend(config).await,
    ];

    let use_color = std::io::stdout().is_terminal();
    println!("parley check");
    for result in &results {
        let symbol = match (result.status, use_color) {
            (CheckStatus::Pass, true) => "ok".green().to_string(),
            (CheckStatus::Warn, true) => "warn".yellow().to_string(),
            (CheckStatus::Fail, true) => "FAIL".red().to_string(),
            (CheckStatus::Pass, false) => "ok".to_string(),
            (CheckStatus::Warn, false) => "warn".to_string(),
            (CheckStatus::Fail, false) => "FAIL".to_string(),
        };
        println!("  [{symbol}] {:<12} {}", result.name, result.message);
    }

    let failed = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    if failed > 0 {
        return Err(ParleyError::Internal(format!("{failed} check(s) failed")));
    }
    Ok(())
}

fn check_account(config: &ParleyConfig) -> CheckResult {
    match (config.account.jid.as_deref(), config.account.password.is_some()) {
        (None, _) => CheckResult::new("account", CheckStatus::Warn, "account.jid is not set"),
        (Some(jid), false) => CheckResult::new(
            "account",
            CheckStatus::Warn,
            format!("{jid} has no password configured"),
        ),
        (Some(jid), true) => CheckResult::new(
            "account",
            CheckStatus::Pass,
            format!("{jid}/{}", config.account.resource),
        ),
    }
}

async fn check_transcript_dir(config: &ParleyConfig) -> CheckResult {
    let dir = &config.transcript.dir;
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => CheckResult::new("transcripts", CheckStatus::Pass, dir.clone()),
        Err(e) => CheckResult::new(
            "transcripts",
            CheckStatus::Fail,
            format!("cannot create {dir}: {e}"),
        ),
    }
}

async fn check_backend(config: &ParleyConfig) -> CheckResult {
    let backend = match build_backend(config) {
        Ok(Some(backend)) => backend,
        Ok(None) => {
            return CheckResult::new(
                "backend",
                CheckStatus::Warn,
                "backend.base_url is not set; messages will only be logged",
            );
        }
        Err(e) => return CheckResult::new("backend", CheckStatus::Fail, e.to_string()),
    };
    match backend.health_check().await {
        Ok(HealthStatus::Healthy) => CheckResult::new("backend", CheckStatus::Pass, "reachable"),
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::new("backend", CheckStatus::Warn, reason)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new("backend", CheckStatus::Fail, reason)
        }
        Err(e) => CheckResult::new("backend", CheckStatus::Fail, e.to_string()),
    }
}

/// Runs the `parley contacts` command.
pub async fn run_contacts(config: &ParleyConfig) -> Result<(), ParleyError> {
    let owner = owner_name(config)?;
    let logged = transcript_store(config).list_partners(&owner).await?;
    let contacts = merge_contacts(&[], &[], &logged);
    if contacts.is_empty() {
        println!("no conversations logged for {owner}");
    }
    for contact in contacts {
        println!("{}", contact.address);
    }
    Ok(())
}

/// Runs the `parley segments <contact>` command.
pub async fn run_segments(config: &ParleyConfig, contact: &str) -> Result<(), ParleyError> {
    let owner = owner_name(config)?;
    let bare = ContactId::from_full(contact);
    let segments = transcript_store(config)
        .list_segments(&owner, bare.as_str())
        .await?;
    if segments.is_empty() {
        println!("no conversations with {bare}");
    }
    let today = Local::now().date_naive();
    for segment in segments {
        println!("{:<20} {}", segment.file_name(), segment.title(today));
    }
    Ok(())
}

/// Runs the `parley read <contact> <file>` command.
pub async fn run_read(config: &ParleyConfig, contact: &str, file: &str) -> Result<(), ParleyError> {
    let owner = owner_name(config)?;
    let bare = ContactId::from_full(contact);
    let store = transcript_store(config);
    let segment = store.segment(&owner, bare.as_str(), file).await?;
    print!("{}", store.read(&segment).await?);
    Ok(())
}

/// Runs the `parley tickets` command.
pub async fn run_tickets(
    config: &ParleyConfig,
    status: Option<TicketStatus>,
    skip: u32,
    limit: u32,
) -> Result<(), ParleyError> {
    use parley_core::TicketBackend;

    let backend = require_backend(config)?;
    let query = TicketQuery {
        status,
        channel_source: Some(backend.channel_source().to_string()),
        skip,
        limit,
    };
    let page = backend.list_tickets(&query).await?;
    for ticket in &page.data {
        println!(
            "{:<24} {:<12} {}",
            ticket.id,
            ticket.status,
            ticket.subject.as_deref().unwrap_or("-")
        );
    }
    println!("{} of {} tickets", page.data.len(), page.count);
    Ok(())
}

/// Runs the `parley active-ticket <jid>` command.
pub async fn run_active_ticket(config: &ParleyConfig, jid: &str) -> Result<(), ParleyError> {
    use parley_core::TicketBackend;

    let backend = require_backend(config)?;
    let bare = ContactId::from_full(jid);
    match backend.active_ticket(bare.as_str()).await? {
        Some(ticket) => println!(
            "{} {} {}",
            ticket.id,
            ticket.status,
            ticket.subject.as_deref().unwrap_or("-")
        ),
        None => println!("no active ticket for {bare}"),
    }
    Ok(())
}
