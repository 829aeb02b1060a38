// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express: address shapes, URL
//! schemes, positive intervals. All problems are collected, not just the first.

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::validation(format!(
            "agent.log_level `{}` is not one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if let Some(jid) = config.account.jid.as_deref() {
        match jid.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => errors.push(ConfigError::validation(format!(
                "account.jid `{jid}` must look like user@domain"
            ))),
        }
        if jid.contains('/') {
            errors.push(ConfigError::validation(format!(
                "account.jid `{jid}` must be a bare address; set the resource in account.resource"
            )));
        }
    }

    if config.account.resource.trim().is_empty() {
        errors.push(ConfigError::validation("account.resource must not be empty"));
    }

    if config.account.port == 0 {
        errors.push(ConfigError::validation("account.port must be non-zero"));
    }

    if let Some(url) = config.backend.base_url.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "backend.base_url `{url}` must start with http:// or https://"
            )));
        }
    }

    if config.backend.timeout_secs == 0 {
        errors.push(ConfigError::validation("backend.timeout_secs must be at least 1"));
    }

    if config.monitor.poll_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "monitor.poll_interval_secs must be at least 1",
        ));
    }

    if config.monitor.max_consecutive_errors == 0 {
        errors.push(ConfigError::validation(
            "monitor.max_consecutive_errors must be at least 1",
        ));
    }

    if !(1..=1000).contains(&config.monitor.message_page_size) {
        errors.push(ConfigError::validation(format!(
            "monitor.message_page_size must be between 1 and 1000, got {}",
            config.monitor.message_page_size
        )));
    }

    if config.transcript.dir.trim().is_empty() {
        errors.push(ConfigError::validation("transcript.dir must not be empty"));
    }

    if config.prometheus.enabled
        && config
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ConfigError::validation(format!(
            "prometheus.listen `{}` is not a socket address",
            config.prometheus.listen
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ParleyConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut config = ParleyConfig::default();
        config.account.jid = Some("no-at-sign".into());
        config.backend.base_url = Some("ftp://helpdesk".into());
        config.monitor.poll_interval_secs = 0;
        let errors = validate_config(&config).expect_err("should fail");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn rejects_full_address_as_account() {
        let mut config = ParleyConfig::default();
        config.account.jid = Some("bot@example.com/desk".into());
        let errors = validate_config(&config).expect_err("should fail");
        assert!(errors[0].to_string().contains("bare address"));
    }

    #[test]
    fn prometheus_listen_checked_only_when_enabled() {
        let mut config = ParleyConfig::default();
        config.prometheus.listen = "nowhere".into();
        assert!(validate_config(&config).is_ok());
        config.prometheus.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
