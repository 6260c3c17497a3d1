// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loads notification channel definitions from a JSON file at boot: a side
//! file of secrets/endpoints the process reads once at startup rather than
//! threading individual CLI flags for every channel.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use super::channel::ChannelAdapter;
use super::dispatcher::ChannelRegistry;
use super::channels::{CommandChannel, SmsChannel, WebhookChannel};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    Webhook { url: String, signing_secret: String },
    Email { smtp_host: String, username: String, password: String, from: String, to: String },
    Sms { provider_url: String, to_number: String, api_key: String },
    Command { shell_command: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    pub channels: HashMap<Uuid, ChannelConfig>,
}

pub fn load(path: &Path) -> anyhow::Result<NotificationConfig> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Build a [`ChannelRegistry`] from loaded channel definitions.
pub fn build_registry(config: &NotificationConfig) -> anyhow::Result<ChannelRegistry> {
    let mut registry = ChannelRegistry::new();
    let client = reqwest::Client::new();

    for (id, channel) in &config.channels {
        let adapter: Arc<dyn ChannelAdapter> = match channel {
            ChannelConfig::Webhook { url, signing_secret } => {
                Arc::new(WebhookChannel::new(client.clone(), url.clone(), signing_secret.clone()))
            }
            ChannelConfig::Sms { provider_url, to_number, api_key } => Arc::new(SmsChannel::new(
                client.clone(),
                provider_url.clone(),
                to_number.clone(),
                api_key.clone(),
            )),
            ChannelConfig::Command { shell_command } => Arc::new(CommandChannel::new(shell_command.clone())),
            ChannelConfig::Email { smtp_host, username, password, from, to } => {
                #[cfg(feature = "email")]
                {
                    let from = from.parse().map_err(|e| anyhow::anyhow!("invalid 'from' mailbox: {e}"))?;
                    let to = to.parse().map_err(|e| anyhow::anyhow!("invalid 'to' mailbox: {e}"))?;
                    Arc::new(super::channels::EmailChannel::new(
                        smtp_host,
                        username.clone(),
                        password.clone(),
                        from,
                        to,
                    )?)
                }
                #[cfg(not(feature = "email"))]
                {
                    anyhow::bail!("channel {id} configured as email but this binary was built without the `email` feature")
                }
            }
        };
        registry.register(*id, adapter);
    }

    Ok(registry)
}
