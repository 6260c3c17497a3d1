// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs an operator-configured shell command on transition, with alert
//! fields injected as environment variables. Grounded on the same
//! spawn-and-detach pattern used to launch external processes elsewhere
//! in this codebase, minus the detach (a notification command's exit
//! status is worth observing, unlike a long-lived launched session's).

use async_trait::async_trait;
use tokio::process::Command;

use super::super::channel::ChannelAdapter;
use crate::evaluator::AlertTransition;

pub struct CommandChannel {
    shell_command: String,
}

impl CommandChannel {
    pub fn new(shell_command: String) -> Self {
        Self { shell_command }
    }
}

#[async_trait]
impl ChannelAdapter for CommandChannel {
    fn kind(&self) -> &'static str {
        "command"
    }

    async fn send(&self, transition: &AlertTransition) -> anyhow::Result<()> {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", &self.shell_command]);
        cmd.env("MONCTL_RULE_ID", transition.rule_id.to_string());
        cmd.env("MONCTL_TARGET_ID", transition.target_id.to_string());
        cmd.env("MONCTL_ALERT_FROM", format!("{:?}", transition.from));
        cmd.env("MONCTL_ALERT_TO", format!("{:?}", transition.to));
        cmd.env("MONCTL_ALERT_VALUE", transition.value.map(|v| v.to_string()).unwrap_or_default());
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::null());
        cmd.stderr(std::process::Stdio::null());

        let status = cmd.status().await?;
        if !status.success() {
            anyhow::bail!("notification command exited with {status}");
        }
        Ok(())
    }
}
