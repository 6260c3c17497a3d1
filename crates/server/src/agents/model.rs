// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::TargetKind;

/// Lifecycle state of a registered agent. `Pending` covers an agent
/// pre-provisioned (directly, or via discovery auto-monitor) but never yet
/// heard from; `Disabled` is an admin-initiated pause that a first
/// heartbeat cannot clear on its own (re-enabling puts it back to
/// `Pending`, not straight to `Active`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Pending,
    Active,
    Stale,
    Offline,
    Disabled,
}

/// A collector instance bound to exactly one target for its whole life.
/// `platform` is an OS marker (`linux`, `darwin`, `windows`, ...) reported
/// at heartbeat time; it never stands in for the target's address — that
/// identity lives solely in `target_id`, fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    /// Matches the kind of the target this agent is bound to.
    pub kind: TargetKind,
    pub target_id: Uuid,
    /// The api key this agent must authenticate its heartbeats with.
    pub api_key_id: Uuid,
    pub config_revision: u64,
    pub state: AgentState,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub version: String,
    pub platform: String,
    pub heartbeat_interval_secs: u64,
}

impl Agent {
    /// Instant at which a missed heartbeat first pushes this agent past
    /// `Active`, given the configured stale/offline multipliers.
    pub fn stale_deadline(&self, stale_after_n: u32) -> DateTime<Utc> {
        self.last_heartbeat_at
            + chrono::Duration::seconds((self.heartbeat_interval_secs * stale_after_n as u64) as i64)
    }

    pub fn offline_deadline(&self, offline_after_n: u32) -> DateTime<Utc> {
        self.last_heartbeat_at
            + chrono::Duration::seconds((self.heartbeat_interval_secs * offline_after_n as u64) as i64)
    }
}
