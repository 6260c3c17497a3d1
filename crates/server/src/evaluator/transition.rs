// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::rules::model::{AlertRule, Severity};

/// Alert lifecycle state for one `(rule_id, target_id)` pair. `Stale` means
/// the rule was firing but no sample has arrived for at least two window
/// periods — the condition was never observed to clear, it simply stopped
/// being reported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Ok,
    Pending,
    Firing,
    Stale,
}

/// Why a transition was emitted, independent of the `to` state it carries —
/// lets consumers (dispatcher, audit) distinguish a stale-detection tick
/// from an ordinary evaluation-driven fire/resolve without inferring it
/// from `from`/`to` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fire,
    Resolve,
    Stale,
}

/// Emitted whenever a rule's state for a target changes. Consumed by the
/// notification dispatcher; also appended to the audit log. Carries a
/// snapshot of the rule as it existed at evaluation time, so a transition
/// delivered after the rule was edited or deleted still reports the
/// severity/channels it actually fired under.
#[derive(Debug, Clone, Serialize)]
pub struct AlertTransition {
    pub rule_id: Uuid,
    pub target_id: Uuid,
    pub from: AlertState,
    pub to: AlertState,
    pub kind: TransitionKind,
    pub severity: Severity,
    pub value: Option<f64>,
    pub at: DateTime<Utc>,
    pub rule_snapshot: Arc<AlertRule>,
}

impl TransitionKind {
    pub fn for_states(to: AlertState) -> Self {
        match to {
            AlertState::Ok => Self::Resolve,
            AlertState::Stale => Self::Stale,
            AlertState::Pending | AlertState::Firing => Self::Fire,
        }
    }
}
