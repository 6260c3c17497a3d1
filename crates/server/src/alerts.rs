// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory projection of currently non-`Ok` alert state, keyed by
//! `(rule_id, target_id)`.
//!
//! The evaluator's shards (C7) deliberately hold no externally-queryable
//! state — that's what keeps the hot sample path lock-free. This module
//! replays the shards' transition stream into something `GET /alerts` and
//! the periodic checkpoint can read, matching the persistence note that
//! alert state is in-memory with a periodic snapshot to the durable store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::audit::AuditWriter;
use crate::error::{AppError, AppResult};
use crate::evaluator::{AlertState, AlertTransition};
use crate::rules::Severity;
use crate::time_util::now;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveAlert {
    pub rule_id: Uuid,
    pub target_id: Uuid,
    pub severity: Severity,
    pub value: Option<f64>,
    pub since: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct ActiveAlerts {
    alerts: RwLock<HashMap<(Uuid, Uuid), ActiveAlert>>,
}

impl ActiveAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a loaded checkpoint.
    pub fn restore(entries: Vec<ActiveAlert>) -> Self {
        let map = entries.into_iter().map(|a| ((a.rule_id, a.target_id), a)).collect();
        Self { alerts: RwLock::new(map) }
    }

    async fn apply(&self, transition: &AlertTransition) {
        let key = (transition.rule_id, transition.target_id);
        let mut alerts = self.alerts.write().await;
        match transition.to {
            AlertState::Firing => {
                let entry = alerts.entry(key).or_insert_with(|| ActiveAlert {
                    rule_id: transition.rule_id,
                    target_id: transition.target_id,
                    severity: transition.severity,
                    value: transition.value,
                    since: transition.at,
                    last_update: transition.at,
                    acknowledged: false,
                    acknowledged_by: None,
                    acknowledged_at: None,
                });
                entry.severity = transition.severity;
                entry.value = transition.value;
                entry.last_update = transition.at;
            }
            AlertState::Ok => {
                alerts.remove(&key);
            }
            // The condition was never observed to clear, it just stopped
            // being reported on — the entry stays listed (an operator still
            // needs to know it's unmonitored) but the value/severity freeze
            // at whatever they were when the rule last actually evaluated.
            AlertState::Stale => {
                if let Some(entry) = alerts.get_mut(&key) {
                    entry.last_update = transition.at;
                }
            }
            AlertState::Pending => {}
        }
    }

    pub async fn list(&self) -> Vec<ActiveAlert> {
        self.alerts.read().await.values().cloned().collect()
    }

    pub async fn acknowledge(&self, rule_id: Uuid, target_id: Uuid, by: &str) -> AppResult<ActiveAlert> {
        let mut alerts = self.alerts.write().await;
        let alert =
            alerts.get_mut(&(rule_id, target_id)).ok_or_else(|| AppError::NotFound("alert".into()))?;
        alert.acknowledged = true;
        alert.acknowledged_by = Some(by.to_owned());
        alert.acknowledged_at = Some(now());
        Ok(alert.clone())
    }

    /// Operator-forced resolution. If the underlying condition is still
    /// breaching, the rule fires again on its next evaluation — this only
    /// clears the current entry, the same as an automatic recovery would.
    pub async fn resolve(&self, rule_id: Uuid, target_id: Uuid) -> AppResult<()> {
        self.alerts
            .write()
            .await
            .remove(&(rule_id, target_id))
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("alert".into()))
    }

    pub async fn snapshot(&self) -> Vec<ActiveAlert> {
        self.list().await
    }
}

/// Replays transitions into `active` and the audit log, then forwards each
/// one on unchanged. Keeps a single logical consumer of the evaluator's
/// transition channel while giving handlers and checkpointing a queryable
/// view the evaluator's shards don't hold themselves; the dispatcher reads
/// from the returned receiver instead of the evaluator's directly.
pub fn spawn_alert_tracker(
    mut transitions_rx: mpsc::Receiver<AlertTransition>,
    active: Arc<ActiveAlerts>,
    audit: AuditWriter,
    shutdown: tokio_util::sync::CancellationToken,
) -> mpsc::Receiver<AlertTransition> {
    let (forward_tx, forward_rx) = mpsc::channel(1024);
    tokio::spawn(async move {
        loop {
            let transition = tokio::select! {
                _ = shutdown.cancelled() => break,
                t = transitions_rx.recv() => match t {
                    Some(t) => t,
                    None => break,
                },
            };
            active.apply(&transition).await;
            audit.record(
                "system",
                format!("alert.{:?}", transition.to).to_lowercase(),
                format!("rule:{} target:{}", transition.rule_id, transition.target_id),
                serde_json::json!({"from": transition.from, "to": transition.to, "value": transition.value}),
            );
            if forward_tx.send(transition).await.is_err() {
                break;
            }
        }
    });
    forward_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::TransitionKind;
    use crate::rules::model::{Comparator, Reducer};
    use crate::rules::Severity;

    fn test_rule(rule_id: Uuid) -> Arc<crate::rules::AlertRule> {
        let ts = now();
        Arc::new(crate::rules::AlertRule {
            id: rule_id,
            name: "high cpu".into(),
            metric: "cpu.load1".into(),
            target_labels: Default::default(),
            window_secs: 60,
            reducer: Reducer::Avg,
            sample_threshold: None,
            comparator: Comparator::GreaterThan,
            threshold: 0.9,
            persistence_secs: 0,
            cooldown_secs: 300,
            severity: Severity::Warning,
            channels: vec![],
            enabled: true,
            created_at: ts,
            updated_at: ts,
        })
    }

    fn transition(to: AlertState, rule_id: Uuid, target_id: Uuid) -> AlertTransition {
        AlertTransition {
            rule_id,
            target_id,
            from: AlertState::Ok,
            to,
            kind: TransitionKind::for_states(to),
            severity: Severity::Warning,
            value: Some(1.0),
            at: now(),
            rule_snapshot: test_rule(rule_id),
        }
    }

    #[tokio::test]
    async fn firing_then_ok_removes_the_entry() {
        let active = ActiveAlerts::new();
        let rule_id = Uuid::new_v4();
        let target_id = Uuid::new_v4();
        active.apply(&transition(AlertState::Firing, rule_id, target_id)).await;
        assert_eq!(active.list().await.len(), 1);
        active.apply(&transition(AlertState::Ok, rule_id, target_id)).await;
        assert!(active.list().await.is_empty());
    }

    #[tokio::test]
    async fn acknowledge_unknown_alert_is_not_found() {
        let active = ActiveAlerts::new();
        let result = active.acknowledge(Uuid::new_v4(), Uuid::new_v4(), "alice").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn acknowledge_marks_the_alert() {
        let active = ActiveAlerts::new();
        let rule_id = Uuid::new_v4();
        let target_id = Uuid::new_v4();
        active.apply(&transition(AlertState::Firing, rule_id, target_id)).await;
        let acked = active.acknowledge(rule_id, target_id, "alice").await.expect("exists");
        assert!(acked.acknowledged);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn stale_keeps_the_entry_listed() {
        let active = ActiveAlerts::new();
        let rule_id = Uuid::new_v4();
        let target_id = Uuid::new_v4();
        active.apply(&transition(AlertState::Firing, rule_id, target_id)).await;
        active.apply(&transition(AlertState::Stale, rule_id, target_id)).await;
        assert_eq!(active.list().await.len(), 1);
    }

    #[tokio::test]
    async fn resolve_clears_the_entry() {
        let active = ActiveAlerts::new();
        let rule_id = Uuid::new_v4();
        let target_id = Uuid::new_v4();
        active.apply(&transition(AlertState::Firing, rule_id, target_id)).await;
        active.resolve(rule_id, target_id).await.expect("exists");
        assert!(active.list().await.is_empty());
    }
}
