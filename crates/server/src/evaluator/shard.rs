// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single evaluator shard: one task, one thread of exclusive ownership
//! over the windows and alert state for the target ids it's responsible
//! for. No locking inside a shard — samples for a given target always
//! route to the same shard (by `target_id` hash), so nothing else ever
//! touches this shard's state concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::state_machine::TrackedAlert;
use super::transition::AlertTransition;
use super::window::Window;
use crate::ingress::Sample;
use crate::registry::TargetRegistry;
use crate::rules::{AlertRule, RuleChange, RuleStore};

/// An alert is declared stale once this many window periods have passed
/// with no new sample while it was firing.
const STALE_WINDOW_MULTIPLE: i64 = 2;

type WindowKey = (Uuid, Uuid);

pub struct Shard {
    id: usize,
    rules: HashMap<Uuid, Arc<AlertRule>>,
    windows: HashMap<WindowKey, Window>,
    tracked: HashMap<WindowKey, TrackedAlert>,
    targets: Arc<TargetRegistry>,
}

impl Shard {
    pub fn new(id: usize, targets: Arc<TargetRegistry>) -> Self {
        Self { id, rules: HashMap::new(), windows: HashMap::new(), tracked: HashMap::new(), targets }
    }

    fn apply_change(&mut self, change: RuleChange) {
        match change {
            RuleChange::Upserted(rule) => {
                self.rules.insert(rule.id, rule);
            }
            RuleChange::Removed(id) => {
                self.rules.remove(&id);
                self.windows.retain(|(_, rule_id), _| *rule_id != id);
                self.tracked.retain(|(_, rule_id), _| *rule_id != id);
            }
        }
    }

    async fn target_matches(&self, target_id: Uuid, rule: &AlertRule) -> bool {
        if rule.target_labels.is_empty() {
            return true;
        }
        match self.targets.get(target_id).await {
            Ok(target) => {
                rule.target_labels.iter().all(|(k, v)| target.labels.get(k) == Some(v))
            }
            Err(_) => false,
        }
    }

    async fn handle_sample(&mut self, sample: Sample) -> Vec<AlertTransition> {
        let mut matching: Vec<Arc<AlertRule>> = self
            .rules
            .values()
            .filter(|r| r.enabled && r.metric == sample.metric)
            .cloned()
            .collect();
        // Deterministic order so, when more than one rule matches the same
        // sample, transitions are always emitted highest-severity-first and
        // ties break on rule id rather than HashMap iteration order.
        matching.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.id.cmp(&b.id)));

        let mut transitions = Vec::new();
        for rule in matching {
            if !self.target_matches(sample.target_id, &rule).await {
                continue;
            }
            let key = (sample.target_id, rule.id);
            let window = self.windows.entry(key).or_insert_with(|| Window::new(rule.window_secs));
            window.push(sample.timestamp, sample.value);
            let Some(reduced) = window.reduce(rule.reducer, rule.sample_threshold) else {
                continue;
            };
            let tracked = self.tracked.entry(key).or_default();
            if let Some(transition) =
                tracked.evaluate(&rule, sample.target_id, reduced, sample.timestamp)
            {
                transitions.push(transition);
            }
        }
        transitions
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Sweep every tracked alert for staleness: a `Firing` alert whose rule
    /// hasn't seen a sample in `STALE_WINDOW_MULTIPLE * window_secs` moves
    /// to `Stale`. Rules deleted out from under a tracked entry are simply
    /// skipped — `apply_change` already tore down that entry's state.
    fn check_stale(&mut self, now: DateTime<Utc>) -> Vec<AlertTransition> {
        let mut transitions = Vec::new();
        for ((target_id, rule_id), tracked) in self.tracked.iter_mut() {
            let Some(rule) = self.rules.get(rule_id) else { continue };
            let max_silence = chrono::Duration::seconds(STALE_WINDOW_MULTIPLE * rule.window_secs as i64);
            if let Some(transition) = tracked.check_stale(rule, *target_id, now, max_silence) {
                transitions.push(transition);
            }
        }
        transitions
    }
}

/// Spawn a shard's run loop: consumes samples from `sample_rx` and rule
/// changes from `rule_changes`, emits transitions on `transitions_tx`.
const STALE_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15);

pub fn spawn_shard(
    mut shard: Shard,
    mut sample_rx: mpsc::Receiver<Sample>,
    mut rule_changes: broadcast::Receiver<RuleChange>,
    transitions_tx: mpsc::Sender<AlertTransition>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    tokio::spawn(async move {
        let mut stale_sweep = tokio::time::interval(STALE_SWEEP_INTERVAL);
        stale_sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                change = rule_changes.recv() => {
                    match change {
                        Ok(change) => shard.apply_change(change),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(shard = shard.id, missed = n, "evaluator shard lagged on rule changes");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                sample = sample_rx.recv() => {
                    let Some(sample) = sample else { break };
                    for transition in shard.handle_sample(sample).await {
                        if transitions_tx.send(transition).await.is_err() {
                            break;
                        }
                    }
                }
                _ = stale_sweep.tick() => {
                    for transition in shard.check_stale(crate::time_util::now()) {
                        if transitions_tx.send(transition).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{Comparator, Reducer, Severity};
    use crate::time_util::now;

    fn rule() -> Arc<AlertRule> {
        let ts = now();
        Arc::new(AlertRule {
            id: Uuid::new_v4(),
            name: "high cpu".into(),
            metric: "cpu.load1".into(),
            target_labels: Default::default(),
            window_secs: 60,
            reducer: Reducer::Last,
            sample_threshold: None,
            comparator: Comparator::GreaterThan,
            threshold: 0.9,
            persistence_secs: 0,
            cooldown_secs: 60,
            severity: Severity::Critical,
            channels: vec![],
            enabled: true,
            created_at: ts,
            updated_at: ts,
        })
    }

    #[tokio::test]
    async fn sample_above_threshold_fires_on_unlabeled_rule() {
        let targets = Arc::new(TargetRegistry::new());
        let mut shard = Shard::new(0, targets);
        let rule = rule();
        shard.apply_change(RuleChange::Upserted(Arc::clone(&rule)));

        let target_id = Uuid::new_v4();
        let sample = Sample {
            agent_id: Uuid::new_v4(),
            target_id,
            metric: "cpu.load1".into(),
            value: 0.95,
            timestamp: now(),
        };
        let transitions = shard.handle_sample(sample).await;
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].rule_id, rule.id);
    }

    #[tokio::test]
    async fn rule_removal_clears_its_state() {
        let targets = Arc::new(TargetRegistry::new());
        let mut shard = Shard::new(0, targets);
        let rule = rule();
        shard.apply_change(RuleChange::Upserted(Arc::clone(&rule)));
        let sample = Sample {
            agent_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            metric: "cpu.load1".into(),
            value: 0.95,
            timestamp: now(),
        };
        shard.handle_sample(sample).await;
        assert_eq!(shard.tracked_count(), 1);

        shard.apply_change(RuleChange::Removed(rule.id));
        assert_eq!(shard.tracked_count(), 0);
    }

    #[tokio::test]
    async fn matching_rules_fire_highest_severity_first() {
        let targets = Arc::new(TargetRegistry::new());
        let mut shard = Shard::new(0, targets);
        let ts = now();
        let warning = Arc::new(AlertRule {
            id: Uuid::new_v4(),
            name: "cpu warning".into(),
            metric: "cpu.load1".into(),
            target_labels: Default::default(),
            window_secs: 60,
            reducer: Reducer::Last,
            sample_threshold: None,
            comparator: Comparator::GreaterThan,
            threshold: 0.5,
            persistence_secs: 0,
            cooldown_secs: 60,
            severity: Severity::Warning,
            channels: vec![],
            enabled: true,
            created_at: ts,
            updated_at: ts,
        });
        let critical = rule();
        shard.apply_change(RuleChange::Upserted(Arc::clone(&warning)));
        shard.apply_change(RuleChange::Upserted(Arc::clone(&critical)));

        let sample = Sample {
            agent_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            metric: "cpu.load1".into(),
            value: 0.95,
            timestamp: now(),
        };
        let transitions = shard.handle_sample(sample).await;
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].rule_id, critical.id);
        assert_eq!(transitions[1].rule_id, warning.id);
    }

    #[tokio::test]
    async fn non_matching_metric_is_ignored() {
        let targets = Arc::new(TargetRegistry::new());
        let mut shard = Shard::new(0, targets);
        shard.apply_change(RuleChange::Upserted(rule()));
        let sample = Sample {
            agent_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            metric: "mem.used_bytes".into(),
            value: 0.95,
            timestamp: now(),
        };
        assert!(shard.handle_sample(sample).await.is_empty());
    }
}
