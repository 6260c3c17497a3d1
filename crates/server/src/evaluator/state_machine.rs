// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-(rule, target) alert state tracking.
//!
//! `Ok -> Pending -> Firing` once a continuously-breaching condition has
//! persisted for `rule.persistence_secs`, `Firing / Pending -> Ok` the
//! moment a single evaluation stops breaching. `Firing -> Stale` is driven
//! separately, by [`Shard::check_stale`](super::shard::Shard::check_stale)
//! rather than this method, since it fires on the *absence* of a sample.
//! Notification cooldown/dedup is a separate concern, handled downstream
//! by the dispatcher — this only tracks whether the condition is true.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::transition::{AlertState, AlertTransition, TransitionKind};
use crate::rules::model::AlertRule;

#[derive(Debug, Clone)]
pub struct TrackedAlert {
    state: AlertState,
    /// Wall-clock time the current unbroken run of breaching samples
    /// started. Cleared the instant a sample stops breaching.
    pending_since: Option<DateTime<Utc>>,
    last_value: Option<f64>,
    pub(super) last_sample_at: Option<DateTime<Utc>>,
}

impl Default for TrackedAlert {
    fn default() -> Self {
        Self { state: AlertState::Ok, pending_since: None, last_value: None, last_sample_at: None }
    }
}

impl TrackedAlert {
    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Feed one reduced value through the state machine, returning a
    /// transition if the state changed.
    pub fn evaluate(
        &mut self,
        rule: &Arc<AlertRule>,
        target_id: Uuid,
        value: f64,
        at: DateTime<Utc>,
    ) -> Option<AlertTransition> {
        self.last_value = Some(value);
        self.last_sample_at = Some(at);
        let breach = rule.comparator.evaluate(value, rule.threshold);

        let next = if breach {
            let since = *self.pending_since.get_or_insert(at);
            if (at - since).num_seconds() >= rule.persistence_secs {
                AlertState::Firing
            } else {
                AlertState::Pending
            }
        } else {
            self.pending_since = None;
            AlertState::Ok
        };

        // A stale alert that starts breaching again re-enters the normal
        // pending/firing progression rather than snapping straight back to
        // firing just because it was firing before it went stale.
        if next == self.state && self.state != AlertState::Stale {
            return None;
        }

        let from = self.state;
        self.state = next;
        Some(AlertTransition {
            rule_id: rule.id,
            target_id,
            from,
            to: next,
            kind: TransitionKind::for_states(next),
            severity: rule.severity,
            value: Some(value),
            at,
            rule_snapshot: Arc::clone(rule),
        })
    }

    /// Called by the shard's periodic sweep, never by `evaluate`. Moves a
    /// `Firing` alert to `Stale` once `now - last_sample_at` has exceeded
    /// `max_silence`; a no-op for every other state.
    pub fn check_stale(
        &mut self,
        rule: &Arc<AlertRule>,
        target_id: Uuid,
        now: DateTime<Utc>,
        max_silence: chrono::Duration,
    ) -> Option<AlertTransition> {
        if self.state != AlertState::Firing {
            return None;
        }
        let Some(last_sample_at) = self.last_sample_at else { return None };
        if now - last_sample_at < max_silence {
            return None;
        }
        let from = self.state;
        self.state = AlertState::Stale;
        Some(AlertTransition {
            rule_id: rule.id,
            target_id,
            from,
            to: AlertState::Stale,
            kind: TransitionKind::Stale,
            severity: rule.severity,
            value: self.last_value,
            at: now,
            rule_snapshot: Arc::clone(rule),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{Comparator, Reducer, Severity};
    use crate::time_util::now;

    fn rule(persistence_secs: i64) -> Arc<AlertRule> {
        let ts = now();
        Arc::new(AlertRule {
            id: Uuid::new_v4(),
            name: "high cpu".into(),
            metric: "cpu.load1".into(),
            target_labels: Default::default(),
            window_secs: 60,
            reducer: Reducer::Avg,
            sample_threshold: None,
            comparator: Comparator::GreaterThan,
            threshold: 0.9,
            persistence_secs,
            cooldown_secs: 300,
            severity: Severity::Warning,
            channels: vec![],
            enabled: true,
            created_at: ts,
            updated_at: ts,
        })
    }

    #[test]
    fn single_breach_goes_pending_not_firing() {
        let rule = rule(300);
        let mut tracked = TrackedAlert::default();
        let target_id = Uuid::new_v4();
        let transition = tracked.evaluate(&rule, target_id, 0.95, now()).expect("state changed");
        assert_eq!(transition.to, AlertState::Pending);
    }

    #[test]
    fn fires_once_persistence_duration_elapses() {
        let rule = rule(60);
        let mut tracked = TrackedAlert::default();
        let target_id = Uuid::new_v4();
        let start = now();
        tracked.evaluate(&rule, target_id, 0.95, start);
        tracked.evaluate(&rule, target_id, 0.96, start + chrono::Duration::seconds(30));
        let transition = tracked
            .evaluate(&rule, target_id, 0.97, start + chrono::Duration::seconds(61))
            .expect("state changed");
        assert_eq!(transition.to, AlertState::Firing);
    }

    #[test]
    fn a_burst_of_samples_within_the_window_does_not_fire_early() {
        let rule = rule(300);
        let mut tracked = TrackedAlert::default();
        let target_id = Uuid::new_v4();
        let start = now();
        for i in 0..5 {
            tracked.evaluate(&rule, target_id, 0.95, start + chrono::Duration::milliseconds(i));
        }
        assert_eq!(tracked.state(), AlertState::Pending);
    }

    #[test]
    fn recovers_to_ok_immediately() {
        let rule = rule(0);
        let mut tracked = TrackedAlert::default();
        let target_id = Uuid::new_v4();
        tracked.evaluate(&rule, target_id, 0.95, now());
        assert_eq!(tracked.state(), AlertState::Firing);
        let transition = tracked.evaluate(&rule, target_id, 0.1, now()).expect("state changed");
        assert_eq!(transition.to, AlertState::Ok);
    }

    #[test]
    fn steady_state_emits_no_transition() {
        let rule = rule(0);
        let mut tracked = TrackedAlert::default();
        let target_id = Uuid::new_v4();
        tracked.evaluate(&rule, target_id, 0.1, now());
        assert!(tracked.evaluate(&rule, target_id, 0.2, now()).is_none());
    }

    #[test]
    fn stale_firing_alert_goes_offline_after_two_windows_of_silence() {
        let rule = rule(0);
        let mut tracked = TrackedAlert::default();
        let target_id = Uuid::new_v4();
        let start = now();
        tracked.evaluate(&rule, target_id, 0.95, start);
        assert_eq!(tracked.state(), AlertState::Firing);

        let max_silence = chrono::Duration::seconds(2 * rule.window_secs as i64);
        assert!(tracked.check_stale(&rule, target_id, start + chrono::Duration::seconds(10), max_silence).is_none());

        let transition = tracked
            .check_stale(&rule, target_id, start + max_silence + chrono::Duration::seconds(1), max_silence)
            .expect("went stale");
        assert_eq!(transition.to, AlertState::Stale);
        assert_eq!(transition.kind, super::TransitionKind::Stale);
    }

    #[test]
    fn check_stale_is_a_no_op_outside_firing() {
        let rule = rule(300);
        let mut tracked = TrackedAlert::default();
        let target_id = Uuid::new_v4();
        let max_silence = chrono::Duration::seconds(2 * rule.window_secs as i64);
        assert!(tracked.check_stale(&rule, target_id, now() + max_silence * 10, max_silence).is_none());
    }
}
