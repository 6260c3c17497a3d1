// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consumes alert transitions, deduplicates/cooldowns repeat firings per
//! `(rule_id, target_id)`, and fans delivery out to every channel the
//! rule names, retrying each with exponential backoff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock, Semaphore};
use uuid::Uuid;

use super::channel::ChannelAdapter;
use crate::audit::AuditWriter;
use crate::evaluator::{AlertState, AlertTransition};
use crate::metrics::Metrics;
use crate::rules::RuleStore;
use crate::time_util::now;

const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_FACTOR: u32 = 2;
const RETRY_CAP: Duration = Duration::from_secs(60);
const MAX_ATTEMPTS: u32 = 5;

/// Registered channel adapters, keyed by the id a rule's `channels` list
/// references.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<Uuid, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: Uuid, channel: Arc<dyn ChannelAdapter>) {
        self.channels.insert(id, channel);
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<dyn ChannelAdapter>> {
        self.channels.get(&id).cloned()
    }
}

struct CooldownTracker {
    last_notified: RwLock<HashMap<(Uuid, Uuid), chrono::DateTime<chrono::Utc>>>,
}

impl CooldownTracker {
    fn new() -> Self {
        Self { last_notified: RwLock::new(HashMap::new()) }
    }

    /// Whether a notification for `(rule_id, target_id)` should go out
    /// now, given `cooldown_secs`. Firing transitions are always subject
    /// to cooldown; recoveries (`to == Ok`) and staleness notices always
    /// notify immediately so an operator isn't left thinking an alert is
    /// still active or still being observed.
    async fn should_notify(&self, transition: &AlertTransition, cooldown_secs: i64) -> bool {
        if transition.to != AlertState::Firing {
            return true;
        }
        let key = (transition.rule_id, transition.target_id);
        let mut guard = self.last_notified.write().await;
        let now = now();
        let ready = match guard.get(&key) {
            Some(last) => now - *last >= chrono::Duration::seconds(cooldown_secs),
            None => true,
        };
        if ready {
            guard.insert(key, now);
        }
        ready
    }
}

async fn deliver_with_retry(
    channel: &dyn ChannelAdapter,
    transition: &AlertTransition,
    metrics: &Metrics,
    audit: &AuditWriter,
) {
    let mut attempt = 0u32;
    let mut backoff = RETRY_BASE;
    loop {
        attempt += 1;
        match channel.send(transition).await {
            Ok(()) => {
                if attempt > 1 {
                    metrics.record_channel_healthy();
                }
                return;
            }
            Err(e) => {
                tracing::warn!(
                    channel = channel.kind(),
                    attempt,
                    err = %e,
                    "notification delivery failed"
                );
                if attempt >= MAX_ATTEMPTS {
                    tracing::error!(
                        channel = channel.kind(),
                        rule_id = %transition.rule_id,
                        "giving up on notification after {attempt} attempts"
                    );
                    metrics.record_channel_unhealthy();
                    audit.record(
                        "system",
                        "notification.delivery_failed",
                        format!("rule:{} target:{}", transition.rule_id, transition.target_id),
                        serde_json::json!({
                            "channel": channel.kind(),
                            "attempts": attempt,
                            "error": e.to_string(),
                        }),
                    );
                    return;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * RETRY_FACTOR).min(RETRY_CAP);
            }
        }
    }
}

/// Spawn the dispatcher loop: reads transitions off `transitions_rx`,
/// looks up the firing rule's channels, and delivers to each with
/// cooldown/dedup applied. Delivery concurrency across all channels is
/// capped at `workers` permits, so a slow or wedged channel adapter can't
/// let an unbounded number of retry loops pile up.
pub fn spawn_dispatcher(
    mut transitions_rx: mpsc::Receiver<AlertTransition>,
    rule_store: Arc<RuleStore>,
    channels: Arc<ChannelRegistry>,
    metrics: Arc<Metrics>,
    audit: AuditWriter,
    workers: usize,
    shutdown: tokio_util::sync::CancellationToken,
) {
    let cooldowns = Arc::new(CooldownTracker::new());
    let permits = Arc::new(Semaphore::new(workers.max(1)));

    tokio::spawn(async move {
        loop {
            let transition = tokio::select! {
                _ = shutdown.cancelled() => break,
                t = transitions_rx.recv() => match t {
                    Some(t) => t,
                    None => break,
                },
            };

            let Ok(rule) = rule_store.get(transition.rule_id).await else {
                tracing::debug!(rule_id = %transition.rule_id, "transition for a since-deleted rule, dropping");
                continue;
            };

            if !cooldowns.should_notify(&transition, rule.cooldown_secs).await {
                continue;
            }

            for channel_id in &rule.channels {
                let Some(channel) = channels.get(*channel_id) else {
                    tracing::warn!(channel_id = %channel_id, "rule references an unknown channel");
                    continue;
                };
                let transition = transition.clone();
                let permits = Arc::clone(&permits);
                let metrics = Arc::clone(&metrics);
                let audit = audit.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else { return };
                    deliver_with_retry(channel.as_ref(), &transition, &metrics, &audit).await;
                });
            }
        }
    });
}
