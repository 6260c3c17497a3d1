// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::time_util::now;

/// The kind of entity a [`Target`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Host,
    DbMysql,
    DbPostgres,
    DbRedis,
    BrokerKafka,
    BrokerRabbit,
    SearchEs,
    ContainerRuntime,
    WebServer,
    VmHost,
    GenericService,
}

/// Coarse health status of a target, driven by sample ingress / discovery
/// with hysteresis: a single missed heartbeat never flips `online` straight
/// to `offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Unknown,
    Online,
    Degraded,
    Offline,
}

/// A monitored entity: host, database instance, broker, service, etc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub kind: TargetKind,
    pub address: String,
    pub labels: HashMap<String, String>,
    pub status: TargetStatus,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub discovered_by: Option<Uuid>,
    pub owner_account: Option<Uuid>,
    /// Soft-delete flag. Never cleared; (kind, address) stays reservable
    /// only while `deleted` is false.
    pub deleted: bool,
}

/// Where a target upsert originated, for audit/observability purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOrigin {
    Operator,
    Discovery,
}

#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    pub kind: Option<TargetKind>,
    pub status: Option<TargetStatus>,
    pub label: Option<(String, String)>,
    pub include_deleted: bool,
}

/// Canonical inventory of monitored targets, keyed by `(kind, address)`
/// while not soft-deleted.
///
/// Re-registering an existing `(kind, address)` updates the row in place
/// (merging labels, bumping `last_seen`) instead of minting a new id, so
/// references held by agents/rules stay valid.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: RwLock<HashMap<Uuid, Arc<RwLock<Target>>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self { targets: RwLock::new(HashMap::new()) }
    }

    /// Rebuild from a loaded checkpoint, preserving original ids so agents
    /// and rules that reference them don't need to re-resolve anything
    /// after a restart.
    pub fn restore(targets: Vec<Target>) -> Self {
        let map = targets.into_iter().map(|t| (t.id, Arc::new(RwLock::new(t)))).collect();
        Self { targets: RwLock::new(map) }
    }

    /// Idempotent upsert keyed on `(kind, address)`. The caller's labels
    /// override on conflict; `last_seen` is always bumped to now.
    pub async fn upsert_target(
        &self,
        kind: TargetKind,
        address: String,
        labels: HashMap<String, String>,
        discovered_by: Option<Uuid>,
    ) -> Arc<RwLock<Target>> {
        let existing = {
            let targets = self.targets.read().await;
            let mut found = None;
            for entry in targets.values() {
                let t = entry.read().await;
                if t.kind == kind && t.address == address && !t.deleted {
                    found = Some(Arc::clone(entry));
                    break;
                }
            }
            found
        };

        if let Some(entry) = existing {
            let mut t = entry.write().await;
            t.labels.extend(labels);
            t.last_seen = now();
            if discovered_by.is_some() {
                t.discovered_by = discovered_by;
            }
            drop(t);
            return entry;
        }

        let ts = now();
        let target = Target {
            id: Uuid::new_v4(),
            kind,
            address,
            labels,
            status: TargetStatus::Unknown,
            first_seen: ts,
            last_seen: ts,
            discovered_by,
            owner_account: None,
            deleted: false,
        };
        let entry = Arc::new(RwLock::new(target));
        let id = entry.read().await.id;
        self.targets.write().await.insert(id, Arc::clone(&entry));
        entry
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Target> {
        let targets = self.targets.read().await;
        let entry = targets.get(&id).ok_or_else(|| AppError::NotFound("target".into()))?;
        Ok(entry.read().await.clone())
    }

    pub async fn list(&self, filter: &TargetFilter) -> Vec<Target> {
        let targets = self.targets.read().await;
        let mut out = Vec::new();
        for entry in targets.values() {
            let t = entry.read().await;
            if !filter.include_deleted && t.deleted {
                continue;
            }
            if let Some(kind) = filter.kind {
                if t.kind != kind {
                    continue;
                }
            }
            if let Some(status) = filter.status {
                if t.status != status {
                    continue;
                }
            }
            if let Some((ref key, ref value)) = filter.label {
                if t.labels.get(key) != Some(value) {
                    continue;
                }
            }
            out.push(t.clone());
        }
        out
    }

    /// Transition a target's status. Monotonic hysteresis (e.g. a single
    /// missed heartbeat not flipping online->offline) is enforced by the
    /// caller (sample ingress / agent health sweep), not here — this is the
    /// narrow write primitive both call into.
    pub async fn mark_status(&self, id: Uuid, status: TargetStatus, reason: &str) -> AppResult<()> {
        let targets = self.targets.read().await;
        let entry = targets.get(&id).ok_or_else(|| AppError::NotFound("target".into()))?;
        let mut t = entry.write().await;
        tracing::debug!(target_id = %id, ?status, reason, "target status changed");
        t.status = status;
        Ok(())
    }

    pub async fn soft_delete(&self, id: Uuid) -> AppResult<()> {
        let targets = self.targets.read().await;
        let entry = targets.get(&id).ok_or_else(|| AppError::NotFound("target".into()))?;
        entry.write().await.deleted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_merges_labels() {
        let registry = TargetRegistry::new();
        let first = registry
            .upsert_target(TargetKind::Host, "10.0.0.1:22".into(), labels(&[("env", "prod")]), None)
            .await;
        let first_id = first.read().await.id;

        let second = registry
            .upsert_target(TargetKind::Host, "10.0.0.1:22".into(), labels(&[("rack", "a1")]), None)
            .await;
        let second_id = second.read().await.id;

        assert_eq!(first_id, second_id);
        let merged = registry.get(first_id).await.expect("target exists");
        assert_eq!(merged.labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(merged.labels.get("rack").map(String::as_str), Some("a1"));

        let all = registry.list(&TargetFilter::default()).await;
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn soft_delete_excluded_from_default_list() {
        let registry = TargetRegistry::new();
        let entry = registry
            .upsert_target(TargetKind::DbRedis, "10.0.0.2:6379".into(), HashMap::new(), None)
            .await;
        let id = entry.read().await.id;
        registry.soft_delete(id).await.expect("exists");

        let visible = registry.list(&TargetFilter::default()).await;
        assert!(visible.is_empty());

        let mut filter = TargetFilter::default();
        filter.include_deleted = true;
        let all = registry.list(&filter).await;
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn mark_status_updates_target() {
        let registry = TargetRegistry::new();
        let entry = registry
            .upsert_target(TargetKind::Host, "10.0.0.3:22".into(), HashMap::new(), None)
            .await;
        let id = entry.read().await.id;
        registry.mark_status(id, TargetStatus::Online, "first heartbeat").await.expect("exists");
        let updated = registry.get(id).await.expect("exists");
        assert_eq!(updated.status, TargetStatus::Online);
    }
}
