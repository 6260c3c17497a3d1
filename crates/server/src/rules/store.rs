// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::model::AlertRule;
use crate::error::{AppError, AppResult};
use crate::time_util::now;

/// A rule change, broadcast so evaluator shards can pick up new/updated/
/// removed rules without polling the store on every evaluation tick.
#[derive(Debug, Clone)]
pub enum RuleChange {
    Upserted(Arc<AlertRule>),
    Removed(Uuid),
}

/// CRUD store for alert rules. Reads hand back `Arc<AlertRule>` snapshots
/// (the store's internal map is copy-on-write at the entry level, not the
/// whole map) so evaluator shards can hold a rule across an `.await` point
/// without contending with a writer.
pub struct RuleStore {
    rules: RwLock<HashMap<Uuid, Arc<AlertRule>>>,
    changes: broadcast::Sender<RuleChange>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self { rules: RwLock::new(HashMap::new()), changes }
    }

    /// Rebuild from a loaded checkpoint. Evaluator shards subscribe after
    /// this runs (at startup, before any sample arrives), so there's no
    /// change to broadcast here.
    pub fn restore(rules: Vec<AlertRule>) -> Self {
        let (changes, _) = broadcast::channel(256);
        let map = rules.into_iter().map(|r| (r.id, Arc::new(r))).collect();
        Self { rules: RwLock::new(map), changes }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuleChange> {
        self.changes.subscribe()
    }

    pub async fn create(&self, mut rule: AlertRule) -> AppResult<Arc<AlertRule>> {
        rule.validate()?;
        let ts = now();
        rule.created_at = ts;
        rule.updated_at = ts;
        let rule = Arc::new(rule);
        self.rules.write().await.insert(rule.id, Arc::clone(&rule));
        let _ = self.changes.send(RuleChange::Upserted(Arc::clone(&rule)));
        Ok(rule)
    }

    pub async fn update(&self, id: Uuid, mut rule: AlertRule) -> AppResult<Arc<AlertRule>> {
        rule.validate()?;
        let mut rules = self.rules.write().await;
        let existing = rules.get(&id).ok_or_else(|| AppError::NotFound("alert rule".into()))?;
        rule.id = id;
        rule.created_at = existing.created_at;
        rule.updated_at = now();
        let rule = Arc::new(rule);
        rules.insert(id, Arc::clone(&rule));
        drop(rules);
        let _ = self.changes.send(RuleChange::Upserted(Arc::clone(&rule)));
        Ok(rule)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Arc<AlertRule>> {
        self.rules
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("alert rule".into()))
    }

    pub async fn list(&self) -> Vec<Arc<AlertRule>> {
        self.rules.read().await.values().cloned().collect()
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let removed = self.rules.write().await.remove(&id);
        if removed.is_none() {
            return Err(AppError::NotFound("alert rule".into()));
        }
        let _ = self.changes.send(RuleChange::Removed(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{Comparator, Reducer, Severity};

    fn draft_rule(name: &str) -> AlertRule {
        let ts = now();
        AlertRule {
            id: Uuid::new_v4(),
            name: name.into(),
            metric: "cpu.load1".into(),
            target_labels: Default::default(),
            window_secs: 60,
            reducer: Reducer::Avg,
            sample_threshold: None,
            comparator: Comparator::GreaterThan,
            threshold: 0.9,
            persistence_secs: 0,
            cooldown_secs: 60,
            severity: Severity::Warning,
            channels: vec![],
            enabled: true,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn create_broadcasts_an_upsert() {
        let store = RuleStore::new();
        let mut changes = store.subscribe();
        let created = store.create(draft_rule("high cpu")).await.expect("creates");
        match changes.try_recv().expect("has a change") {
            RuleChange::Upserted(rule) => assert_eq!(rule.id, created.id),
            RuleChange::Removed(_) => panic!("expected an upsert"),
        }
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let store = RuleStore::new();
        let created = store.create(draft_rule("high cpu")).await.expect("creates");
        let mut updated_rule = (*created).clone();
        updated_rule.threshold = 0.95;
        let updated = store.update(created.id, updated_rule).await.expect("updates");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.threshold, 0.95);
    }

    #[tokio::test]
    async fn delete_removes_and_broadcasts() {
        let store = RuleStore::new();
        let created = store.create(draft_rule("high cpu")).await.expect("creates");
        let mut changes = store.subscribe();
        store.delete(created.id).await.expect("deletes");
        assert!(store.get(created.id).await.is_err());
        match changes.try_recv().expect("has a change") {
            RuleChange::Removed(id) => assert_eq!(id, created.id),
            RuleChange::Upserted(_) => panic!("expected a removal"),
        }
    }
}
