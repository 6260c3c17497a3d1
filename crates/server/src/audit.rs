// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit log of operator and system actions.
//!
//! Writes go through a bounded channel to a single background writer task
//! — the same shape as the rest of this codebase's fan-out channels — so
//! a burst of audit-worthy actions never blocks the request handler that
//! triggered them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::time_util::now;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilter {
    fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(ref actor) = self.actor {
            if &record.actor != actor {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if &record.action != action {
                return false;
            }
        }
        if let Some(ref resource) = self.resource {
            if &record.resource != resource {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.at < since {
                return false;
            }
        }
        true
    }
}

/// Handle for enqueueing audit records. Cheap to clone.
#[derive(Clone)]
pub struct AuditWriter {
    tx: mpsc::Sender<AuditRecord>,
}

impl AuditWriter {
    /// Record an action. Logs and drops on a full queue rather than
    /// failing the caller's request — auditing a failure to audit isn't
    /// worth rejecting an otherwise-successful operator action.
    pub fn record(&self, actor: impl Into<String>, action: impl Into<String>, resource: impl Into<String>, detail: serde_json::Value) {
        let record = AuditRecord {
            id: Uuid::new_v4(),
            at: now(),
            actor: actor.into(),
            action: action.into(),
            resource: resource.into(),
            detail,
        };
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(record) {
            tracing::warn!("audit queue full, dropping record");
        }
    }
}

/// In-memory store of audit records, paged and filtered for `/audit`
/// reads. A real deployment would back this with durable storage; this
/// keeps the same bounded-retention shape the rest of the in-memory
/// persistence layer uses.
#[derive(Default)]
pub struct AuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl AuditLog {
    pub async fn page(&self, filter: &AuditFilter, offset: usize, limit: usize) -> Vec<AuditRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn export_json(&self, filter: &AuditFilter) -> Vec<AuditRecord> {
        let records = self.records.read().await;
        records.iter().filter(|r| filter.matches(r)).cloned().collect()
    }

    pub async fn export_csv(&self, filter: &AuditFilter) -> String {
        let records = self.export_json(filter).await;
        let mut out = String::from("id,at,actor,action,resource\n");
        for r in &records {
            out.push_str(&format!("{},{},{},{},{}\n", r.id, r.at.to_rfc3339(), r.actor, r.action, r.resource));
        }
        out
    }

    async fn append(&self, record: AuditRecord) {
        self.records.write().await.push(record);
    }

    pub async fn snapshot(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    /// Rebuild from a loaded checkpoint.
    pub fn restore(records: Vec<AuditRecord>) -> Self {
        Self { records: RwLock::new(records) }
    }
}

/// Spawn the background writer, returning a cheap-to-clone [`AuditWriter`]
/// handle. Drains `rx` until the channel closes (all senders dropped),
/// so graceful shutdown only needs to drop the last sender and await
/// this task to flush whatever's in flight.
pub fn spawn_audit_writer(log: Arc<AuditLog>, capacity: usize) -> (AuditWriter, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(capacity);
    let handle = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            log.append(record).await;
        }
    });
    (AuditWriter { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_is_visible_after_drain() {
        let log = Arc::new(AuditLog::default());
        let (writer, handle) = spawn_audit_writer(Arc::clone(&log), 16);
        writer.record("alice", "rule.create", "rule:123", serde_json::json!({"name": "high cpu"}));
        drop(writer);
        handle.await.expect("writer task completes");

        let page = log.page(&AuditFilter::default(), 0, 10).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].actor, "alice");
    }

    #[tokio::test]
    async fn filter_by_actor() {
        let log = Arc::new(AuditLog::default());
        let (writer, handle) = spawn_audit_writer(Arc::clone(&log), 16);
        writer.record("alice", "rule.create", "rule:1", serde_json::Value::Null);
        writer.record("bob", "rule.delete", "rule:1", serde_json::Value::Null);
        drop(writer);
        handle.await.expect("writer task completes");

        let filter = AuditFilter { actor: Some("bob".into()), ..Default::default() };
        let page = log.page(&filter, 0, 10).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].action, "rule.delete");
    }

    #[tokio::test]
    async fn csv_export_has_header_and_rows() {
        let log = Arc::new(AuditLog::default());
        let (writer, handle) = spawn_audit_writer(Arc::clone(&log), 16);
        writer.record("alice", "rule.create", "rule:1", serde_json::Value::Null);
        drop(writer);
        handle.await.expect("writer task completes");

        let csv = log.export_csv(&AuditFilter::default()).await;
        assert!(csv.starts_with("id,at,actor,action,resource\n"));
        assert_eq!(csv.lines().count(), 2);
    }
}
