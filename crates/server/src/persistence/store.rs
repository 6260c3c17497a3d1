// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The checkpoint seam: a narrow async trait standing in for whatever
//! durable store a real deployment points this at (Postgres, etc). The
//! control plane's registries/rule store stay the source of truth at
//! runtime; this only persists enough to survive a restart.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of everything needed to restore control-plane
/// state after a restart. Deliberately coarse-grained (one blob, not a
/// row per entity) since checkpoints are infrequent and whole-state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub targets: Vec<crate::registry::Target>,
    pub rules: Vec<crate::rules::AlertRule>,
    pub api_keys: Vec<crate::auth::ApiKeyRecord>,
    pub alert_states: Vec<crate::alerts::ActiveAlert>,
    pub agents: Vec<crate::agents::Agent>,
    pub discovery_jobs: Vec<crate::discovery::DiscoveryJob>,
    pub discovery_results: Vec<crate::discovery::DiscoveryResult>,
    pub audit_records: Vec<crate::audit::AuditRecord>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> anyhow::Result<()>;
    async fn load_checkpoint(&self) -> anyhow::Result<Option<Checkpoint>>;
}

/// Checkpoints to a JSON file when configured with a path; otherwise
/// holds the latest checkpoint in memory only (used in tests and
/// ephemeral deployments).
pub struct JsonFileStore {
    path: Option<std::path::PathBuf>,
    last: tokio::sync::RwLock<Option<Checkpoint>>,
}

impl JsonFileStore {
    pub fn new(path: Option<std::path::PathBuf>) -> Self {
        Self { path, last: tokio::sync::RwLock::new(None) }
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> anyhow::Result<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_vec_pretty(checkpoint)?;
            tokio::fs::write(path, json).await?;
        }
        *self.last.write().await = Some(checkpoint.clone());
        Ok(())
    }

    async fn load_checkpoint(&self) -> anyhow::Result<Option<Checkpoint>> {
        if let Some(path) = &self.path {
            match tokio::fs::read(path).await {
                Ok(bytes) => return Ok(Some(serde_json::from_slice(&bytes)?)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.last.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips() {
        let store = JsonFileStore::new(None);
        let checkpoint = Checkpoint::default();
        store.save_checkpoint(&checkpoint).await.expect("saves");
        let loaded = store.load_checkpoint().await.expect("loads").expect("has a checkpoint");
        assert_eq!(loaded.targets.len(), 0);
    }

    #[tokio::test]
    async fn file_backed_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("checkpoint.json");
        let store = JsonFileStore::new(Some(path));
        store.save_checkpoint(&Checkpoint::default()).await.expect("saves");
        let loaded = store.load_checkpoint().await.expect("loads");
        assert!(loaded.is_some());
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("does-not-exist.json");
        let store = JsonFileStore::new(Some(path));
        let loaded = store.load_checkpoint().await.expect("loads");
        assert!(loaded.is_none());
    }
}
