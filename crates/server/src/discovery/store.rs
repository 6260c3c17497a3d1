// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use uuid::Uuid;

use super::job::{DiscoveryJob, DiscoveryResult, DiscoveryTarget, JobStatus};
use crate::error::{AppError, AppResult};
use crate::time_util::now;

type ResultKey = (Uuid, String, u16);

/// Holds discovery jobs and their results. Results are deduplicated on
/// `(job_id, address, protocol-implied-port)` so re-running a crashed
/// job's remaining targets never double-counts a probe that already
/// completed before the crash.
#[derive(Default)]
pub struct DiscoveryStore {
    jobs: RwLock<HashMap<Uuid, DiscoveryJob>>,
    results: RwLock<HashMap<Uuid, Vec<DiscoveryResult>>>,
    seen: RwLock<HashSet<ResultKey>>,
}

impl DiscoveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_job(
        &self,
        targets: Vec<DiscoveryTarget>,
        concurrency: usize,
        timeout_ms: u64,
        credentials_ref: Option<String>,
        auto_monitor: bool,
    ) -> DiscoveryJob {
        let job = DiscoveryJob {
            id: Uuid::new_v4(),
            targets,
            concurrency,
            timeout_ms,
            credentials_ref,
            auto_monitor,
            status: JobStatus::Pending,
            created_at: now(),
            started_at: None,
            finished_at: None,
        };
        self.jobs.write().await.insert(job.id, job.clone());
        job
    }

    pub async fn get_job(&self, id: Uuid) -> AppResult<DiscoveryJob> {
        self.jobs.read().await.get(&id).cloned().ok_or_else(|| AppError::NotFound("discovery job".into()))
    }

    pub async fn list_jobs(&self) -> Vec<DiscoveryJob> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn set_status(&self, id: Uuid, status: JobStatus) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            job.status = status;
            match status {
                JobStatus::Running => job.started_at.get_or_insert_with(now),
                JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed => {
                    job.finished_at.get_or_insert_with(now)
                }
                JobStatus::Pending => return,
            };
        }
    }

    /// Remaining, not-yet-probed targets for a job — what a resumed run
    /// after a crash still needs to cover.
    pub async fn remaining_targets(&self, job: &DiscoveryJob) -> Vec<DiscoveryTarget> {
        let seen = self.seen.read().await;
        job.targets
            .iter()
            .filter(|t| !seen.contains(&(job.id, t.address.clone(), t.port)))
            .cloned()
            .collect()
    }

    /// Record a result. Returns `false` without storing if this
    /// `(job_id, address, port)` was already recorded.
    pub async fn record_result(&self, result: DiscoveryResult) -> bool {
        let key = (result.job_id, result.address.clone(), result.port);
        let mut seen = self.seen.write().await;
        if !seen.insert(key) {
            return false;
        }
        drop(seen);
        self.results.write().await.entry(result.job_id).or_default().push(result);
        true
    }

    pub async fn results_for(&self, job_id: Uuid) -> Vec<DiscoveryResult> {
        self.results.read().await.get(&job_id).cloned().unwrap_or_default()
    }

    /// Every result across every job, for checkpointing.
    pub async fn all_results(&self) -> Vec<DiscoveryResult> {
        self.results.read().await.values().flatten().cloned().collect()
    }

    /// Rebuild from a loaded checkpoint. `seen` is derived from `results`
    /// rather than persisted separately, so a restored store rejects the
    /// same duplicate results a live one would.
    pub fn restore(jobs: Vec<DiscoveryJob>, results: Vec<DiscoveryResult>) -> Self {
        let mut by_job: HashMap<Uuid, Vec<DiscoveryResult>> = HashMap::new();
        let mut seen = HashSet::new();
        for result in results {
            seen.insert((result.job_id, result.address.clone(), result.port));
            by_job.entry(result.job_id).or_default().push(result);
        }
        Self {
            jobs: RwLock::new(jobs.into_iter().map(|j| (j.id, j)).collect()),
            results: RwLock::new(by_job),
            seen: RwLock::new(seen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::job::Protocol;

    #[tokio::test]
    async fn duplicate_result_is_not_recorded_twice() {
        let store = DiscoveryStore::new();
        let job = store
            .create_job(
                vec![DiscoveryTarget { address: "10.0.0.1".into(), port: 22, protocol: Protocol::Ssh }],
                4,
                1000,
                None,
                false,
            )
            .await;

        let result = DiscoveryResult {
            job_id: job.id,
            address: "10.0.0.1".into(),
            port: 22,
            protocol: Protocol::Ssh,
            reachable: true,
            service_kind: Some("ssh".into()),
            evidence: None,
            error: None,
            probed_at: now(),
        };
        assert!(store.record_result(result.clone()).await);
        assert!(!store.record_result(result).await);
        assert_eq!(store.results_for(job.id).await.len(), 1);
    }

    #[tokio::test]
    async fn remaining_targets_excludes_already_probed() {
        let store = DiscoveryStore::new();
        let job = store
            .create_job(
                vec![
                    DiscoveryTarget { address: "10.0.0.1".into(), port: 22, protocol: Protocol::Ssh },
                    DiscoveryTarget { address: "10.0.0.2".into(), port: 22, protocol: Protocol::Ssh },
                ],
                4,
                1000,
                None,
                false,
            )
            .await;
        store
            .record_result(DiscoveryResult {
                job_id: job.id,
                address: "10.0.0.1".into(),
                port: 22,
                protocol: Protocol::Ssh,
                reachable: true,
                service_kind: None,
                evidence: None,
                error: None,
                probed_at: now(),
            })
            .await;

        let remaining = store.remaining_targets(&job).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].address, "10.0.0.2");
    }
}
