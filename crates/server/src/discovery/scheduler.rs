// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs discovery jobs against a pool of probes. Concurrency is capped two
//! ways at once: a global semaphore shared across every job so one large
//! job can't starve the others, and a per-job semaphore bounding how many
//! of *that* job's targets are in flight concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::job::{DiscoveryJob, DiscoveryResult, JobStatus, Protocol};
use super::probe::{BannerProbe, HttpGetProbe, Probe, TcpConnectProbe};
use super::store::DiscoveryStore;
use crate::agents::AgentRegistry;
use crate::auth::{ApiKeyScope, CredentialStore, MintApiKeyRequest, Role};
use crate::registry::{TargetKind, TargetRegistry};
use crate::time_util::now;

fn probe_for(protocol: Protocol, client: reqwest::Client) -> Arc<dyn Probe> {
    match protocol {
        Protocol::Tcp => Arc::new(TcpConnectProbe),
        Protocol::Http => Arc::new(HttpGetProbe::new(client)),
        Protocol::Ssh => Arc::new(BannerProbe::ssh()),
        Protocol::Mysql => Arc::new(BannerProbe::mysql()),
        Protocol::Postgres => Arc::new(BannerProbe::postgres()),
        Protocol::Redis => Arc::new(BannerProbe::redis()),
        Protocol::Kafka => Arc::new(BannerProbe::kafka()),
        Protocol::Rabbitmq => Arc::new(BannerProbe::rabbitmq()),
        Protocol::Elasticsearch => Arc::new(BannerProbe::elasticsearch()),
    }
}

fn target_kind_for(protocol: Protocol, service_kind: Option<&str>) -> Option<TargetKind> {
    match protocol {
        Protocol::Mysql => Some(TargetKind::DbMysql),
        Protocol::Postgres => Some(TargetKind::DbPostgres),
        Protocol::Redis => Some(TargetKind::DbRedis),
        Protocol::Kafka => Some(TargetKind::BrokerKafka),
        Protocol::Rabbitmq => Some(TargetKind::BrokerRabbit),
        Protocol::Elasticsearch => Some(TargetKind::SearchEs),
        Protocol::Http => Some(TargetKind::WebServer),
        Protocol::Ssh => Some(TargetKind::Host),
        Protocol::Tcp if service_kind.is_some() => Some(TargetKind::GenericService),
        Protocol::Tcp => None,
    }
}

/// Dispatches discovery jobs onto a bounded worker pool.
pub struct DiscoveryScheduler {
    store: Arc<DiscoveryStore>,
    targets: Arc<TargetRegistry>,
    agents: Arc<AgentRegistry>,
    credentials: Arc<CredentialStore>,
    client: reqwest::Client,
    global_permits: Arc<Semaphore>,
    job_tokens: tokio::sync::Mutex<HashMap<Uuid, CancellationToken>>,
}

impl DiscoveryScheduler {
    pub fn new(
        store: Arc<DiscoveryStore>,
        targets: Arc<TargetRegistry>,
        agents: Arc<AgentRegistry>,
        credentials: Arc<CredentialStore>,
        global_concurrency_cap: usize,
    ) -> Self {
        Self {
            store,
            targets,
            agents,
            credentials,
            client: reqwest::Client::new(),
            global_permits: Arc::new(Semaphore::new(global_concurrency_cap)),
            job_tokens: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Cancel an in-progress job. Already-dispatched probes still finish;
    /// no new ones are started for this job after this call.
    pub async fn cancel(&self, job_id: Uuid) {
        if let Some(token) = self.job_tokens.lock().await.get(&job_id) {
            token.cancel();
        }
    }

    /// Run (or resume, after a crash) a job to completion. Targets already
    /// recorded in the store are skipped, so calling this twice for the
    /// same job id is safe.
    pub async fn run_job(&self, job: DiscoveryJob) {
        let token = CancellationToken::new();
        self.job_tokens.lock().await.insert(job.id, token.clone());
        self.store.set_status(job.id, JobStatus::Running).await;

        let remaining = self.store.remaining_targets(&job).await;
        let job_permits = Arc::new(Semaphore::new(job.concurrency.max(1)));
        let timeout = Duration::from_millis(job.timeout_ms);

        let mut handles = Vec::with_capacity(remaining.len());
        for target in remaining {
            if token.is_cancelled() {
                break;
            }
            let global = Arc::clone(&self.global_permits);
            let job_sem = Arc::clone(&job_permits);
            let probe = probe_for(target.protocol, self.client.clone());
            let store = Arc::clone(&self.store);
            let targets = Arc::clone(&self.targets);
            let agents = Arc::clone(&self.agents);
            let credentials = Arc::clone(&self.credentials);
            let job_id = job.id;
            let auto_monitor = job.auto_monitor;
            let cancel = token.clone();

            handles.push(tokio::spawn(async move {
                let _global_permit = match global.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                let _job_permit = match job_sem.acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                if cancel.is_cancelled() {
                    return;
                }

                let outcome = probe.probe(&target.address, target.port, timeout).await;
                let result = DiscoveryResult {
                    job_id,
                    address: target.address.clone(),
                    port: target.port,
                    protocol: target.protocol,
                    reachable: outcome.reachable,
                    service_kind: outcome.service_kind.clone(),
                    evidence: outcome.evidence,
                    error: outcome.error,
                    probed_at: now(),
                };
                store.record_result(result).await;

                if outcome.reachable {
                    if let Some(kind) = target_kind_for(target.protocol, outcome.service_kind.as_deref()) {
                        let address = format!("{}:{}", target.address, target.port);
                        let registered = targets.upsert_target(kind, address.clone(), HashMap::new(), Some(job_id)).await;
                        let target_id = registered.read().await.id;

                        if auto_monitor && !agents.owns_target(target_id).await {
                            // The minted secret is never surfaced again; an
                            // operator installing the collector on this
                            // target revokes this key and mints a fresh one
                            // via POST /api/v1/apikeys.
                            let mint_req = MintApiKeyRequest::new(
                                format!("discovery-auto:{address}"),
                                Role::Agent,
                                vec![ApiKeyScope::Ingest],
                            );
                            let (_, key_record) = credentials.mint_api_key(mint_req).await;
                            let agent_id = Uuid::new_v4();
                            let agent = agents
                                .pre_register(agent_id, kind, target_id, key_record.id, "unknown".into(), 30)
                                .await;
                            tracing::info!(target = %address, agent_id = %agent.id, "auto-monitor bound a pending agent");
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        self.job_tokens.lock().await.remove(&job.id);
        let final_status = if token.is_cancelled() { JobStatus::Cancelled } else { JobStatus::Completed };
        self.store.set_status(job.id, final_status).await;
    }
}
