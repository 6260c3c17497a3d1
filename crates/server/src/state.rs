// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state, threaded through every handler and background
//! task behind a single `Arc<AppState>`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agents::AgentRegistry;
use crate::alerts::ActiveAlerts;
use crate::audit::{AuditLog, AuditWriter};
use crate::auth::{self, CredentialStore};
use crate::config::{ConfigStore, ServerConfig};
use crate::discovery::{DiscoveryScheduler, DiscoveryStore};
use crate::evaluator::EvaluatorHandle;
use crate::ingress::{IngressSinks, Sample};
use crate::metrics::Metrics;
use crate::notifications::ChannelRegistry;
use crate::persistence::{Checkpoint, Store};
use crate::registry::TargetRegistry;
use crate::rules::RuleStore;

/// Everything a request handler or background task needs. Construction is
/// split from `run()` in `lib.rs`: this only wires up the pieces that don't
/// need an `Arc<AppState>` of their own (the evaluator shards, dispatcher,
/// audit writer and health sweep all take channel/registry handles
/// directly), so `AppState` itself never has to be partially initialized.
pub struct AppState {
    pub config: ServerConfig,
    pub config_store: ConfigStore,
    pub shutdown: CancellationToken,

    pub targets: Arc<TargetRegistry>,
    pub agents: Arc<AgentRegistry>,

    pub auth_issuer: auth::jwt::Issuer,
    pub credentials: Arc<CredentialStore>,

    pub rule_store: Arc<RuleStore>,
    pub evaluator: EvaluatorHandle,
    pub channels: Arc<ChannelRegistry>,
    pub active_alerts: Arc<ActiveAlerts>,

    pub audit_writer: AuditWriter,
    pub audit_log: Arc<AuditLog>,

    pub store: Arc<dyn Store>,
    pub ingress: IngressSinks,

    pub discovery_store: Arc<DiscoveryStore>,
    pub discovery_scheduler: Arc<DiscoveryScheduler>,

    pub metrics: Arc<Metrics>,
}

/// Bundle of the pieces that spawn their own background tasks, returned
/// alongside `AppState` so `run()` can hold the receiver/join handles it
/// needs for the shutdown sequence.
pub struct Background {
    /// Already replayed into `active_alerts` and the audit log; `run()`
    /// only needs to hand this to the dispatcher.
    pub transitions_rx: mpsc::Receiver<crate::evaluator::AlertTransition>,
    pub tsdb_rx: mpsc::Receiver<Sample>,
    pub audit_task: tokio::task::JoinHandle<()>,
}

impl AppState {
    /// Build all state and the channel endpoints background tasks will
    /// consume from. Does not spawn anything itself except the alert
    /// tracker (which has to own the evaluator's transition channel from
    /// the start so no transition is ever missed between construction and
    /// `run()` spawning the dispatcher); `run()` spawns the evaluator
    /// shards' counterparts — dispatcher, audit writer, TSDB writer, and
    /// health sweep — once this has returned.
    ///
    /// `checkpoint` seeds targets, rules, API keys, agents, discovery
    /// state, audit history, and in-flight alert state from a prior run if
    /// one was loaded; pass `None` for a clean start.
    pub fn new(
        config: ServerConfig,
        shutdown: CancellationToken,
        store: Arc<dyn Store>,
        channels: Arc<ChannelRegistry>,
        evaluator_shard_count: usize,
        checkpoint: Option<Checkpoint>,
    ) -> (Self, Background) {
        let checkpoint = checkpoint.unwrap_or_default();
        let Checkpoint {
            targets: restored_targets,
            rules: restored_rules,
            api_keys: restored_keys,
            alert_states: restored_alerts,
            agents: restored_agents,
            discovery_jobs: restored_jobs,
            discovery_results: restored_results,
            audit_records: restored_audit,
        } = checkpoint;

        let targets = Arc::new(TargetRegistry::restore(restored_targets));
        let agents = Arc::new(AgentRegistry::restore(restored_agents));
        let rule_store = Arc::new(RuleStore::restore(restored_rules));
        let credentials = Arc::new(CredentialStore::restore(restored_keys));
        let auth_issuer =
            auth::jwt::Issuer::new(&config.jwt_secret, config.access_token_ttl_secs, config.refresh_token_ttl_secs);

        let (evaluator, transitions_rx) = crate::evaluator::spawn_evaluator(
            evaluator_shard_count,
            Arc::clone(&rule_store),
            Arc::clone(&targets),
            shutdown.clone(),
        );

        let (tsdb_tx, tsdb_rx) = mpsc::channel(config.ingress_queue_capacity);
        let ingress = IngressSinks { evaluator: evaluator.clone(), tsdb_tx };

        let audit_log = Arc::new(AuditLog::restore(restored_audit));
        let (audit_writer, audit_task) =
            crate::audit::spawn_audit_writer(Arc::clone(&audit_log), config.audit_queue_capacity);

        let active_alerts = Arc::new(ActiveAlerts::restore(restored_alerts));
        let transitions_rx = crate::alerts::spawn_alert_tracker(
            transitions_rx,
            Arc::clone(&active_alerts),
            audit_writer.clone(),
            shutdown.clone(),
        );

        let discovery_store = Arc::new(DiscoveryStore::restore(restored_jobs, restored_results));
        let discovery_scheduler = Arc::new(DiscoveryScheduler::new(
            Arc::clone(&discovery_store),
            Arc::clone(&targets),
            Arc::clone(&agents),
            Arc::clone(&credentials),
            config.discovery_global_concurrency_cap,
        ));

        let config_store = ConfigStore::new();
        let metrics = Arc::new(Metrics::new());

        let state = Self {
            config,
            config_store,
            shutdown,
            targets,
            agents,
            auth_issuer,
            credentials,
            rule_store,
            evaluator,
            channels,
            active_alerts,
            audit_writer,
            audit_log,
            store,
            ingress,
            discovery_store,
            discovery_scheduler,
            metrics,
        };

        (state, Background { transitions_rx, tsdb_rx, audit_task })
    }
}
