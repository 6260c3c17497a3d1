// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! monctl: infrastructure monitoring control plane. Agent telemetry
//! intake, threshold alerting, active discovery, and the HTTP surface
//! tying them together.

pub mod agents;
pub mod alerts;
pub mod audit;
pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod evaluator;
pub mod ingress;
pub mod metrics;
pub mod notifications;
pub mod persistence;
pub mod registry;
pub mod rules;
pub mod state;
pub mod time_util;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::auth::store::Role;
use crate::config::ServerConfig;
use crate::notifications::ChannelRegistry;
use crate::persistence::{JsonFileStore, LoggingTsdbWriter, Store};
use crate::state::AppState;
use crate::transport::build_router;

/// Signals that the post-shutdown drain (flushing the audit log, saving the
/// final checkpoint) did not finish inside `shutdown_drain_ms`. `main`
/// downcasts for this to map it to its own exit code rather than treating it
/// like any other fatal startup error.
#[derive(Debug)]
pub struct ShutdownTimeout;

impl std::fmt::Display for ShutdownTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "graceful shutdown did not drain in time")
    }
}

impl std::error::Error for ShutdownTimeout {}

/// Run the control-plane server until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(config.state_path.clone()));
    let checkpoint = store.load_checkpoint().await?;

    let channels = match &config.notification_config_path {
        Some(path) => {
            let notif_config = crate::notifications::load_notification_config(path)?;
            Arc::new(crate::notifications::build_registry(&notif_config)?)
        }
        None => Arc::new(ChannelRegistry::new()),
    };

    let evaluator_shards = config.evaluator_shards.unwrap_or_else(|| {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
    });

    let (state, background) =
        AppState::new(config.clone(), shutdown.clone(), Arc::clone(&store), channels, evaluator_shards, checkpoint);
    let state = Arc::new(state);

    seed_bootstrap_admin(&state).await?;
    resume_interrupted_discovery_jobs(&state).await;

    crate::notifications::spawn_dispatcher(
        background.transitions_rx,
        Arc::clone(&state.rule_store),
        Arc::clone(&state.channels),
        Arc::clone(&state.metrics),
        state.audit_writer.clone(),
        state.config.alert_dispatch_workers,
        shutdown.clone(),
    );
    crate::persistence::spawn_tsdb_writer(
        Arc::new(LoggingTsdbWriter),
        background.tsdb_rx,
        shutdown.clone(),
    );
    crate::agents::spawn_health_sweep(Arc::clone(&state));
    spawn_checkpoint_loop(Arc::clone(&state), Arc::clone(&store));
    spawn_signal_handler(shutdown.clone());

    tracing::info!(%addr, "monctl listening");
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    let drain = async {
        save_checkpoint(&state, &store).await;
        background.audit_task.await
    };
    match tokio::time::timeout(state.config.shutdown_drain_deadline(), drain).await {
        Ok(join) => {
            join?;
            Ok(())
        }
        Err(_) => {
            tracing::error!("shutdown drain exceeded deadline, forcing exit");
            Err(ShutdownTimeout.into())
        }
    }
}

/// Create the configured admin account on first boot. A no-op once it
/// exists, so this is safe to run on every restart.
async fn seed_bootstrap_admin(state: &AppState) -> anyhow::Result<()> {
    if state.credentials.find_by_username(&state.config.admin_username).await.is_some() {
        return Ok(());
    }
    let hash = crate::auth::password::hash_password(&state.config.admin_password)?;
    state
        .credentials
        .create_account(state.config.admin_username.clone(), hash, Role::Operator)
        .await?;
    tracing::info!(username = %state.config.admin_username, "seeded bootstrap operator account");
    Ok(())
}

async fn save_checkpoint(state: &AppState, store: &Arc<dyn Store>) {
    let checkpoint = crate::persistence::Checkpoint {
        targets: state.targets.list(&Default::default()).await,
        rules: state.rule_store.list().await.into_iter().map(|r| (*r).clone()).collect(),
        api_keys: state.credentials.list_api_keys().await,
        alert_states: state.active_alerts.snapshot().await,
        agents: state.agents.list().await,
        discovery_jobs: state.discovery_store.list_jobs().await,
        discovery_results: state.discovery_store.all_results().await,
        audit_records: state.audit_log.snapshot().await,
    };
    if let Err(e) = store.save_checkpoint(&checkpoint).await {
        tracing::error!(err = %e, "failed to save checkpoint");
    }
}

/// A job still `Running` in a loaded checkpoint means the process crashed
/// mid-job; reset it to `Pending` and hand it back to the scheduler, which
/// resumes from `remaining_targets` rather than re-probing what already
/// completed.
async fn resume_interrupted_discovery_jobs(state: &AppState) {
    for job in state.discovery_store.list_jobs().await {
        if job.status != crate::discovery::JobStatus::Running {
            continue;
        }
        state.discovery_store.set_status(job.id, crate::discovery::JobStatus::Pending).await;
        let job = state.discovery_store.get_job(job.id).await.expect("job was just listed");
        tracing::info!(job_id = %job.id, "resuming discovery job interrupted by restart");
        let scheduler = Arc::clone(&state.discovery_scheduler);
        tokio::spawn(async move { scheduler.run_job(job).await });
    }
}

/// First SIGTERM/SIGINT cancels `shutdown`, starting the graceful drain in
/// `run`; a second one forces an immediate exit rather than waiting out
/// `shutdown_drain_ms` a second time.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                tracing::info!("received SIGTERM");
            }
            _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                tracing::info!("received SIGINT");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                tracing::info!("received signal again during drain, forcing exit");
            }
            _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                tracing::info!("received signal again during drain, forcing exit");
            }
        }
        std::process::exit(130);
    });
}

/// Periodically snapshot in-memory state to the durable store, matching
/// the documented every-30s-and-on-shutdown checkpoint cadence.
fn spawn_checkpoint_loop(state: Arc<AppState>, store: Arc<dyn Store>) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(state.config.checkpoint_interval());
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            save_checkpoint(&state, &store).await;
        }
    });
}
