// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot-time configuration, plus the runtime `ConfigStore` the `/config/*`
//! endpoints read and write.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration for the control-plane server.
#[derive(Debug, Clone, clap::Args)]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "MONCTL_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8900, env = "MONCTL_PORT")]
    pub port: u16,

    /// Signing secret for issued access/refresh JWTs.
    #[arg(long, env = "MONCTL_JWT_SECRET", default_value = "dev-only-insecure-secret")]
    pub jwt_secret: String,

    /// Access token TTL in seconds.
    #[arg(long, default_value_t = 3600, env = "MONCTL_ACCESS_TOKEN_TTL_SECS")]
    pub access_token_ttl_secs: i64,

    /// Refresh token TTL in seconds.
    #[arg(long, default_value_t = 30 * 24 * 3600, env = "MONCTL_REFRESH_TOKEN_TTL_SECS")]
    pub refresh_token_ttl_secs: i64,

    /// How far into the past an accepted sample timestamp may fall.
    #[arg(long, default_value_t = 600, env = "MONCTL_INGEST_MAX_PAST_SECS")]
    pub ingest_max_past_secs: i64,

    /// How far into the future an accepted sample timestamp may fall.
    #[arg(long, default_value_t = 60, env = "MONCTL_INGEST_MAX_FUTURE_SECS")]
    pub ingest_max_future_secs: i64,

    /// Default heartbeat interval assumed for agents that don't declare one.
    #[arg(long, default_value_t = 30, env = "MONCTL_AGENT_HEARTBEAT_INTERVAL_SECS")]
    pub agent_heartbeat_interval_default_secs: u64,

    /// Multiple of the heartbeat interval after which an active agent goes stale.
    #[arg(long, default_value_t = 3, env = "MONCTL_AGENT_STALE_AFTER_N")]
    pub agent_stale_after_n: u32,

    /// Multiple of the heartbeat interval after which a stale agent goes offline.
    #[arg(long, default_value_t = 10, env = "MONCTL_AGENT_OFFLINE_AFTER_N")]
    pub agent_offline_after_n: u32,

    /// How often the agent health sweep runs, in milliseconds.
    #[arg(long, default_value_t = 5000, env = "MONCTL_AGENT_SWEEP_MS")]
    pub agent_sweep_ms: u64,

    /// Number of notification dispatch workers.
    #[arg(long, default_value_t = 8, env = "MONCTL_ALERT_DISPATCH_WORKERS")]
    pub alert_dispatch_workers: usize,

    /// Default cooldown (seconds) for rules that don't specify one.
    #[arg(long, default_value_t = 300, env = "MONCTL_ALERT_DEFAULT_COOLDOWN_SECS")]
    pub alert_default_cooldown_secs: i64,

    /// Number of evaluator shards (defaults to available parallelism).
    #[arg(long, env = "MONCTL_EVALUATOR_SHARDS")]
    pub evaluator_shards: Option<usize>,

    /// Capacity of the evaluator and TSDB ingress channels.
    #[arg(long, default_value_t = 4096, env = "MONCTL_INGRESS_QUEUE_CAPACITY")]
    pub ingress_queue_capacity: usize,

    /// Global concurrency cap across all discovery probe workers.
    #[arg(long, default_value_t = 512, env = "MONCTL_DISCOVERY_GLOBAL_CONCURRENCY_CAP")]
    pub discovery_global_concurrency_cap: usize,

    /// Per-job default probe concurrency.
    #[arg(long, default_value_t = 64, env = "MONCTL_DISCOVERY_JOB_CONCURRENCY")]
    pub discovery_job_concurrency: usize,

    /// Capacity of the audit-log write channel.
    #[arg(long, default_value_t = 1024, env = "MONCTL_AUDIT_QUEUE_CAPACITY")]
    pub audit_queue_capacity: usize,

    /// Deadline for draining in-flight work during graceful shutdown (ms).
    #[arg(long, default_value_t = 5000, env = "MONCTL_SHUTDOWN_DRAIN_MS")]
    pub shutdown_drain_ms: u64,

    /// Interval for the in-memory alert-state checkpoint (seconds).
    #[arg(long, default_value_t = 30, env = "MONCTL_CHECKPOINT_INTERVAL_SECS")]
    pub checkpoint_interval_secs: u64,

    /// Path to a JSON file the in-memory store checkpoints to. If unset,
    /// checkpoints are held in memory only (used in tests).
    #[arg(long, env = "MONCTL_STATE_PATH")]
    pub state_path: Option<std::path::PathBuf>,

    /// Path to a JSON file describing notification channels (webhook,
    /// email, sms, command). If unset, no channels are registered and
    /// alert rules referencing one will silently have nothing to deliver
    /// to beyond a logged warning.
    #[arg(long, env = "MONCTL_NOTIFICATION_CONFIG")]
    pub notification_config_path: Option<std::path::PathBuf>,

    /// Log output format.
    #[arg(long, default_value = "text", env = "MONCTL_LOG_FORMAT")]
    pub log_format: String,

    /// Username seeded as the initial operator account if no account with
    /// this name exists yet at boot.
    #[arg(long, default_value = "admin", env = "MONCTL_ADMIN_USERNAME")]
    pub admin_username: String,

    /// Password for the seeded initial operator account.
    #[arg(long, env = "MONCTL_ADMIN_PASSWORD", default_value = "dev-only-insecure-password")]
    pub admin_password: String,
}

impl ServerConfig {
    pub fn agent_heartbeat_interval_default(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.agent_heartbeat_interval_default_secs)
    }

    pub fn agent_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.agent_sweep_ms)
    }

    pub fn shutdown_drain_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_drain_ms)
    }

    pub fn checkpoint_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.checkpoint_interval_secs)
    }
}

/// A `ServerConfig` with every field set to its documented default, for use
/// in unit tests that need a config but aren't exercising config parsing
/// itself. `clap::Args` doesn't derive `Default`, so this fills the same
/// role by hand.
#[cfg(test)]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 8900,
        jwt_secret: "test-secret".into(),
        access_token_ttl_secs: 3600,
        refresh_token_ttl_secs: 30 * 24 * 3600,
        ingest_max_past_secs: 600,
        ingest_max_future_secs: 60,
        agent_heartbeat_interval_default_secs: 30,
        agent_stale_after_n: 3,
        agent_offline_after_n: 10,
        agent_sweep_ms: 5000,
        alert_dispatch_workers: 8,
        alert_default_cooldown_secs: 300,
        evaluator_shards: None,
        ingress_queue_capacity: 4096,
        discovery_global_concurrency_cap: 512,
        discovery_job_concurrency: 64,
        audit_queue_capacity: 1024,
        shutdown_drain_ms: 5000,
        checkpoint_interval_secs: 30,
        state_path: None,
        notification_config_path: None,
        log_format: "text".into(),
        admin_username: "admin".into(),
        admin_password: "test-password".into(),
    }
}

// -- Runtime config table ("map of anything" payloads) -----------------------

/// A configuration value. Modeled as a closed sum type rather than free-form
/// JSON: the shape of a config value is fixed even though its content varies
/// per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Nested(HashMap<String, ConfigValue>),
}

/// In-memory, overridable config table backing `/config/*`. Boot-time
/// `ServerConfig` values seed the initial rows; operators can override at
/// runtime without a restart.
#[derive(Debug, Default)]
pub struct ConfigStore {
    values: tokio::sync::RwLock<HashMap<String, ConfigValue>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self { values: tokio::sync::RwLock::new(HashMap::new()) }
    }

    pub fn seed(entries: impl IntoIterator<Item = (String, ConfigValue)>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.values.blocking_write();
            guard.extend(entries);
        }
        store
    }

    pub async fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.read().await.get(key).cloned()
    }

    pub async fn get_namespace(&self, prefix: &str) -> HashMap<String, ConfigValue> {
        self.values
            .read()
            .await
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn set(&self, key: impl Into<String>, value: ConfigValue) {
        self.values.write().await.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = ConfigStore::new();
        store.set("alert.default_cooldown", ConfigValue::Int(300)).await;
        assert_eq!(store.get("alert.default_cooldown").await, Some(ConfigValue::Int(300)));
    }

    #[tokio::test]
    async fn namespace_filters_by_prefix() {
        let store = ConfigStore::new();
        store.set("notification.email.from", ConfigValue::String("a@b.com".into())).await;
        store.set("notification.sms.from", ConfigValue::String("+1".into())).await;
        store.set("alert.default_cooldown", ConfigValue::Int(300)).await;
        let ns = store.get_namespace("notification.").await;
        assert_eq!(ns.len(), 2);
    }
}
