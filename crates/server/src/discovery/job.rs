// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Http,
    Ssh,
    Mysql,
    Postgres,
    Redis,
    Kafka,
    Rabbitmq,
    Elasticsearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryTarget {
    pub address: String,
    pub port: u16,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub id: Uuid,
    pub targets: Vec<DiscoveryTarget>,
    pub concurrency: usize,
    pub timeout_ms: u64,
    /// Opaque reference to probe credentials held by the credential
    /// store; discovery never sees the secret itself.
    pub credentials_ref: Option<String>,
    /// If true, a reachable result with a known service kind gets its
    /// target upserted *and* bound to a freshly pre-provisioned agent, not
    /// just recorded.
    #[serde(default)]
    pub auto_monitor: bool,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub job_id: Uuid,
    pub address: String,
    pub port: u16,
    pub protocol: Protocol,
    pub reachable: bool,
    pub service_kind: Option<String>,
    pub evidence: Option<String>,
    pub error: Option<String>,
    pub probed_at: DateTime<Utc>,
}
