// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sample ingress: validates batches of agent-reported metric samples and
//! fans them out to the alert evaluator and the time-series store.
//!
//! Both downstream consumers are reached through bounded `mpsc` channels.
//! A full channel is backpressure, not an error to retry silently: the
//! caller gets a `429` with `Retry-After` rather than having the request
//! block until a slot frees up, mirroring the bounded-capacity philosophy
//! the rest of this codebase uses for its channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::evaluator::EvaluatorHandle;
use crate::time_util::now;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleIn {
    pub target_id: Uuid,
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// A validated sample, tagged with the agent that reported it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub agent_id: Uuid,
    pub target_id: Uuid,
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct IngestBatch {
    pub agent_id: Uuid,
    pub samples: Vec<SampleIn>,
}

#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<String>,
}

fn validate_timestamp(ts: DateTime<Utc>, cfg: &ServerConfig) -> Result<(), String> {
    let now = now();
    let earliest = now - chrono::Duration::seconds(cfg.ingest_max_past_secs);
    let latest = now + chrono::Duration::seconds(cfg.ingest_max_future_secs);
    if ts < earliest {
        return Err(format!("timestamp {ts} is too far in the past"));
    }
    if ts > latest {
        return Err(format!("timestamp {ts} is too far in the future"));
    }
    Ok(())
}

fn validate_sample(sample: &SampleIn, cfg: &ServerConfig) -> Result<(), String> {
    if sample.metric.trim().is_empty() {
        return Err("metric name must not be empty".into());
    }
    if !sample.value.is_finite() {
        return Err(format!("metric {} has a non-finite value", sample.metric));
    }
    validate_timestamp(sample.timestamp, cfg)
}

/// Handles to the two downstream fan-out paths. Held by `AppState`;
/// cloning is cheap.
#[derive(Clone)]
pub struct IngressSinks {
    pub evaluator: EvaluatorHandle,
    pub tsdb_tx: mpsc::Sender<Sample>,
}

/// Validate and fan out one ingest batch.
///
/// Individual invalid samples are dropped and reported in
/// [`IngestReport::errors`] rather than failing the whole batch — an agent
/// reporting 50 metrics shouldn't lose 49 good ones because the 50th had a
/// clock skew issue. Channel backpressure, by contrast, fails the whole
/// batch: accepting half a batch under load would silently create gaps in
/// what the evaluator sees.
///
/// For every accepted sample, exactly one of two things happens: it lands
/// in both the evaluator and the TSDB writer, or it lands in neither. A
/// slot is reserved on both channels before either is sent to, so a full
/// queue on either side fails the sample atomically instead of enqueueing
/// it on one side and silently dropping it on the other.
pub async fn ingest_batch(
    sinks: &IngressSinks,
    cfg: &ServerConfig,
    batch: IngestBatch,
) -> AppResult<IngestReport> {
    let mut accepted = Vec::with_capacity(batch.samples.len());
    let mut errors = Vec::new();

    for sample in batch.samples {
        match validate_sample(&sample, cfg) {
            Ok(()) => accepted.push(Sample {
                agent_id: batch.agent_id,
                target_id: sample.target_id,
                metric: sample.metric,
                value: sample.value,
                timestamp: sample.timestamp,
            }),
            Err(e) => errors.push(e),
        }
    }

    let accepted_count = accepted.len();
    for sample in accepted {
        let evaluator_permit = sinks.evaluator.try_reserve(sample.target_id).map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => {
                AppError::Backpressure("evaluator ingress queue is full".into())
            }
            mpsc::error::TrySendError::Closed(()) => {
                AppError::Internal("evaluator ingress channel closed".into())
            }
        })?;
        let tsdb_permit = sinks.tsdb_tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => {
                AppError::Backpressure("tsdb ingress queue is full".into())
            }
            mpsc::error::TrySendError::Closed(()) => {
                AppError::Internal("tsdb ingress channel closed".into())
            }
        })?;
        evaluator_permit.send(sample.clone());
        tsdb_permit.send(sample);
    }

    let rejected = errors.len();
    Ok(IngestReport { accepted: accepted_count, rejected, errors })
}
