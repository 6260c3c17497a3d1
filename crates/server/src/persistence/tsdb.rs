// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam for the external time-series database samples are archived to.
//! Nothing in this control plane queries historical samples back out —
//! that's the TSDB's job — so the trait is write-only.

use async_trait::async_trait;

use crate::ingress::Sample;

#[async_trait]
pub trait TsdbWriter: Send + Sync {
    async fn write(&self, sample: &Sample) -> anyhow::Result<()>;
}

/// Writes samples to the application log instead of a real TSDB. Useful
/// as a default when no external TSDB is configured, and as the seam's
/// reference implementation.
#[derive(Default)]
pub struct LoggingTsdbWriter;

#[async_trait]
impl TsdbWriter for LoggingTsdbWriter {
    async fn write(&self, sample: &Sample) -> anyhow::Result<()> {
        tracing::debug!(
            target_id = %sample.target_id,
            metric = %sample.metric,
            value = sample.value,
            "sample archived"
        );
        Ok(())
    }
}

/// Spawn a task draining a sample channel into a `TsdbWriter`. Mirrors the
/// evaluator's channel-in, task-owns-the-rest shape but needs no sharding:
/// writes are independent and ordering across targets doesn't matter.
pub fn spawn_tsdb_writer(
    writer: std::sync::Arc<dyn TsdbWriter>,
    mut rx: tokio::sync::mpsc::Receiver<Sample>,
    shutdown: tokio_util::sync::CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let sample = tokio::select! {
                _ = shutdown.cancelled() => break,
                s = rx.recv() => match s {
                    Some(s) => s,
                    None => break,
                },
            };
            if let Err(e) = writer.write(&sample).await {
                tracing::warn!(err = %e, "tsdb write failed");
            }
        }
    });
}
