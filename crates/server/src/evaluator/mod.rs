// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The alert evaluator: a bank of single-owner shards, each exclusively
//! responsible for a subset of targets (hashed by `target_id`), so no
//! locking is needed on the hot sample-processing path.

mod shard;
mod state_machine;
mod transition;
mod window;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ingress::Sample;
use crate::registry::TargetRegistry;
use crate::rules::RuleStore;

pub use transition::{AlertState, AlertTransition, TransitionKind};

/// Handle used by ingress to route a sample to its shard.
#[derive(Clone)]
pub struct EvaluatorHandle {
    senders: Vec<mpsc::Sender<Sample>>,
}

impl EvaluatorHandle {
    fn shard_for(&self, target_id: Uuid) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        target_id.hash(&mut hasher);
        (hasher.finish() as usize) % self.senders.len()
    }

    /// Route a sample to its shard. Uses `try_send`: a full per-shard
    /// queue means the evaluator can't keep up, which ingress surfaces to
    /// the caller as backpressure rather than buffering unboundedly here.
    pub fn try_route(&self, sample: Sample) -> Result<(), mpsc::error::TrySendError<Sample>> {
        let shard = self.shard_for(sample.target_id);
        self.senders[shard].try_send(sample)
    }

    /// Reserve a slot on `target_id`'s shard without sending yet. Lets a
    /// caller hold reservations on more than one channel at once and only
    /// commit once every reservation in the group has succeeded, so a
    /// sample is never accepted into one sink and dropped from another.
    pub fn try_reserve(&self, target_id: Uuid) -> Result<mpsc::Permit<'_, Sample>, mpsc::error::TrySendError<()>> {
        let shard = self.shard_for(target_id);
        self.senders[shard].try_reserve()
    }

    pub fn shard_count(&self) -> usize {
        self.senders.len()
    }
}

/// Spin up `shard_count` evaluator shards, wired to `rule_store` for rule
/// updates and `targets` for label-filter lookups. Returns a routing
/// handle plus the receiver side of the transitions channel.
pub fn spawn_evaluator(
    shard_count: usize,
    rule_store: Arc<RuleStore>,
    targets: Arc<TargetRegistry>,
    shutdown: tokio_util::sync::CancellationToken,
) -> (EvaluatorHandle, mpsc::Receiver<AlertTransition>) {
    let (transitions_tx, transitions_rx) = mpsc::channel(1024);
    let mut senders = Vec::with_capacity(shard_count);

    for id in 0..shard_count {
        let (tx, rx) = mpsc::channel(1024);
        let shard = shard::Shard::new(id, Arc::clone(&targets));
        shard::spawn_shard(
            shard,
            rx,
            rule_store.subscribe(),
            transitions_tx.clone(),
            shutdown.clone(),
        );
        senders.push(tx);
    }

    (EvaluatorHandle { senders }, transitions_rx)
}

/// A single-shard handle wrapping a caller-provided channel, for tests
/// that want to inspect routed samples directly without spinning up a
/// real shard worker.
#[cfg(test)]
pub fn test_handle(sender: mpsc::Sender<Sample>) -> EvaluatorHandle {
    EvaluatorHandle { senders: vec![sender] }
}
