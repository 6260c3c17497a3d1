// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-level counters exposed as a plain-text `/metrics` line set.
//!
//! No metrics crate is pulled in for this: a handful of atomics are
//! simpler than a registry, and the self-monitoring this feeds is a
//! liveness signal, not a full observability pipeline.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    samples_accepted_total: AtomicU64,
    samples_dropped_total: AtomicU64,
    /// Count of channel adapters currently considered unhealthy: every
    /// delivery attempt against them has exhausted its retries since the
    /// last successful send. Can go back down — a later successful send
    /// through `record_channel_healthy` clears it for that channel.
    channel_unhealthy: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self, n: u64) {
        self.samples_accepted_total.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, n: u64) {
        self.samples_dropped_total.fetch_add(n, Ordering::Relaxed);
    }

    /// A channel exhausted all of its delivery retries.
    pub fn record_channel_unhealthy(&self) {
        self.channel_unhealthy.fetch_add(1, Ordering::Relaxed);
    }

    /// A channel that was previously marked unhealthy delivered
    /// successfully again.
    pub fn record_channel_healthy(&self) {
        let _ = self.channel_unhealthy.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            Some((n - 1).max(0))
        });
    }

    /// Render as Prometheus-style plain text.
    pub fn render(&self) -> String {
        format!(
            "channel_unhealthy {}\nsamples_accepted_total {}\nsamples_dropped_total {}\n",
            self.channel_unhealthy.load(Ordering::Relaxed),
            self.samples_accepted_total.load(Ordering::Relaxed),
            self.samples_dropped_total.load(Ordering::Relaxed),
        )
    }
}
