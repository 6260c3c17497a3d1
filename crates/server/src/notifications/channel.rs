// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;

use crate::evaluator::AlertTransition;

/// A destination a fired/recovered alert can be sent to.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable channel kind, used in audit records and errors.
    fn kind(&self) -> &'static str;

    /// Deliver one transition. Errors are retried by the dispatcher with
    /// backoff; this should return promptly on failure rather than
    /// retrying internally.
    async fn send(&self, transition: &AlertTransition) -> anyhow::Result<()>;
}
