// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background sweep that ages agents through active -> stale -> offline
//! based on missed heartbeats.

use std::sync::Arc;

use super::model::AgentState;
use crate::state::AppState;

/// Spawn the background task that periodically sweeps all registered
/// agents for missed heartbeats, demoting stale ones to `Stale` and long
/// overdue ones to `Offline`.
pub fn spawn_health_sweep(state: Arc<AppState>) {
    let interval = state.config.agent_sweep_interval();
    let stale_after_n = state.config.agent_stale_after_n;
    let offline_after_n = state.config.agent_offline_after_n;

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let agents = state.agents.snapshot().await;
            let now = crate::time_util::now();

            for agent in agents {
                if !matches!(agent.state, AgentState::Active | AgentState::Stale) {
                    continue;
                }

                // Clamp to one state-step per sweep: an `Active` agent whose
                // sweep tick was itself delayed past both deadlines still
                // passes through `Stale` on this pass rather than jumping
                // straight to `Offline`, so "no direct jump is ever
                // observable" holds regardless of sweep cadence.
                let next_state = match agent.state {
                    AgentState::Active => {
                        if now >= agent.stale_deadline(stale_after_n) {
                            AgentState::Stale
                        } else {
                            AgentState::Active
                        }
                    }
                    AgentState::Stale => {
                        if now >= agent.offline_deadline(offline_after_n) {
                            AgentState::Offline
                        } else {
                            AgentState::Stale
                        }
                    }
                    other => other,
                };

                if next_state != agent.state {
                    state.agents.transition(agent.id, next_state).await;
                    if next_state == AgentState::Offline {
                        let _ = state
                            .targets
                            .mark_status(
                                agent.target_id,
                                crate::registry::TargetStatus::Offline,
                                "owning agent went offline",
                            )
                            .await;
                    }
                }
            }
        }
    });
}
