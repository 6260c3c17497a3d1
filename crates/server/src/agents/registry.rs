// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use uuid::Uuid;

use super::model::{Agent, AgentState};
use crate::error::{AppError, AppResult};
use crate::registry::TargetKind;
use crate::time_util::now;

/// Registered agents, keyed by id. An agent is always pre-provisioned
/// (operator `create_agent`, or discovery auto-monitor) before it ever
/// heartbeats; heartbeat only updates an existing record, it never creates
/// one, so a target can never be silently bound to the wrong agent.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: tokio::sync::RwLock<HashMap<Uuid, Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-provision an agent bound to `target_id` and authenticated by
    /// `api_key_id`, with no heartbeat yet seen. Starts `Pending`, distinct
    /// from `Active` precisely because no heartbeat has actually arrived.
    pub async fn pre_register(
        &self,
        id: Uuid,
        kind: TargetKind,
        target_id: Uuid,
        api_key_id: Uuid,
        version: String,
        heartbeat_interval_secs: u64,
    ) -> Agent {
        let ts = now();
        let agent = Agent {
            id,
            kind,
            target_id,
            api_key_id,
            config_revision: 0,
            state: AgentState::Pending,
            registered_at: ts,
            last_heartbeat_at: ts,
            last_error: None,
            version,
            platform: String::new(),
            heartbeat_interval_secs,
        };
        self.agents.write().await.insert(id, agent.clone());
        agent
    }

    /// Apply a real heartbeat to an already-provisioned agent. Always
    /// lands in `Active`, regardless of what state it was in before —
    /// including `Pending` (first heartbeat) and `Stale`/`Offline`
    /// (recovered). Does not clear `Disabled`; an admin-disabled agent
    /// stays disabled until explicitly re-enabled even if it keeps
    /// heartbeating.
    pub async fn heartbeat(
        &self,
        id: Uuid,
        version: String,
        platform: String,
        last_error: Option<String>,
    ) -> AppResult<Agent> {
        let mut agents = self.agents.write().await;
        let agent = agents.get_mut(&id).ok_or_else(|| AppError::NotFound("agent".into()))?;
        agent.version = version;
        agent.platform = platform;
        agent.last_error = last_error;
        agent.last_heartbeat_at = now();
        if agent.state != AgentState::Disabled {
            agent.state = AgentState::Active;
        }
        Ok(agent.clone())
    }

    /// Admin-initiated pause. A disabled agent's heartbeats are still
    /// accepted (so in-flight samples aren't lost) but its state no longer
    /// reflects them until re-enabled.
    pub async fn disable(&self, id: Uuid) -> AppResult<Agent> {
        let mut agents = self.agents.write().await;
        let agent = agents.get_mut(&id).ok_or_else(|| AppError::NotFound("agent".into()))?;
        agent.state = AgentState::Disabled;
        Ok(agent.clone())
    }

    /// Re-enable a disabled agent. Lands in `Pending`, not `Active` —
    /// matching the state machine's `disabled -> pending` edge, since
    /// re-enabling isn't itself a heartbeat.
    pub async fn enable(&self, id: Uuid) -> AppResult<Agent> {
        let mut agents = self.agents.write().await;
        let agent = agents.get_mut(&id).ok_or_else(|| AppError::NotFound("agent".into()))?;
        if agent.state == AgentState::Disabled {
            agent.state = AgentState::Pending;
        }
        Ok(agent.clone())
    }

    /// Whether any registered agent already owns `target_id` — used by
    /// discovery auto-monitor to avoid minting a second agent for a target
    /// that's already claimed.
    pub async fn owns_target(&self, target_id: Uuid) -> bool {
        self.agents.read().await.values().any(|a| a.target_id == target_id)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Agent> {
        self.agents.read().await.get(&id).cloned().ok_or_else(|| AppError::NotFound("agent".into()))
    }

    pub async fn list(&self) -> Vec<Agent> {
        self.agents.read().await.values().cloned().collect()
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        self.agents
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("agent".into()))
    }

    pub async fn bump_config_version(&self, id: Uuid, revision: u64) -> AppResult<()> {
        let mut agents = self.agents.write().await;
        let agent = agents.get_mut(&id).ok_or_else(|| AppError::NotFound("agent".into()))?;
        agent.config_revision = revision;
        Ok(())
    }

    pub(super) async fn transition(&self, id: Uuid, state: AgentState) {
        if let Some(agent) = self.agents.write().await.get_mut(&id) {
            if agent.state != state {
                tracing::info!(agent_id = %id, from = ?agent.state, to = ?state, "agent state changed");
                agent.state = state;
            }
        }
    }

    pub(super) async fn snapshot(&self) -> Vec<Agent> {
        self.agents.read().await.values().cloned().collect()
    }

    /// Rebuild from a loaded checkpoint.
    pub fn restore(agents: Vec<Agent>) -> Self {
        let map = agents.into_iter().map(|a| (a.id, a)).collect();
        Self { agents: tokio::sync::RwLock::new(map) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pre_register_then_heartbeat_goes_active() {
        let registry = AgentRegistry::new();
        let id = Uuid::new_v4();
        let target_id = Uuid::new_v4();
        let api_key_id = Uuid::new_v4();
        registry.pre_register(id, TargetKind::Host, target_id, api_key_id, "1.0.0".into(), 30).await;
        let agent = registry.heartbeat(id, "1.1.0".into(), "linux".into(), None).await.expect("exists");
        assert_eq!(agent.state, AgentState::Active);
        assert_eq!(agent.version, "1.1.0");
        assert_eq!(agent.platform, "linux");
        assert_eq!(agent.target_id, target_id);
    }

    #[tokio::test]
    async fn heartbeat_unknown_agent_is_not_found() {
        let registry = AgentRegistry::new();
        let result = registry.heartbeat(Uuid::new_v4(), "1.0.0".into(), "linux".into(), None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn heartbeat_resets_state_to_active_after_stale() {
        let registry = AgentRegistry::new();
        let id = Uuid::new_v4();
        registry.pre_register(id, TargetKind::Host, Uuid::new_v4(), Uuid::new_v4(), "1.0.0".into(), 30).await;
        registry.transition(id, AgentState::Stale).await;
        let agent = registry.heartbeat(id, "1.0.0".into(), "linux".into(), None).await.expect("exists");
        assert_eq!(agent.state, AgentState::Active);
    }

    #[tokio::test]
    async fn disabled_agent_stays_disabled_through_heartbeat() {
        let registry = AgentRegistry::new();
        let id = Uuid::new_v4();
        registry.pre_register(id, TargetKind::Host, Uuid::new_v4(), Uuid::new_v4(), "1.0.0".into(), 30).await;
        registry.disable(id).await.expect("exists");
        let agent = registry.heartbeat(id, "1.0.0".into(), "linux".into(), None).await.expect("exists");
        assert_eq!(agent.state, AgentState::Disabled);
    }

    #[tokio::test]
    async fn owns_target_reflects_bound_target_only() {
        let registry = AgentRegistry::new();
        let target_id = Uuid::new_v4();
        registry.pre_register(Uuid::new_v4(), TargetKind::Host, target_id, Uuid::new_v4(), "1.0.0".into(), 30).await;
        assert!(registry.owns_target(target_id).await);
        assert!(!registry.owns_target(Uuid::new_v4()).await);
    }
}
