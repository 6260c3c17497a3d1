// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `monctl-server` binary and
//! drive it over HTTP exactly as a real operator console or agent would.

use std::time::Duration;

use monctl_e2e::MonctlProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn health_and_graceful_shutdown() -> anyhow::Result<()> {
    let mut monctl = MonctlProcess::start()?;
    monctl.wait_healthy(TIMEOUT).await?;

    let body: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", monctl.base_url())).await?.json().await?;
    assert_eq!(body["status"], "ok");

    monctl.terminate()?;
    let status = monctl.wait_exit(TIMEOUT).await?;
    assert!(status.success(), "graceful shutdown should exit 0, got {status:?}");

    Ok(())
}

// -- Scenario: heartbeat-to-fire ---------------------------------------------

#[tokio::test]
async fn heartbeat_breaches_fire_and_recovery_resolves() -> anyhow::Result<()> {
    let monctl = MonctlProcess::start()?;
    monctl.wait_healthy(TIMEOUT).await?;
    let access_token = monctl.admin_login().await?;
    let client = monctl.client();
    let base = monctl.base_url();

    let (agent_id, agent_key) = monctl.create_agent(&access_token, "host", "e2e-host").await?;

    let rule: serde_json::Value = client
        .post(format!("{base}/api/v1/alerts/rules"))
        .bearer_auth(&access_token)
        .json(&serde_json::json!({
            "name": "cpu high",
            "metric": "e2e.cpu.user",
            "window_secs": 60,
            "reducer": "last",
            "comparator": "greater_than",
            "threshold": 80.0,
            "persistence_secs": 1,
            "cooldown_secs": 0,
            "severity": "warning",
            "channels": [],
        }))
        .send()
        .await?
        .json()
        .await?;
    let rule_id = rule["id"].as_str().ok_or_else(|| anyhow::anyhow!("rule response missing id"))?;

    let heartbeat = |value: f64| {
        serde_json::json!({
            "agent_id": agent_id,
            "ts": chrono::Utc::now().to_rfc3339(),
            "version": "1.0.0",
            "platform": "e2e-host",
            "config_revision_seen": 0,
            "health": { "status": "ok", "last_error": null },
            "samples": [{
                "metric": "e2e.cpu.user",
                "ts": chrono::Utc::now().to_rfc3339(),
                "value": value,
            }],
        })
    };

    // First breach: the condition hasn't persisted for `persistence_secs` yet.
    client
        .post(format!("{base}/api/v1/agents/heartbeat"))
        .bearer_auth(&agent_key)
        .json(&heartbeat(85.0))
        .send()
        .await?
        .error_for_status()?;

    let active: Vec<serde_json::Value> = client
        .get(format!("{base}/api/v1/alerts"))
        .bearer_auth(&access_token)
        .send()
        .await?
        .json()
        .await?;
    assert!(active.is_empty(), "should not fire before the breach has persisted");

    // Still breaching after `persistence_secs` has elapsed: fires.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    client
        .post(format!("{base}/api/v1/agents/heartbeat"))
        .bearer_auth(&agent_key)
        .json(&heartbeat(90.0))
        .send()
        .await?
        .error_for_status()?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    let fired = loop {
        let active: Vec<serde_json::Value> =
            client.get(format!("{base}/api/v1/alerts")).bearer_auth(&access_token).send().await?.json().await?;
        if active.iter().any(|a| a["rule_id"] == rule_id) {
            break active;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("rule never fired after persistence_secs elapsed");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    };
    assert_eq!(fired.len(), 1);

    // Drop back under threshold: resolves.
    client
        .post(format!("{base}/api/v1/agents/heartbeat"))
        .bearer_auth(&agent_key)
        .json(&heartbeat(10.0))
        .send()
        .await?
        .error_for_status()?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let active: Vec<serde_json::Value> =
            client.get(format!("{base}/api/v1/alerts")).bearer_auth(&access_token).send().await?.json().await?;
        if active.is_empty() {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("alert never resolved after dropping under threshold");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}

// -- Scenario: discovery auto-register ---------------------------------------

#[tokio::test]
async fn discovery_auto_monitor_binds_a_pending_agent() -> anyhow::Result<()> {
    let monctl = MonctlProcess::start()?;
    monctl.wait_healthy(TIMEOUT).await?;
    let access_token = monctl.admin_login().await?;
    let client = monctl.client();
    let base = monctl.base_url();

    // A live listener the probe can actually reach; never accepted, so the
    // probe only proves TCP reachability, same as an unrecognized service.
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();

    let job: serde_json::Value = client
        .post(format!("{base}/api/v1/discovery/tasks"))
        .bearer_auth(&access_token)
        .json(&serde_json::json!({
            "targets": [{ "address": "127.0.0.1", "port": port, "protocol": "tcp" }],
            "auto_monitor": true,
        }))
        .send()
        .await?
        .json()
        .await?;
    let job_id = job["id"].as_str().ok_or_else(|| anyhow::anyhow!("discovery job response missing id"))?.to_owned();

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let progress: serde_json::Value = client
            .get(format!("{base}/api/v1/discovery/tasks/{job_id}/progress"))
            .bearer_auth(&access_token)
            .send()
            .await?
            .json()
            .await?;
        if progress["status"] == "completed" {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("discovery job never completed");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let agents: Vec<serde_json::Value> =
        client.get(format!("{base}/api/v1/agents")).bearer_auth(&access_token).send().await?.json().await?;
    assert_eq!(agents.len(), 1, "auto-monitor should have pre-provisioned exactly one agent");
    assert_eq!(agents[0]["state"], "pending");
    let bound_target_id = agents[0]["target_id"].as_str().ok_or_else(|| anyhow::anyhow!("agent missing target_id"))?;

    let targets: Vec<serde_json::Value> =
        client.get(format!("{base}/api/v1/targets")).bearer_auth(&access_token).send().await?.json().await?;
    let bound_target = targets
        .iter()
        .find(|t| t["id"] == bound_target_id)
        .ok_or_else(|| anyhow::anyhow!("agent's bound target not found in target list"))?;
    assert_eq!(bound_target["address"], format!("127.0.0.1:{port}"));

    drop(listener);
    Ok(())
}

// -- Scenario: backpressure ---------------------------------------------------

#[tokio::test]
async fn heartbeat_backpressure_returns_429_with_retry_after() -> anyhow::Result<()> {
    let monctl = MonctlProcess::build().single_evaluator_shard().spawn()?;
    monctl.wait_healthy(TIMEOUT).await?;
    let access_token = monctl.admin_login().await?;
    let client = monctl.client();
    let base = monctl.base_url();

    let (agent_id, agent_key) = monctl.create_agent(&access_token, "host", "e2e-flood-host").await?;

    // One shard's queue holds 1024 samples; a single oversized batch sent in
    // one request outpaces the shard before it can drain any of it.
    let samples: Vec<_> = (0..4000)
        .map(|i| {
            serde_json::json!({
                "metric": "e2e.flood",
                "ts": chrono::Utc::now().to_rfc3339(),
                "value": i as f64,
            })
        })
        .collect();

    let resp = client
        .post(format!("{base}/api/v1/agents/heartbeat"))
        .bearer_auth(&agent_key)
        .json(&serde_json::json!({
            "agent_id": agent_id,
            "ts": chrono::Utc::now().to_rfc3339(),
            "version": "1.0.0",
            "platform": "e2e-flood-host",
            "config_revision_seen": 0,
            "health": { "status": "ok", "last_error": null },
            "samples": samples,
        }))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 429);
    let retry_after_header =
        resp.headers().get("retry-after").ok_or_else(|| anyhow::anyhow!("missing retry-after header"))?;
    let retry_after: u64 = retry_after_header.to_str()?.parse()?;
    assert!(retry_after >= 1);

    Ok(())
}

// -- Scenario: token rotation --------------------------------------------------

#[tokio::test]
async fn refresh_token_rotation_rejects_replay() -> anyhow::Result<()> {
    let monctl = MonctlProcess::start()?;
    monctl.wait_healthy(TIMEOUT).await?;
    let client = monctl.client();
    let base = monctl.base_url();

    let login: serde_json::Value = client
        .post(format!("{base}/api/v1/auth/login"))
        .json(&serde_json::json!({ "username": "admin", "password": "e2e-admin-password" }))
        .send()
        .await?
        .json()
        .await?;
    let refresh_token =
        login["refresh_token"].as_str().ok_or_else(|| anyhow::anyhow!("login response missing refresh_token"))?.to_owned();

    let rotated = client
        .post(format!("{base}/api/v1/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": refresh_token }))
        .send()
        .await?;
    assert!(rotated.status().is_success());
    let rotated: serde_json::Value = rotated.json().await?;
    assert_ne!(rotated["access_token"], login["access_token"]);

    let replay = client
        .post(format!("{base}/api/v1/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": refresh_token }))
        .send()
        .await?;
    assert_eq!(replay.status().as_u16(), 401);

    Ok(())
}

// -- Scenario: key revocation ---------------------------------------------------

#[tokio::test]
async fn revoked_api_key_is_rejected_on_next_heartbeat() -> anyhow::Result<()> {
    let monctl = MonctlProcess::start()?;
    monctl.wait_healthy(TIMEOUT).await?;
    let access_token = monctl.admin_login().await?;
    let client = monctl.client();
    let base = monctl.base_url();

    let (agent_id, token) = monctl.create_agent(&access_token, "host", "e2e-revoke-host").await?;
    let agent: serde_json::Value =
        client.get(format!("{base}/api/v1/agents/{agent_id}")).bearer_auth(&access_token).send().await?.json().await?;
    let key_id = agent["api_key_id"].as_str().ok_or_else(|| anyhow::anyhow!("agent missing api_key_id"))?.to_owned();

    let heartbeat_body = serde_json::json!({
        "agent_id": agent_id,
        "ts": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0",
        "platform": "e2e-revoke-host",
        "config_revision_seen": 0,
        "health": { "status": "ok", "last_error": null },
        "samples": [],
    });

    // Valid key still works before revocation.
    client
        .post(format!("{base}/api/v1/agents/heartbeat"))
        .bearer_auth(&token)
        .json(&heartbeat_body)
        .send()
        .await?
        .error_for_status()?;

    client.delete(format!("{base}/api/v1/apikeys/{key_id}")).bearer_auth(&access_token).send().await?.error_for_status()?;

    let rejected = client
        .post(format!("{base}/api/v1/agents/heartbeat"))
        .bearer_auth(&token)
        .json(&heartbeat_body)
        .send()
        .await?;
    assert_eq!(rejected.status().as_u16(), 401);

    // The agent's own bound state is untouched by key revocation — it's
    // still registered, just unable to authenticate further heartbeats.
    let agent: serde_json::Value =
        client.get(format!("{base}/api/v1/agents/{agent_id}")).bearer_auth(&access_token).send().await?.json().await?;
    assert_eq!(agent["state"], "active");

    Ok(())
}
