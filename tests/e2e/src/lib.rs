// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `monctl-server` binary as a subprocess and exercises it
//! over its one transport, plain HTTP.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `monctl-server` binary.
pub fn monctl_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/e2e -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("monctl-server")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `monctl-server` process that is killed on drop.
pub struct MonctlProcess {
    child: Child,
    port: u16,
    admin_username: String,
    admin_password: String,
    client: reqwest::Client,
    _state_dir: tempfile::TempDir,
}

/// Builder for configuring a [`MonctlProcess`] before it's spawned.
pub struct MonctlBuilder {
    admin_username: String,
    admin_password: String,
    evaluator_shards: Option<usize>,
    notification_config_path: Option<PathBuf>,
}

impl Default for MonctlBuilder {
    fn default() -> Self {
        Self {
            admin_username: "admin".into(),
            admin_password: "e2e-admin-password".into(),
            evaluator_shards: None,
            notification_config_path: None,
        }
    }
}

impl MonctlBuilder {
    /// Pin the evaluator to a single shard, so tests that need to reason
    /// about one shard's channel (e.g. backpressure) don't have to guess
    /// which of several a sample landed on.
    pub fn single_evaluator_shard(mut self) -> Self {
        self.evaluator_shards = Some(1);
        self
    }

    pub fn notification_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.notification_config_path = Some(path.into());
        self
    }

    pub fn spawn(self) -> anyhow::Result<MonctlProcess> {
        let binary = monctl_binary();
        anyhow::ensure!(binary.exists(), "monctl-server binary not found at {}", binary.display());

        let port = free_port()?;
        let state_dir = tempfile::tempdir()?;
        let state_path = state_dir.path().join("state.json");

        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--state-path".into(),
            state_path.to_string_lossy().into_owned(),
            "--admin-username".into(),
            self.admin_username.clone(),
            "--admin-password".into(),
            self.admin_password.clone(),
            "--log-format".into(),
            "text".into(),
        ];
        if let Some(shards) = self.evaluator_shards {
            args.extend(["--evaluator-shards".into(), shards.to_string()]);
        }
        if let Some(path) = &self.notification_config_path {
            args.extend(["--notification-config".into(), path.to_string_lossy().into_owned()]);
        }

        let child = Command::new(&binary)
            .args(&args)
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(MonctlProcess {
            child,
            port,
            admin_username: self.admin_username,
            admin_password: self.admin_password,
            client: reqwest::Client::new(),
            _state_dir: state_dir,
        })
    }
}

impl MonctlProcess {
    pub fn build() -> MonctlBuilder {
        MonctlBuilder::default()
    }

    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Poll `/api/v1/health` until it answers or `timeout` elapses.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("monctl-server did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = self.client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Log in as the seeded bootstrap operator and return a bearer access
    /// token.
    pub async fn admin_login(&self) -> anyhow::Result<String> {
        let resp: serde_json::Value = self
            .client
            .post(format!("{}/api/v1/auth/login", self.base_url()))
            .json(&serde_json::json!({
                "username": self.admin_username,
                "password": self.admin_password,
            }))
            .send()
            .await?
            .json()
            .await?;
        resp["access_token"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("login response missing access_token"))
    }

    /// Mint an API key with the given role via the admin session, returning
    /// the raw token.
    pub async fn mint_api_key(&self, access_token: &str, label: &str, role: &str) -> anyhow::Result<String> {
        let resp: serde_json::Value = self
            .client
            .post(format!("{}/api/v1/apikeys", self.base_url()))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "label": label, "role": role }))
            .send()
            .await?
            .json()
            .await?;
        resp["token"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("apikey response missing token"))
    }

    /// Pre-provision an agent bound to a freshly upserted target via the
    /// admin session, returning its id and the api key it must heartbeat
    /// with.
    pub async fn create_agent(
        &self,
        access_token: &str,
        kind: &str,
        address: &str,
    ) -> anyhow::Result<(uuid::Uuid, String)> {
        let resp: serde_json::Value = self
            .client
            .post(format!("{}/api/v1/agents", self.base_url()))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "kind": kind, "address": address, "version": "1.0.0" }))
            .send()
            .await?
            .json()
            .await?;
        let id = resp["agent"]["id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("create agent response missing agent.id"))?
            .parse()?;
        let token = resp["api_key_token"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("create agent response missing api_key_token"))?;
        Ok((id, token))
    }

    /// Send SIGTERM, triggering the graceful-shutdown drain rather than an
    /// immediate kill.
    pub fn terminate(&self) -> anyhow::Result<()> {
        let status = Command::new("kill").args(["-TERM", &self.child.id().to_string()]).status()?;
        anyhow::ensure!(status.success(), "kill -TERM failed");
        Ok(())
    }

    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("monctl-server did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for MonctlProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
