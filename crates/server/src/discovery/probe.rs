// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol probes. Each probe answers one question — "is something
//! speaking this protocol on this address/port" — by connecting and
//! reading whatever greeting the service offers unprompted.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use super::job::Protocol;

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub service_kind: Option<String>,
    pub evidence: Option<String>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    fn unreachable(error: impl Into<String>) -> Self {
        Self { reachable: false, service_kind: None, evidence: None, error: Some(error.into()) }
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    fn protocol(&self) -> Protocol;
    async fn probe(&self, address: &str, port: u16, timeout: Duration) -> ProbeOutcome;
}

async fn connect(address: &str, port: u16, timeout: Duration) -> Result<TcpStream, String> {
    tokio::time::timeout(timeout, TcpStream::connect((address, port)))
        .await
        .map_err(|_| "connection timed out".to_string())?
        .map_err(|e| e.to_string())
}

async fn read_banner(stream: &mut TcpStream, timeout: Duration) -> Option<String> {
    let mut buf = [0u8; 256];
    match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => Some(String::from_utf8_lossy(&buf[..n]).trim().to_string()),
        _ => None,
    }
}

/// Plain TCP reachability, no protocol inspection.
pub struct TcpConnectProbe;

#[async_trait]
impl Probe for TcpConnectProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, address: &str, port: u16, timeout: Duration) -> ProbeOutcome {
        match connect(address, port, timeout).await {
            Ok(_) => ProbeOutcome {
                reachable: true,
                service_kind: Some("tcp".into()),
                evidence: None,
                error: None,
            },
            Err(e) => ProbeOutcome::unreachable(e),
        }
    }
}

/// HTTP reachability via a plain GET of `/`.
pub struct HttpGetProbe {
    client: reqwest::Client,
}

impl HttpGetProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpGetProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn probe(&self, address: &str, port: u16, timeout: Duration) -> ProbeOutcome {
        let url = format!("http://{address}:{port}/");
        match tokio::time::timeout(timeout, self.client.get(&url).send()).await {
            Ok(Ok(response)) => {
                let server = response
                    .headers()
                    .get("server")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_owned());
                ProbeOutcome {
                    reachable: true,
                    service_kind: Some("http".into()),
                    evidence: server,
                    error: None,
                }
            }
            Ok(Err(e)) => ProbeOutcome::unreachable(e.to_string()),
            Err(_) => ProbeOutcome::unreachable("request timed out"),
        }
    }
}

/// Banner-sniffing probe for services that greet first on connect
/// (SSH, MySQL, Redis, ...). Each known prefix maps to a service kind;
/// an unrecognized but present banner still counts as reachable with no
/// service kind attributed, since plenty of proxies and load balancers
/// also send unsolicited banners.
pub struct BannerProbe {
    protocol: Protocol,
    expected_prefixes: &'static [&'static str],
}

impl BannerProbe {
    pub fn ssh() -> Self {
        Self { protocol: Protocol::Ssh, expected_prefixes: &["SSH-"] }
    }

    /// MySQL's handshake packet is binary, not an ASCII prefix, so this
    /// only confirms something answered — reachability, not protocol.
    pub fn mysql() -> Self {
        Self { protocol: Protocol::Mysql, expected_prefixes: &[] }
    }

    /// Postgres and Kafka expect the client to speak first; without a
    /// real client handshake this also degrades to a reachability check.
    pub fn postgres() -> Self {
        Self { protocol: Protocol::Postgres, expected_prefixes: &[] }
    }

    pub fn redis() -> Self {
        Self { protocol: Protocol::Redis, expected_prefixes: &["-ERR", "+PONG", "-NOAUTH"] }
    }

    pub fn kafka() -> Self {
        Self { protocol: Protocol::Kafka, expected_prefixes: &[] }
    }

    pub fn rabbitmq() -> Self {
        Self { protocol: Protocol::Rabbitmq, expected_prefixes: &["AMQP"] }
    }

    pub fn elasticsearch() -> Self {
        Self { protocol: Protocol::Elasticsearch, expected_prefixes: &[] }
    }
}

#[async_trait]
impl Probe for BannerProbe {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn probe(&self, address: &str, port: u16, timeout: Duration) -> ProbeOutcome {
        let mut stream = match connect(address, port, timeout).await {
            Ok(s) => s,
            Err(e) => return ProbeOutcome::unreachable(e),
        };

        let banner = read_banner(&mut stream, timeout).await;
        let service_kind = match &banner {
            Some(b) if self.expected_prefixes.iter().any(|p| b.starts_with(p)) => {
                Some(format!("{:?}", self.protocol).to_lowercase())
            }
            Some(_) => None,
            None if self.expected_prefixes.is_empty() => {
                // Protocols with no unsolicited greeting (MySQL handshake
                // excepted; Postgres/Kafka/ES require the client to speak
                // first) only prove TCP reachability here.
                Some("tcp".into())
            }
            None => None,
        };

        ProbeOutcome { reachable: true, service_kind, evidence: banner, error: None }
    }
}
