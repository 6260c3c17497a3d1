// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook delivery, signed with HMAC-SHA256 so receivers can verify the
//! payload came from this control plane.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::super::channel::ChannelAdapter;
use crate::evaluator::AlertTransition;

type HmacSha256 = Hmac<Sha256>;

pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
    signing_secret: String,
}

impl WebhookChannel {
    pub fn new(client: reqwest::Client, url: String, signing_secret: String) -> Self {
        Self { client, url, signing_secret }
    }

    fn sign(&self, body: &[u8]) -> anyhow::Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl ChannelAdapter for WebhookChannel {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, transition: &AlertTransition) -> anyhow::Result<()> {
        let body = serde_json::to_vec(transition)?;
        let signature = self.sign(&body)?;
        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("x-monctl-signature", signature)
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("webhook endpoint returned {}", response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_same_body() {
        let channel = WebhookChannel::new(
            reqwest::Client::new(),
            "https://example.invalid/hook".into(),
            "secret".into(),
        );
        let a = channel.sign(b"payload").expect("signs");
        let b = channel.sign(b"payload").expect("signs");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_changes_with_body() {
        let channel = WebhookChannel::new(
            reqwest::Client::new(),
            "https://example.invalid/hook".into(),
            "secret".into(),
        );
        let a = channel.sign(b"payload-a").expect("signs");
        let b = channel.sign(b"payload-b").expect("signs");
        assert_ne!(a, b);
    }
}
