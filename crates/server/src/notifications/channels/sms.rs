// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SMS delivery via a generic HTTP provider API (Twilio-shaped: POST with
//! form-encoded `To`/`Body`). No provider SDK is pulled in — one HTTP POST
//! is all this needs, and the pack already pairs `reqwest` for exactly
//! this kind of thin outbound integration.

use async_trait::async_trait;

use super::super::channel::ChannelAdapter;
use crate::evaluator::AlertTransition;

pub struct SmsChannel {
    client: reqwest::Client,
    provider_url: String,
    to_number: String,
    api_key: String,
}

impl SmsChannel {
    pub fn new(client: reqwest::Client, provider_url: String, to_number: String, api_key: String) -> Self {
        Self { client, provider_url, to_number, api_key }
    }
}

#[async_trait]
impl ChannelAdapter for SmsChannel {
    fn kind(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, transition: &AlertTransition) -> anyhow::Result<()> {
        let body = format!(
            "alert {:?} -> {:?} for rule {} on target {}",
            transition.from, transition.to, transition.rule_id, transition.target_id
        );
        let response = self
            .client
            .post(&self.provider_url)
            .bearer_auth(&self.api_key)
            .form(&[("To", self.to_number.as_str()), ("Body", body.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("sms provider returned {}", response.status());
        }
        Ok(())
    }
}
