// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SMTP email delivery. Compiled only when the `email` feature is
//! enabled — operators who only use webhook/command channels shouldn't
//! have to carry an SMTP stack.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::super::channel::ChannelAdapter;
use crate::evaluator::AlertTransition;

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    pub fn new(
        smtp_host: &str,
        username: String,
        password: String,
        from: Mailbox,
        to: Mailbox,
    ) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self { transport, from, to })
    }
}

#[async_trait]
impl ChannelAdapter for EmailChannel {
    fn kind(&self) -> &'static str {
        "email"
    }

    async fn send(&self, transition: &AlertTransition) -> anyhow::Result<()> {
        let subject = format!("[monctl] alert {:?} on rule {}", transition.to, transition.rule_id);
        let body = format!(
            "target: {}\nfrom: {:?}\nto: {:?}\nvalue: {:?}\nat: {}",
            transition.target_id, transition.from, transition.to, transition.value, transition.at
        );
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .body(body)?;
        self.transport.send(message).await?;
        Ok(())
    }
}
