//! Outbound mail transport.
//!
//! The dispatcher depends only on the `Mailer` seam; `SmtpMailer` is the
//! production implementation backed by lettre's async SMTP transport, built
//! per sender identity from its own credentials.

use crate::models::identity::SenderIdentity;
use anyhow::Result;
use async_trait::async_trait;
use lettre::message::header::{ContentType, MessageId};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one personalized message; returns the Message-Id on success.
    async fn send_mail(
        &self,
        identity: &SenderIdentity,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<String>;
}

#[derive(Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }

    fn transport_for(identity: &SenderIdentity) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let (host, port) = identity.smtp_endpoint()?;
        // Trim whitespace that sneaks in from copied app passwords
        let secret: String = identity
            .secret()?
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let creds = Credentials::new(identity.email.clone(), secret);

        let tls = TlsParameters::builder(host.clone()).build()?;

        let mut builder = match AsyncSmtpTransport::<Tokio1Executor>::relay(&host) {
            Ok(b) => b,
            Err(_) => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host),
        };
        builder = builder
            .port(port)
            .authentication(vec![Mechanism::Plain, Mechanism::Login])
            .credentials(creds)
            .timeout(Some(Duration::from_secs(20)));

        // 465 expects implicit TLS, everything else STARTTLS
        let builder = if port == 465 {
            builder.tls(Tls::Wrapper(tls))
        } else {
            builder.tls(Tls::Required(tls))
        };

        Ok(builder.build())
    }
}

/// Build a Message with an explicit Message-Id. Returns (message, message_id).
pub fn build_email(
    identity: &SenderIdentity,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<(Message, String)> {
    let from_addr: lettre::Address = identity.email.parse()?;
    let from_mb = if identity.display_name.is_empty() {
        Mailbox::new(None, from_addr)
    } else {
        Mailbox::new(Some(identity.display_name.clone()), from_addr)
    };
    let to_mb: Mailbox = to.parse()?;

    let domain = identity.email.split('@').nth(1).unwrap_or("mailbatch.local");
    let message_id = format!("{}@{}", Uuid::new_v4(), domain);

    let message = Message::builder()
        .from(from_mb)
        .to(to_mb)
        .subject(subject)
        .header(MessageId::from(message_id.clone()))
        .header(ContentType::TEXT_HTML)
        .body(html.to_string())?;

    Ok((message, message_id))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(
        &self,
        identity: &SenderIdentity,
        to: &str,
        subject: &str,
        html: &str,
    ) -> Result<String> {
        let (message, message_id) = build_email(identity, to, subject, html)?;
        let transport = Self::transport_for(identity)?;
        transport.send(message).await?;
        Ok(message_id)
    }
}
