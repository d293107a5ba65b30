use std::str::FromStr;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::Mailbox,
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;

use crate::appsettings::{SmtpSettings, SmtpTls};

use super::{ReminderEmail, ReminderMailer};

#[derive(Debug, Error)]
pub enum SmtpMailerError {
    #[error("Invalid address {address}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("Failed to build email: {0}")]
    Message(#[from] lettre::error::Error),

    #[error(transparent)]
    Transport(#[from] lettre::transport::smtp::Error),
}

pub struct SmtpReminderMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpReminderMailer {
    /// Builds a relay transport authenticated as the sender account.
    /// No connection is opened until the first send.
    pub fn new(settings: &SmtpSettings) -> Result<Self, SmtpMailerError> {
        let from = parse_mailbox(&settings.email)?;
        let builder = match settings.tls {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            }
        };
        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.email.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &ReminderEmail) -> Result<Message, SmtpMailerError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.as_str())
            .body(email.body.clone())?;

        Ok(message)
    }
}

#[async_trait]
impl ReminderMailer for SmtpReminderMailer {
    async fn send(&self, email: &ReminderEmail) -> anyhow::Result<()> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(SmtpMailerError::from)?;

        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SmtpMailerError> {
    Mailbox::from_str(address).map_err(|source| SmtpMailerError::Address {
        address: address.to_owned(),
        source,
    })
}
