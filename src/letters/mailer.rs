//! Outbound SMTP. The transport authenticates against a submission relay
//! with STARTTLS; credentials come from the environment.

use crate::error::Result;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(
        relay: &str,
        user: &str,
        password: &str,
        from_name: &str,
        from_email: &str,
    ) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(relay)?
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();
        let from: Mailbox = format!("{from_name} <{from_email}>").parse()?;
        Ok(Self { transport, from })
    }

    pub async fn send_html(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html: String,
    ) -> Result<()> {
        let to: Mailbox = format!("{to_name} <{to_email}>").parse()?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        self.transport.send(message).await?;
        info!("Email sent to {to_email}");
        Ok(())
    }

    /// Verifies the relay connection, the manual smoke test the service
    /// exposes before its first scheduled run.
    pub async fn test_connection(&self) -> Result<bool> {
        Ok(self.transport.test_connection().await?)
    }
}
