use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Notification, Notifier};
use crate::config::SmtpSettings;

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    pub fn from_settings(smtp: &SmtpSettings) -> Result<Self> {
        let creds = Credentials::new(smtp.user.clone(), smtp.pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .with_context(|| format!("invalid SMTP host {}", smtp.host))?
            .credentials(creds)
            .build();

        let from = smtp.from.parse().context("invalid SMTP from address")?;
        let to = smtp.to.parse().context("invalid SMTP to address")?;

        Ok(Self { mailer, from, to })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailSender {
    async fn send(&self, n: &Notification) -> Result<()> {
        let body = format!("{}\n\nTimestamp: {}\n", n.body, n.ts.to_rfc3339());

        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(n.subject.clone())
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
