//! Email delivery for one-time codes.
//!
//! Uses Resend in production, SMTP (lettre) in development.
//! This allows local development against a mail catcher.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
};
use resend_rs::types::CreateEmailBaseOptions;

const FROM_NAME: &str = "Bookstore";
const FROM_ADDRESS: &str = "noreply@bookstore.example";

/// Which code an email carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Activation,
    PasswordReset,
}

impl CodeKind {
    fn subject(&self) -> &'static str {
        match self {
            CodeKind::Activation => "Activate your account",
            CodeKind::PasswordReset => "Reset your password",
        }
    }

    fn body(&self, full_name: &str, code: &str) -> String {
        let purpose = match self {
            CodeKind::Activation => "activation",
            CodeKind::PasswordReset => "password reset",
        };
        format!(
            "Hello {},\n\nYour {} code is: {}\n",
            full_name, purpose, code
        )
    }
}

/// Sends one-time codes to account holders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_code(&self, to: &str, full_name: &str, kind: CodeKind, code: &str)
    -> Result<()>;
}

/// Email sender selected from configuration.
pub enum EmailSenderImpl {
    /// SMTP-based sender using lettre (for development)
    Smtp(SmtpSender),
    /// Resend API sender (for production)
    Resend(ResendSender),
}

impl EmailSenderImpl {
    /// Uses Resend if an api key is provided, otherwise falls back to SMTP.
    pub fn new(resend_api_key: Option<String>, smtp_url: Option<String>) -> Result<Self> {
        if let Some(api_key) = resend_api_key.filter(|k| !k.is_empty()) {
            Ok(Self::Resend(ResendSender::new(api_key)))
        } else if let Some(url) = smtp_url.filter(|u| !u.is_empty()) {
            Ok(Self::Smtp(SmtpSender::new(url)?))
        } else {
            anyhow::bail!("Either RESEND_API_KEY or SMTP_URL must be configured")
        }
    }
}

#[async_trait]
impl EmailSender for EmailSenderImpl {
    async fn send_code(
        &self,
        to: &str,
        full_name: &str,
        kind: CodeKind,
        code: &str,
    ) -> Result<()> {
        let body = kind.body(full_name, code);
        match self {
            Self::Resend(sender) => sender.send(to, kind.subject(), &body).await,
            Self::Smtp(sender) => sender.send(to, kind.subject(), &body),
        }
    }
}

/// SMTP sender using lettre.
pub struct SmtpSender {
    transport: SmtpTransport,
}

impl SmtpSender {
    pub fn new(smtp_url: String) -> Result<Self> {
        let transport = SmtpTransport::from_url(&smtp_url)?.build();

        Ok(Self { transport })
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(Mailbox::new(
                Some(FROM_NAME.to_owned()),
                FROM_ADDRESS.parse()?,
            ))
            .to(Mailbox::new(None, to.parse()?))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(&email)?;

        Ok(())
    }
}

/// Resend API sender.
pub struct ResendSender {
    client: resend_rs::Resend,
}

impl ResendSender {
    pub fn new(api_key: String) -> Self {
        Self {
            client: resend_rs::Resend::new(&api_key),
        }
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let from = format!("{} <{}>", FROM_NAME, FROM_ADDRESS);
        let email = CreateEmailBaseOptions::new(from, [to], subject).with_text(body);

        self.client.emails.send(email).await?;

        Ok(())
    }
}
