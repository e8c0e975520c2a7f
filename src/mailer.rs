//! Forwards an uploaded file to the administrator by email.
//!
//! Unrelated to the entry table: the upload is packaged as a multipart
//! message (plain-text note + one binary attachment) and handed to an
//! authenticated SMTP relay.

use crate::config::MailSettings;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Attachment, Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub note: String,
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("choose a file to send")]
    MissingFile,
    #[error("could not build the email: {0}")]
    Build(String),
    #[error("{0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, message: Message) -> Result<(), ForwardError>;
}

/// SMTP relay over implicit TLS with login credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, ForwardError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|err| ForwardError::Transport(err.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: Message) -> Result<(), ForwardError> {
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|err| ForwardError::Transport(err.to_string()))
    }
}

pub fn build_message(
    sender: &Mailbox,
    recipient: &Mailbox,
    upload: &Upload,
) -> Result<Message, ForwardError> {
    let content_type = ContentType::parse("application/octet-stream")
        .map_err(|err| ForwardError::Build(err.to_string()))?;
    let attachment =
        Attachment::new(upload.filename.clone()).body(upload.bytes.clone(), content_type);

    Message::builder()
        .from(sender.clone())
        .to(recipient.clone())
        .subject(format!("File upload: {}", upload.filename))
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(upload.note.clone()))
                .singlepart(attachment),
        )
        .map_err(|err| ForwardError::Build(err.to_string()))
}

pub struct FileForwarder {
    mailer: Arc<dyn Mailer>,
    sender: Mailbox,
    recipient: Mailbox,
}

impl FileForwarder {
    pub fn new(mailer: Arc<dyn Mailer>, sender: Mailbox, recipient: Mailbox) -> Self {
        Self {
            mailer,
            sender,
            recipient,
        }
    }

    pub async fn forward(&self, upload: Upload) -> Result<(), ForwardError> {
        if upload.filename.trim().is_empty() {
            return Err(ForwardError::MissingFile);
        }

        let message = build_message(&self.sender, &self.recipient, &upload)?;
        match self.mailer.send(message).await {
            Ok(()) => {
                info!(
                    filename = %upload.filename,
                    bytes = upload.bytes.len(),
                    recipient = %self.recipient,
                    "file forwarded"
                );
                Ok(())
            }
            Err(err) => {
                error!(filename = %upload.filename, "failed to forward file: {err}");
                Err(err)
            }
        }
    }
}
