use crate::{
    config::{MailConfig, SmtpSecurity},
    email::{EmailAddress, OutgoingEmail},
};
use async_once_cell::OnceCell;
use async_trait::async_trait;
use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

/// Delivers rendered emails.
///
/// Implementations report every failure through [`MailError`]; it is up to the caller to decide
/// whether a failed delivery matters.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Whether the transport has what it needs to attempt delivery.
    fn is_configured(&self) -> bool;

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// Sends email through an SMTP relay.
///
/// The underlying connection pool is created on first use, so that a misconfigured relay does
/// not prevent the service from starting.
pub struct SmtpMailer {
    config: MailConfig,
    mailer: OnceCell<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            mailer: Default::default(),
        }
    }

    async fn initialise_mailer(
        &self,
        credentials: Credentials,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let host = self.config.smtp_host.as_str();
        info!(
            smtp_host = host,
            smtp_port = self.config.smtp_port,
            smtp_security = ?self.config.smtp_security,
            "Initialising SMTP transport"
        );
        let builder = match self.config.smtp_security {
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let builder = builder
            .port(self.config.smtp_port)
            .timeout(Some(self.config.smtp_timeout()));
        // Credentials never travel over an unencrypted connection. A relay which insists on
        // authentication will then reject the message, which surfaces as a send error.
        let builder = if self.config.smtp_security == SmtpSecurity::None {
            warn!("SMTP connection is unencrypted; not sending credentials");
            builder
        } else {
            builder.credentials(credentials)
        };
        Ok(builder.build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let (Some(credentials), Some(sender)) = (self.config.credentials(), self.config.sender())
        else {
            return Err(MailError::NotConfigured);
        };
        let message = build_message(&sender, email)?;
        let mailer = self
            .mailer
            .get_or_try_init(self.initialise_mailer(credentials))
            .await?;
        mailer.send(message).await?;
        Ok(())
    }
}

fn build_message(sender: &str, email: &OutgoingEmail) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(to_mailbox(&EmailAddress::new(sender))?)
        .subject(email.subject.as_str());
    for recipient in &email.to {
        builder = builder.to(to_mailbox(recipient)?);
    }
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(to_mailbox(reply_to)?);
    }
    let message = match &email.html_body {
        Some(html_body) => builder.multipart(MultiPart::alternative_plain_html(
            email.text_body.clone(),
            html_body.clone(),
        )),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text_body.clone()),
    }?;
    Ok(message)
}

fn to_mailbox(address: &EmailAddress) -> Result<Mailbox, MailError> {
    let bad_email = |source| MailError::BadEmail {
        address: address.address.clone(),
        source,
    };
    match &address.name {
        Some(name) => Ok(Mailbox::new(
            Some(name.clone()),
            address.address.parse().map_err(bad_email)?,
        )),
        None => address.address.parse().map_err(bad_email),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP credentials are not configured")]
    NotConfigured,
    #[error("Bad email {address}: {source}")]
    BadEmail {
        address: String,
        #[source]
        source: AddressError,
    },
    #[error("Error building message: {0}")]
    BadMessage(#[from] lettre::error::Error),
    #[error("Error sending message: {0}")]
    SendError(#[from] lettre::transport::smtp::Error),
}
