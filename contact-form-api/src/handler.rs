use crate::{
    email::{EmailRenderer, Notifications, OutgoingEmail},
    mailer::MailTransport,
    submission::Submission,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{error, info, warn};

pub const SUCCESS_MESSAGE: &str = "Mensaje enviado correctamente. Te contactaremos pronto.";
pub const INTERNAL_ERROR_MESSAGE: &str = "Error interno del servidor. Inténtalo más tarde.";

pub struct ContactFormHandler<MailTransportT: MailTransport> {
    transport: MailTransportT,
    renderer: EmailRenderer,
}

impl<MailTransportT: MailTransport> ContactFormHandler<MailTransportT> {
    pub fn new(transport: MailTransportT, renderer: EmailRenderer) -> Self {
        Self {
            transport,
            renderer,
        }
    }

    pub fn business_name(&self) -> &str {
        self.renderer.business_name()
    }

    /// Processes one submission body.
    ///
    /// Once the submission is valid the outcome no longer depends on email delivery: delivery
    /// failures are logged and the submission is still accepted.
    pub async fn handle(&self, body: &[u8]) -> Result<(), ContactFormError> {
        let (submission, raw) = Submission::from_json(body)?;
        let validated_submission = submission.validate()?;
        let notifications = self
            .renderer
            .render(&validated_submission, &Local::now())
            .map_err(|error| {
                ContactFormError::InternalError(format!("Error rendering email: {error}"))
            })?;
        self.send_notifications(notifications).await;
        info!(
            "New contact form submission: {}",
            serde_json::to_string_pretty(&raw).unwrap_or_else(|_| raw.to_string())
        );
        Ok(())
    }

    async fn send_notifications(&self, notifications: Notifications) {
        if !self.transport.is_configured() {
            warn!("Mail transport is not configured; not sending notifications");
            return;
        }
        let Notifications {
            admin,
            confirmation,
        } = notifications;
        self.send_email("admin notification", &admin).await;
        self.send_email("confirmation", &confirmation).await;
    }

    async fn send_email(&self, kind: &'static str, email: &OutgoingEmail) {
        let recipients = email
            .to
            .iter()
            .map(|recipient| recipient.address.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        match self.transport.send(email).await {
            Ok(()) => info!(kind, recipients = %recipients, "Email sent"),
            Err(error) => error!(kind, recipients = %recipients, "Error sending email: {error}"),
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ContactFormError {
    #[error("No se recibieron datos")]
    MissingPayload,
    #[error("Campos requeridos faltantes: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ContactFormError {
    pub fn log(&self) {
        match self {
            ContactFormError::InternalError(description) => {
                error!("Internal error processing contact form submission: {description}");
            }
            client_error => {
                warn!("Client error in contact form submission: {client_error}");
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ContactFormError::MissingPayload | ContactFormError::MissingFields(_) => {
                StatusCode::BAD_REQUEST
            }
            ContactFormError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the user. Internal details never leave the server.
    pub fn user_message(&self) -> Cow<'static, str> {
        match self {
            ContactFormError::InternalError(_) => INTERNAL_ERROR_MESSAGE.into(),
            client_error => client_error.to_string().into(),
        }
    }
}

impl IntoResponse for ContactFormError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ContactResponse::failure(self.user_message())),
        )
            .into_response()
    }
}

/// Body returned by `POST /api/contact`.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ContactResponse {
    pub success: bool,
    pub message: Cow<'static, str>,
}

impl ContactResponse {
    pub fn success() -> Self {
        Self {
            success: true,
            message: SUCCESS_MESSAGE.into(),
        }
    }

    pub fn failure(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
