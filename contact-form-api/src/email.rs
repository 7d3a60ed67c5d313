use crate::{
    config::{EmailStyle, MailConfig},
    labels::{
        budget_label, project_type_label, BUDGET_NOT_SPECIFIED, PHONE_NOT_PROVIDED,
        START_DATE_NOT_SPECIFIED,
    },
    submission::ValidatedSubmission,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use tinytemplate::{error::Error, format, format_unescaped, TinyTemplate};

const ADMIN_NOTIFICATION_TEMPLATE_NAME: &str = "admin-notification";
const CONFIRMATION_TEXT_TEMPLATE_NAME: &str = "confirmation-text";
const CONFIRMATION_HTML_TEMPLATE_NAME: &str = "confirmation-html";
const ADMIN_NOTIFICATION_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/admin-notification.txt"
));
const CONFIRMATION_TEXT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/confirmation.txt"
));
const CONFIRMATION_HTML_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/confirmation.html"
));

const RECEIVED_AT_FORMAT: &str = "%d/%m/%Y a las %H:%M:%S";

/// A mailbox as it should appear in a header. The mail transport validates it when sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: String,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    pub fn named(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: Vec<EmailAddress>,
    pub reply_to: Option<EmailAddress>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// The two messages produced for every accepted submission, in dispatch order.
#[derive(Debug)]
pub struct Notifications {
    pub admin: OutgoingEmail,
    pub confirmation: OutgoingEmail,
}

pub struct EmailRenderer {
    business_name: String,
    admin_email: String,
    style: EmailStyle,
}

#[derive(Serialize)]
struct AdminNotificationContext<'a> {
    business_name: &'a str,
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    project_type: &'a str,
    budget: &'a str,
    start_date: &'a str,
    message: &'a str,
    received_at: &'a str,
}

#[derive(Serialize)]
struct ConfirmationContext<'a> {
    business_name: &'a str,
    name: &'a str,
    project_type: &'a str,
    message: &'a str,
    received_at: &'a str,
}

impl EmailRenderer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            business_name: config.business_name.clone(),
            admin_email: config.admin_email.clone(),
            style: config.email_style,
        }
    }

    pub fn business_name(&self) -> &str {
        &self.business_name
    }

    pub fn render(
        &self,
        submission: &ValidatedSubmission,
        received_at: &DateTime<Local>,
    ) -> Result<Notifications, Error> {
        let received_at = received_at.format(RECEIVED_AT_FORMAT).to_string();
        Ok(Notifications {
            admin: self.render_admin_notification(submission, &received_at)?,
            confirmation: self.render_confirmation(submission, &received_at)?,
        })
    }

    fn render_admin_notification(
        &self,
        submission: &ValidatedSubmission,
        received_at: &str,
    ) -> Result<OutgoingEmail, Error> {
        let context = AdminNotificationContext {
            business_name: &self.business_name,
            name: submission.name,
            email: submission.email,
            phone: submission.phone.unwrap_or(PHONE_NOT_PROVIDED),
            project_type: project_type_label(submission.project_type),
            budget: submission
                .budget
                .map(budget_label)
                .unwrap_or(BUDGET_NOT_SPECIFIED),
            start_date: submission.start_date.unwrap_or(START_DATE_NOT_SPECIFIED),
            message: submission.message,
            received_at,
        };
        let mut tt = text_templates();
        tt.add_template(ADMIN_NOTIFICATION_TEMPLATE_NAME, ADMIN_NOTIFICATION_TEMPLATE)?;
        Ok(OutgoingEmail {
            to: vec![EmailAddress::new(self.admin_email.as_str())],
            reply_to: Some(EmailAddress::named(submission.name, submission.email)),
            subject: format!(
                "Nueva consulta de {} - {}",
                submission.name, self.business_name
            ),
            text_body: tt.render(ADMIN_NOTIFICATION_TEMPLATE_NAME, &context)?,
            html_body: None,
        })
    }

    fn render_confirmation(
        &self,
        submission: &ValidatedSubmission,
        received_at: &str,
    ) -> Result<OutgoingEmail, Error> {
        let context = ConfirmationContext {
            business_name: &self.business_name,
            name: submission.name,
            project_type: project_type_label(submission.project_type),
            message: submission.message,
            received_at,
        };
        let mut tt = text_templates();
        tt.add_template(CONFIRMATION_TEXT_TEMPLATE_NAME, CONFIRMATION_TEXT_TEMPLATE)?;
        let html_body = match self.style {
            EmailStyle::Html => {
                let mut tt = TinyTemplate::new();
                tt.add_formatter("render_paragraphs", render_paragraphs);
                tt.add_template(CONFIRMATION_HTML_TEMPLATE_NAME, CONFIRMATION_HTML_TEMPLATE)?;
                Some(tt.render(CONFIRMATION_HTML_TEMPLATE_NAME, &context)?)
            }
            EmailStyle::Plain => None,
        };
        Ok(OutgoingEmail {
            to: vec![EmailAddress::new(submission.email)],
            reply_to: None,
            subject: format!("Hemos recibido tu consulta - {}", self.business_name),
            text_body: tt.render(CONFIRMATION_TEXT_TEMPLATE_NAME, &context)?,
            html_body,
        })
    }
}

fn text_templates() -> TinyTemplate<'static> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt
}

fn render_paragraphs(value: &Value, output: &mut String) -> Result<(), Error> {
    output.push_str("<p>");
    let mut formatted = String::new();
    format(value, &mut formatted)?;
    output.push_str(&formatted.replace("\n\n", "</p><p>"));
    output.push_str("</p>");
    Ok(())
}
