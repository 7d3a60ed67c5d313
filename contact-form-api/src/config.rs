use axum::http::{header, HeaderValue, Method};
use clap::{Args, Parser, ValueEnum};
use lettre::transport::smtp::authentication::Credentials;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

const PRODUCTION: &str = "production";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Contact form backend")]
pub struct Config {
    /// Deployment environment. `production` restricts CORS to `--cors-origins`.
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Origins allowed to call the API in production.
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_values_t = [
            "https://a-fabrica.es".to_string(),
            "https://www.a-fabrica.es".to_string(),
            "http://localhost:5173".to_string(),
            "http://localhost:3000".to_string(),
        ]
    )]
    pub cors_origins: Vec<String>,

    #[command(flatten)]
    pub mail: MailConfig,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cors_layer(&self) -> CorsLayer {
        if !self.is_production() {
            return CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
        }
        let origins = self
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {origin:?}");
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    }
}

#[derive(Args, Debug, Clone)]
pub struct MailConfig {
    /// Name of the business, used in subjects and message bodies.
    #[arg(long, env = "BUSINESS_NAME", default_value = "A Fábrica")]
    pub business_name: String,

    #[arg(long, env = "MAIL_SERVER", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    #[arg(long, env = "MAIL_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "MAIL_SECURITY", value_enum, default_value_t = SmtpSecurity::StartTls)]
    pub smtp_security: SmtpSecurity,

    /// Timeout applied to each SMTP command.
    #[arg(long, env = "MAIL_TIMEOUT_SECS", default_value_t = 10)]
    pub smtp_timeout_secs: u64,

    #[arg(long = "email-user", env = "EMAIL_USER")]
    pub username: Option<String>,

    #[arg(long = "email-pass", env = "EMAIL_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Sender mailbox. Defaults to the business name with the SMTP username as address.
    #[arg(long = "email-from", env = "EMAIL_FROM")]
    pub from: Option<String>,

    /// Recipient of the notification for each new submission.
    #[arg(long, env = "ADMIN_EMAIL", default_value = "info@a-fabrica.es")]
    pub admin_email: String,

    #[arg(long, env = "EMAIL_STYLE", value_enum, default_value_t = EmailStyle::Html)]
    pub email_style: EmailStyle,
}

impl MailConfig {
    /// SMTP credentials, present only when both username and password are non-empty.
    pub fn credentials(&self) -> Option<Credentials> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials::new(username.into(), password.into()))
            }
            _ => None,
        }
    }

    pub fn sender(&self) -> Option<String> {
        match (self.from.as_deref(), self.username.as_deref()) {
            (Some(from), _) if !from.is_empty() => Some(from.into()),
            (_, Some(username)) if !username.is_empty() => {
                Some(format!("{} <{username}>", self.business_name))
            }
            _ => None,
        }
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (usually port 587).
    #[value(name = "starttls")]
    StartTls,
    /// Implicit TLS from the first byte (usually port 465).
    Tls,
    /// No encryption. Only for local relays.
    None,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailStyle {
    Plain,
    Html,
}


#[cfg(test)]
mod tests {
    use super::{Config, EmailStyle, SmtpSecurity};
    use clap::Parser;
    use googletest::prelude::*;

    const MAIL_ENV_VARS: [&str; 3] = ["EMAIL_USER", "EMAIL_PASS", "EMAIL_FROM"];

    fn parse(args: &[&str]) -> Config {
        for var in MAIL_ENV_VARS {
            std::env::remove_var(var);
        }
        Config::try_parse_from(std::iter::once("contact-form-api").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn credentials_require_username_and_password() -> Result<()> {
        let config = parse(&["--email-user", "user@example.com"]);

        verify_that!(config.mail.credentials().is_some(), eq(false))
    }

    #[test]
    fn empty_password_counts_as_unconfigured() -> Result<()> {
        let config = parse(&["--email-user", "user@example.com", "--email-pass", ""]);

        verify_that!(config.mail.credentials().is_some(), eq(false))
    }

    #[test]
    fn credentials_present_when_both_are_set() -> Result<()> {
        let config = parse(&["--email-user", "user@example.com", "--email-pass", "secret"]);

        verify_that!(config.mail.credentials().is_some(), eq(true))
    }

    #[test]
    fn sender_defaults_to_business_name_and_username() -> Result<()> {
        let config = parse(&[
            "--email-user",
            "user@example.com",
            "--business-name",
            "Test Studio",
        ]);

        verify_that!(
            config.mail.sender(),
            some(eq("Test Studio <user@example.com>"))
        )
    }

    #[test]
    fn explicit_sender_wins() -> Result<()> {
        let config = parse(&[
            "--email-user",
            "user@example.com",
            "--email-from",
            "Web <noreply@example.com>",
        ]);

        verify_that!(config.mail.sender(), some(eq("Web <noreply@example.com>")))
    }

    #[test]
    fn accepts_credentials_and_sender_flags() -> Result<()> {
        let config = parse(&[
            "--email-user",
            "u@example.com",
            "--email-pass",
            "secret",
            "--email-from",
            "A <a@example.com>",
        ]);

        verify_that!(config.mail.username.as_deref(), some(eq("u@example.com")))?;
        verify_that!(config.mail.password.as_deref(), some(eq("secret")))?;
        verify_that!(config.mail.from.as_deref(), some(eq("A <a@example.com>")))
    }

    #[test]
    fn parses_security_and_style() -> Result<()> {
        let config = parse(&["--smtp-security", "none", "--email-style", "plain"]);

        verify_that!(config.mail.smtp_security, eq(SmtpSecurity::None))?;
        verify_that!(config.mail.email_style, eq(EmailStyle::Plain))
    }

    #[test]
    fn only_production_is_production() -> Result<()> {
        verify_that!(parse(&["--environment", "production"]).is_production(), eq(true))?;
        verify_that!(parse(&["--environment", "staging"]).is_production(), eq(false))
    }

    #[test]
    fn splits_cors_origins_on_commas() -> Result<()> {
        let config = parse(&["--cors-origins", "https://a.example,https://b.example"]);

        verify_that!(
            config.cors_origins,
            elements_are![eq("https://a.example"), eq("https://b.example")]
        )
    }
}
