use anyhow::Context;
use clap::Parser;
use contact_form_api::{
    config::Config,
    email::EmailRenderer,
    handler::ContactFormHandler,
    mailer::{MailTransport, SmtpMailer},
    router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.is_production() {
            tracing::Level::INFO
        } else {
            tracing::Level::DEBUG
        })
        .with_target(false)
        .init();

    let mailer = SmtpMailer::new(config.mail.clone());
    if !mailer.is_configured() {
        warn!("EMAIL_USER or EMAIL_PASS not set; submissions will be accepted but no email sent");
    }
    let handler = Arc::new(ContactFormHandler::new(
        mailer,
        EmailRenderer::new(&config.mail),
    ));
    let app = router(handler, config.cors_layer());

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Unable to bind to {address}"))?;
    info!(
        environment = %config.environment,
        "{} contact API listening on {address}",
        config.mail.business_name
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for shutdown signal: {error}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
