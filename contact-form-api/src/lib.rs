pub mod config;
pub mod email;
pub mod handler;
pub mod labels;
pub mod mailer;
pub mod routes;
pub mod submission;

pub use routes::router;
