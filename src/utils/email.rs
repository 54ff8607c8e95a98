// src/utils/email.rs
//
// Outbound email is an external collaborator: the handlers depend on the
// `Mailer` trait only. The default transport logs the message, which is
// what development and tests want; a real SMTP transport plugs in behind
// the same trait.

use async_trait::async_trait;

use crate::error::AppError;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;

    async fn send_welcome(&self, to: &str, name: &str) -> Result<(), AppError> {
        let body = format!("welcome to imgsuch, {}!", first_name(name));
        self.send(to, "Welcome to imgsuch!", &body).await
    }

    async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        reset_url: &str,
    ) -> Result<(), AppError> {
        let body = format!(
            "hi {}, submit a PATCH request with your new password to {} \
             (the link is valid for 10 minutes)",
            first_name(name),
            reset_url
        );
        self.send(to, "Reset your password", &body).await
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

/// Development transport: writes the message to the log instead of the wire.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        tracing::info!(to, subject, body, "outbound email");
        Ok(())
    }
}
