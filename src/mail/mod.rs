//! Outgoing email.
//!
//! The delivery provider is consumed through its JSON API only. Without an
//! API key the [`LogMailer`] is used and messages are written to the log.

pub mod client;
pub mod templates;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use client::HttpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail provider returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

/// A single plain-text email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Logs instead of delivering.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "email delivery disabled, not sending");
        Ok(())
    }
}

/// Collects emails in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryMailer {
    pub sent: parking_lot::Mutex<Vec<Email>>,
}

#[cfg(test)]
impl MemoryMailer {
    pub fn sent_to(&self, address: &str) -> Vec<Email> {
        self.sent
            .lock()
            .iter()
            .filter(|e| e.to == address)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().push(email.clone());
        Ok(())
    }
}
