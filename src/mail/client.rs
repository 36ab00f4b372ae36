//! HTTP mailer for SendGrid-style v3 APIs.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Email, MailError, Mailer};
use crate::config::MailConfig;

pub struct HttpMailer {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    from_address: String,
    from_name: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig, api_key: String) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.clone(),
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
        })
    }

    /// Request body for `POST /mail/send`.
    pub fn payload(&self, email: &Email) -> Value {
        json!({
            "personalizations": [
                { "to": [ { "email": email.to } ] }
            ],
            "from": { "email": self.from_address, "name": self.from_name },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.body }
            ],
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let resp = self
            .http
            .post(format!("{}/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }
        tracing::debug!(to = %email.to, "email accepted by provider");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_payload_shape() {
        let config = AppConfig::default();
        let mailer = HttpMailer::new(&config.mail, "key".into()).unwrap();
        let payload = mailer.payload(&Email {
            to: "ada@example.edu".into(),
            subject: "New reply".into(),
            body: "Someone answered.".into(),
        });
        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "ada@example.edu");
        assert_eq!(payload["from"]["email"], "no-reply@tutorhub.local");
        assert_eq!(payload["from"]["name"], "TutorHub");
        assert_eq!(payload["subject"], "New reply");
        assert_eq!(payload["content"][0]["type"], "text/plain");
        assert_eq!(payload["content"][0]["value"], "Someone answered.");
    }

    #[tokio::test]
    async fn test_stalled_provider_times_out() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = AppConfig::default().mail;
        config.base_url = format!("http://{}", addr);
        config.timeout_secs = 1;
        let mailer = HttpMailer::new(&config, "key".into()).unwrap();
        let email = Email {
            to: "ada@example.edu".into(),
            subject: "New reply".into(),
            body: "Someone answered.".into(),
        };

        let outcome = tokio::time::timeout(Duration::from_secs(5), mailer.send(&email)).await;
        let err = outcome.expect("send should give up on its own").unwrap_err();
        assert!(matches!(err, MailError::Http(ref e) if e.is_timeout()));
    }
}
