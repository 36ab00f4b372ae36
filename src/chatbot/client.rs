//! Completion clients.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ChatTurn, ChatbotError, CompletionClient};
use crate::config::ChatbotConfig;

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
}

impl HttpCompletionClient {
    pub fn new(config: &ChatbotConfig, api_key: String) -> Result<Self, ChatbotError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn request_body(&self, turns: &[ChatTurn]) -> Value {
        let messages: Vec<Value> = turns
            .iter()
            .map(|t| json!({ "role": t.role.as_str(), "content": t.content }))
            .collect();
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }
}

/// Pull `choices[0].message.content` out of a completion response.
pub fn extract_content(response: &Value) -> Result<String, ChatbotError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ChatbotError::EmptyResponse)
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, ChatbotError> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(turns))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatbotError::Api { status, body });
        }

        let json: Value = resp.json().await?;
        extract_content(&json)
    }
}

/// Stand-in used when no API key is configured.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredCompletion;

#[async_trait]
impl CompletionClient for UnconfiguredCompletion {
    async fn complete(&self, _turns: &[ChatTurn]) -> Result<String, ChatbotError> {
        Err(ChatbotError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::ChatRole;
    use crate::config::AppConfig;

    #[test]
    fn test_request_body() {
        let config = AppConfig::default();
        let client = HttpCompletionClient::new(&config.chatbot, "sk".into()).unwrap();
        let body = client.request_body(&[
            ChatTurn::new(ChatRole::System, "be helpful"),
            ChatTurn::new(ChatRole::User, "what is a monad?"),
        ]);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "what is a monad?");
        assert_eq!(body["temperature"], 0.3);
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({ "choices": [ { "message": { "role": "assistant", "content": " Hi! " } } ] });
        assert_eq!(extract_content(&ok).unwrap(), "Hi!");

        let empty = json!({ "choices": [] });
        assert!(matches!(extract_content(&empty), Err(ChatbotError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let err = UnconfiguredCompletion.complete(&[]).await.unwrap_err();
        assert!(matches!(err, ChatbotError::NotConfigured));
    }

    #[tokio::test]
    async fn test_stalled_provider_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = AppConfig::default().chatbot;
        config.base_url = format!("http://{}", addr);
        config.timeout_secs = 1;
        let client = HttpCompletionClient::new(&config, "sk".into()).unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            client.complete(&[ChatTurn::new(ChatRole::User, "hello?")]),
        )
        .await;
        let err = outcome.expect("completion should give up on its own").unwrap_err();
        assert!(matches!(err, ChatbotError::Http(ref e) if e.is_timeout()));
    }
}
