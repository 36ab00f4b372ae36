//! AI study assistant.
//!
//! Each student keeps any number of chatbot conversations, optionally scoped
//! to a module. Every question is stored, replayed with recent history to
//! the completion provider, and the answer stored alongside. A conversation
//! can be escalated to a human tutor, see [`crate::tutoring::escalate`].

pub mod client;
pub mod prompt;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::User;
use crate::error::{AppError, AppResult};
use crate::store::Db;

pub use client::{HttpCompletionClient, UnconfiguredCompletion};

const MAX_QUESTION_CHARS: usize = 4000;

#[derive(Debug, Error)]
pub enum ChatbotError {
    #[error("the study assistant is not configured on this server")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("completion API returned no content")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ChatRole::System),
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("unknown chat role '{}'", other)),
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn as sent to the completion provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Anything that can answer a list of turns.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, ChatbotError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub module_id: Option<String>,
    pub title: String,
    /// Set once the conversation was escalated to a tutor request.
    pub escalated_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub question: ChatMessage,
    pub answer: ChatMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewConversation {
    pub module_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub content: String,
}

/// Load a conversation, requiring `user` to own it.
pub fn owned_conversation(db: &Db, user: &User, conversation_id: &str) -> AppResult<Conversation> {
    let conversation = db
        .find_conversation(conversation_id)?
        .ok_or_else(|| AppError::not_found("conversation"))?;
    if conversation.user_id != user.id {
        // Same answer as a missing id, conversations are private.
        return Err(AppError::not_found("conversation"));
    }
    Ok(conversation)
}

pub fn start_conversation(db: &Db, user: &User, input: NewConversation) -> AppResult<Conversation> {
    if let Some(module_id) = &input.module_id {
        db.find_module(module_id)?
            .ok_or_else(|| AppError::not_found("module"))?;
    }
    let now = Utc::now();
    let conversation = Conversation {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        module_id: input.module_id,
        title: "New conversation".to_string(),
        escalated_request_id: None,
        created_at: now,
        updated_at: now,
    };
    db.insert_conversation(&conversation)?;
    Ok(conversation)
}

pub fn conversation_detail(db: &Db, user: &User, conversation_id: &str) -> AppResult<ConversationDetail> {
    let conversation = owned_conversation(db, user, conversation_id)?;
    let messages = db.chat_messages(conversation_id)?;
    Ok(ConversationDetail {
        conversation,
        messages,
    })
}

fn stored_turn(conversation_id: &str, role: ChatRole, content: String) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation_id.to_string(),
        role,
        content,
        created_at: Utc::now(),
    }
}

/// Store the question, ask the provider, store the answer.
///
/// A provider failure leaves the question stored so the student can retry.
pub async fn ask(
    db: &Db,
    client: &dyn CompletionClient,
    max_history: usize,
    user: &User,
    conversation_id: &str,
    question: &str,
) -> AppResult<Exchange> {
    let mut conversation = owned_conversation(db, user, conversation_id)?;
    let question = question.trim();
    if question.is_empty() || question.chars().count() > MAX_QUESTION_CHARS {
        return Err(AppError::validation(format!(
            "question must be 1 to {} characters",
            MAX_QUESTION_CHARS
        )));
    }

    let first_question = db.chat_messages(conversation_id)?.is_empty();
    let question = stored_turn(conversation_id, ChatRole::User, question.to_string());
    db.insert_chat_message(&question)?;
    if first_question {
        conversation.title = prompt::title_from(&question.content);
    }
    conversation.updated_at = question.created_at;
    db.update_conversation(&conversation)?;

    let module = match &conversation.module_id {
        Some(id) => db.find_module(id)?,
        None => None,
    };
    let history = db.chat_messages(conversation_id)?;
    let turns = prompt::build_prompt(module.as_ref(), &history, max_history);

    let reply = client.complete(&turns).await.map_err(|err| {
        tracing::warn!(conversation_id, error = %err, "completion failed");
        AppError::from(err)
    })?;

    let answer = stored_turn(conversation_id, ChatRole::Assistant, reply);
    db.insert_chat_message(&answer)?;
    conversation.updated_at = answer.created_at;
    db.update_conversation(&conversation)?;

    Ok(Exchange { question, answer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_user, ScriptedCompletion, TestWorld};
    use crate::auth::Role;

    #[tokio::test]
    async fn test_ask_stores_both_turns_and_titles() {
        let world = TestWorld::new();
        let client = ScriptedCompletion::replying("Big-O bounds growth.");
        let conversation = start_conversation(
            &world.db,
            &world.student,
            NewConversation { module_id: Some(world.module.id.clone()) },
        )
        .unwrap();

        let exchange = ask(&world.db, &client, 20, &world.student, &conversation.id, "What is Big-O?")
            .await
            .unwrap();
        assert_eq!(exchange.answer.content, "Big-O bounds growth.");

        let detail = conversation_detail(&world.db, &world.student, &conversation.id).unwrap();
        assert_eq!(detail.conversation.title, "What is Big-O?");
        let roles: Vec<ChatRole> = detail.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant]);

        // The provider saw the module-scoped system prompt and the question.
        let seen = client.last_prompt();
        assert_eq!(seen[0].role, ChatRole::System);
        assert!(seen[0].content.contains(&world.module.code));
        assert_eq!(seen.last().unwrap().content, "What is Big-O?");
    }

    #[tokio::test]
    async fn test_title_only_set_by_first_question() {
        let world = TestWorld::new();
        let client = ScriptedCompletion::replying("ok");
        let conversation = start_conversation(&world.db, &world.student, NewConversation::default()).unwrap();
        ask(&world.db, &client, 20, &world.student, &conversation.id, "First").await.unwrap();
        ask(&world.db, &client, 20, &world.student, &conversation.id, "Second").await.unwrap();
        let stored = world.db.find_conversation(&conversation.id).unwrap().unwrap();
        assert_eq!(stored.title, "First");
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_question() {
        let world = TestWorld::new();
        let conversation = start_conversation(&world.db, &world.student, NewConversation::default()).unwrap();
        let err = ask(&world.db, &UnconfiguredCompletion, 20, &world.student, &conversation.id, "Hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));

        let messages = world.db.chat_messages(&conversation.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, ChatRole::User);
    }

    #[tokio::test]
    async fn test_conversations_are_private() {
        let world = TestWorld::new();
        let other = seed_user(&world.db, "olly", Role::Student);
        let conversation = start_conversation(&world.db, &world.student, NewConversation::default()).unwrap();

        let err = conversation_detail(&world.db, &other, &conversation.id).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let client = ScriptedCompletion::replying("nope");
        let err = ask(&world.db, &client, 20, &other, &conversation.id, "peek").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_unknown_module_rejected() {
        let world = TestWorld::new();
        let err = start_conversation(
            &world.db,
            &world.student,
            NewConversation { module_id: Some("missing".into()) },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let world = TestWorld::new();
        let conversation = start_conversation(&world.db, &world.student, NewConversation::default()).unwrap();
        let client = ScriptedCompletion::replying("unused");
        let err = ask(&world.db, &client, 20, &world.student, &conversation.id, "  ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
