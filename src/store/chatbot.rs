use rusqlite::{params, OptionalExtension, Row};

use super::Db;
use crate::chatbot::{ChatMessage, Conversation};
use crate::error::AppResult;

const CONVERSATION_COLUMNS: &str =
    "id, user_id, module_id, title, escalated_request_id, created_at, updated_at";

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        module_id: row.get(2)?,
        title: row.get(3)?,
        escalated_request_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Db {
    pub fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chatbot_conversations
                     (id, user_id, module_id, title, escalated_request_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    conversation.id,
                    conversation.user_id,
                    conversation.module_id,
                    conversation.title,
                    conversation.escalated_request_id,
                    conversation.created_at,
                    conversation.updated_at
                ],
            )
        })?;
        Ok(())
    }

    pub fn find_conversation(&self, id: &str) -> AppResult<Option<Conversation>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM chatbot_conversations WHERE id = ?1", CONVERSATION_COLUMNS),
                [id],
                conversation_from_row,
            )
            .optional()
        })
    }

    /// A user's conversations, most recently used first.
    pub fn list_conversations(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM chatbot_conversations WHERE user_id = ?1
                 ORDER BY updated_at DESC, rowid DESC",
                CONVERSATION_COLUMNS
            ))?;
            let rows = stmt.query_map([user_id], conversation_from_row)?;
            let conversations = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(conversations)
        })
    }

    /// Saves title and activity time. The escalation link is only written by
    /// `insert_escalated_request`.
    pub fn update_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE chatbot_conversations SET title = ?2, updated_at = ?3 WHERE id = ?1",
                params![conversation.id, conversation.title, conversation.updated_at],
            )
        })?;
        Ok(())
    }

    pub fn insert_chat_message(&self, message: &ChatMessage) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chatbot_messages (id, conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.conversation_id,
                    message.role,
                    message.content,
                    message.created_at
                ],
            )
        })?;
        Ok(())
    }

    /// Every stored turn of a conversation, oldest first.
    pub fn chat_messages(&self, conversation_id: &str) -> AppResult<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, created_at FROM chatbot_messages
                 WHERE conversation_id = ?1 ORDER BY created_at, rowid",
            )?;
            let rows = stmt.query_map([conversation_id], |row| {
                Ok(ChatMessage {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            let messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })
    }
}
