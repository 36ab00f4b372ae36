//! Direct messages with their attachments and reactions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{placeholders, Db};
use crate::error::AppResult;
use crate::messaging::{Attachment, Message, Reaction};

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, body, reply_to_id, created_at, \
     edited_at, deleted_at, delivered_at, read_at";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        body: row.get(3)?,
        reply_to_id: row.get(4)?,
        created_at: row.get(5)?,
        edited_at: row.get(6)?,
        deleted_at: row.get(7)?,
        delivered_at: row.get(8)?,
        read_at: row.get(9)?,
        attachments: Vec::new(),
        reactions: Vec::new(),
    })
}

/// Fill in attachments and reactions for `messages` with two IN queries.
fn hydrate(conn: &Connection, messages: &mut [Message]) -> rusqlite::Result<()> {
    if messages.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
    let marks = placeholders(ids.len());

    let mut stmt = conn.prepare(&format!(
        "SELECT id, message_id, file_name, content_type, size_bytes, storage_key
         FROM message_attachments WHERE message_id IN ({}) ORDER BY rowid",
        marks
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok(Attachment {
            id: row.get(0)?,
            message_id: row.get(1)?,
            file_name: row.get(2)?,
            content_type: row.get(3)?,
            size_bytes: row.get(4)?,
            storage_key: row.get(5)?,
        })
    })?;
    let mut attachments: HashMap<String, Vec<Attachment>> = HashMap::new();
    for attachment in rows {
        let attachment = attachment?;
        attachments
            .entry(attachment.message_id.clone())
            .or_default()
            .push(attachment);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT message_id, user_id, emoji, created_at
         FROM message_reactions WHERE message_id IN ({}) ORDER BY created_at, rowid",
        marks
    ))?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok(Reaction {
            message_id: row.get(0)?,
            user_id: row.get(1)?,
            emoji: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;
    let mut reactions: HashMap<String, Vec<Reaction>> = HashMap::new();
    for reaction in rows {
        let reaction = reaction?;
        reactions
            .entry(reaction.message_id.clone())
            .or_default()
            .push(reaction);
    }

    for message in messages.iter_mut() {
        message.attachments = attachments.remove(&message.id).unwrap_or_default();
        message.reactions = reactions.remove(&message.id).unwrap_or_default();
    }
    Ok(())
}

impl Db {
    pub fn insert_message(&self, message: &Message) -> AppResult<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, body, reply_to_id, created_at,
                                       edited_at, deleted_at, delivered_at, read_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    message.id,
                    message.sender_id,
                    message.recipient_id,
                    message.body,
                    message.reply_to_id,
                    message.created_at,
                    message.edited_at,
                    message.deleted_at,
                    message.delivered_at,
                    message.read_at
                ],
            )?;
            let mut stmt = tx.prepare(
                "INSERT INTO message_attachments (id, message_id, file_name, content_type, size_bytes, storage_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for a in &message.attachments {
                stmt.execute(params![
                    a.id,
                    a.message_id,
                    a.file_name,
                    a.content_type,
                    a.size_bytes,
                    a.storage_key
                ])?;
            }
            Ok(())
        })
    }

    pub fn find_message(&self, id: &str) -> AppResult<Option<Message>> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
                    [id],
                    message_from_row,
                )
                .optional()?;
            match found {
                Some(message) => {
                    let mut one = [message];
                    hydrate(conn, &mut one)?;
                    let [message] = one;
                    Ok(Some(message))
                }
                None => Ok(None),
            }
        })
    }

    pub fn update_message_body(&self, id: &str, body: &str, edited_at: Option<DateTime<Utc>>) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET body = ?2, edited_at = ?3 WHERE id = ?1",
                params![id, body, edited_at],
            )
        })?;
        Ok(())
    }

    /// Blank the body and drop attachments and reactions. The row stays so
    /// the thread keeps its shape.
    pub fn soft_delete_message(&self, id: &str, at: DateTime<Utc>) -> AppResult<()> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE messages SET body = '', deleted_at = ?2 WHERE id = ?1",
                params![id, at],
            )?;
            tx.execute("DELETE FROM message_attachments WHERE message_id = ?1", [id])?;
            tx.execute("DELETE FROM message_reactions WHERE message_id = ?1", [id])?;
            Ok(())
        })
    }

    /// Returns `true` when the reaction was added, `false` when removed.
    pub fn toggle_reaction(&self, message_id: &str, user_id: &str, emoji: &str, at: DateTime<Utc>) -> AppResult<bool> {
        self.with_tx(|tx| {
            let removed = tx.execute(
                "DELETE FROM message_reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                params![message_id, user_id, emoji],
            )?;
            if removed > 0 {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO message_reactions (message_id, user_id, emoji, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id, user_id, emoji, at],
            )?;
            Ok(true)
        })
    }

    /// Mark everything `counterpart_id` sent to `viewer_id` as read, deleted
    /// messages included so their sender still sees a receipt.
    pub fn mark_read(&self, viewer_id: &str, counterpart_id: &str, at: DateTime<Utc>) -> AppResult<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET read_at = ?3, delivered_at = COALESCE(delivered_at, ?3)
                 WHERE recipient_id = ?1 AND sender_id = ?2 AND read_at IS NULL",
                params![viewer_id, counterpart_id, at],
            )
        })
    }

    pub fn mark_delivered(&self, viewer_id: &str, at: DateTime<Utc>) -> AppResult<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET delivered_at = ?2
                 WHERE recipient_id = ?1 AND delivered_at IS NULL",
                params![viewer_id, at],
            )
        })
    }

    /// The latest `limit` messages between two users, oldest first.
    pub fn conversation(&self, a: &str, b: &str, limit: usize) -> AppResult<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages
                 WHERE (sender_id = ?1 AND recipient_id = ?2) OR (sender_id = ?2 AND recipient_id = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![a, b, limit as i64], message_from_row)?;
            let mut messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            messages.reverse();
            hydrate(conn, &mut messages)?;
            Ok(messages)
        })
    }

    pub fn messages_involving(&self, user_id: &str) -> AppResult<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE sender_id = ?1 OR recipient_id = ?1
                 ORDER BY created_at, rowid",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt.query_map([user_id], message_from_row)?;
            let mut messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            hydrate(conn, &mut messages)?;
            Ok(messages)
        })
    }

    pub fn unread_count(&self, user_id: &str) -> AppResult<u32> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE recipient_id = ?1 AND read_at IS NULL AND deleted_at IS NULL",
                [user_id],
                |row| row.get(0),
            )
        })
    }
}
