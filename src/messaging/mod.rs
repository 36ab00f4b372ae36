//! Private one-to-one messaging.
//!
//! A conversation is every message exchanged between an unordered pair of
//! users; there is no separate conversation table. Messages carry
//! attachments (metadata only, the bytes live in external storage),
//! emoji reactions, edit and soft-delete markers, and delivery/read
//! receipts. The inbox is derived on read, see [`inbox::summarize`].

pub mod inbox;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{PublicProfile, User};
use crate::error::{AppError, AppResult};
use crate::store::Db;

pub use inbox::{summarize, ConversationSummary};

pub const MAX_BODY_CHARS: usize = 4000;
pub const MAX_ATTACHMENTS: usize = 5;
pub const MAX_ATTACHMENT_BYTES: i64 = 10 * 1024 * 1024;
pub const MAX_EMOJI_CHARS: usize = 16;
pub const DEFAULT_THREAD_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub id: String,
    pub message_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Opaque key into the upload store.
    pub storage_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentInput {
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub reply_to_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub attachments: Vec<Attachment>,
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }

    /// The other participant, as seen from `viewer`.
    pub fn counterpart(&self, viewer: &str) -> &str {
        if self.sender_id == viewer {
            &self.recipient_id
        } else {
            &self.sender_id
        }
    }

    pub fn status(&self) -> DeliveryStatus {
        if self.read_at.is_some() {
            DeliveryStatus::Read
        } else if self.delivered_at.is_some() {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Sent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: u32,
    pub reacted_by_me: bool,
}

/// Collapse reactions per emoji, most used first.
pub fn summarize_reactions(reactions: &[Reaction], viewer: &str) -> Vec<ReactionSummary> {
    let mut by_emoji: BTreeMap<&str, ReactionSummary> = BTreeMap::new();
    for reaction in reactions {
        let entry = by_emoji
            .entry(reaction.emoji.as_str())
            .or_insert_with(|| ReactionSummary {
                emoji: reaction.emoji.clone(),
                count: 0,
                reacted_by_me: false,
            });
        entry.count += 1;
        entry.reacted_by_me |= reaction.user_id == viewer;
    }
    let mut summaries: Vec<ReactionSummary> = by_emoji.into_values().collect();
    // Stable sort keeps the BTreeMap's emoji order among equal counts.
    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    /// `None` once deleted.
    pub body: Option<String>,
    pub reply_to_id: Option<String>,
    pub attachments: Vec<Attachment>,
    pub reactions: Vec<ReactionSummary>,
    pub status: DeliveryStatus,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl MessageView {
    pub fn new(message: &Message, viewer: &str) -> Self {
        MessageView {
            id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            recipient_id: message.recipient_id.clone(),
            body: (!message.is_deleted()).then(|| message.body.clone()),
            reply_to_id: message.reply_to_id.clone(),
            attachments: message.attachments.clone(),
            reactions: summarize_reactions(&message.reactions, viewer),
            status: message.status(),
            deleted: message.is_deleted(),
            created_at: message.created_at,
            edited_at: message.edited_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub body: String,
    pub reply_to_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub counterpart: PublicProfile,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    #[serde(flatten)]
    pub summary: ConversationSummary,
    pub counterpart_name: String,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_body(body: &str, has_attachments: bool) -> AppResult<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() && !has_attachments {
        return Err(AppError::validation("message cannot be empty"));
    }
    if trimmed.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::validation(format!(
            "message must be at most {} characters",
            MAX_BODY_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_attachments(inputs: &[AttachmentInput]) -> AppResult<()> {
    if inputs.len() > MAX_ATTACHMENTS {
        return Err(AppError::validation(format!(
            "at most {} attachments per message",
            MAX_ATTACHMENTS
        )));
    }
    for input in inputs {
        if input.file_name.trim().is_empty() || input.storage_key.trim().is_empty() {
            return Err(AppError::validation("attachments need a file name and storage key"));
        }
        if input.size_bytes < 0 || input.size_bytes > MAX_ATTACHMENT_BYTES {
            return Err(AppError::validation(format!(
                "attachment '{}' exceeds {} bytes",
                input.file_name.trim(),
                MAX_ATTACHMENT_BYTES
            )));
        }
    }
    Ok(())
}

fn validate_emoji(emoji: &str) -> AppResult<&str> {
    let len = emoji.chars().count();
    if len == 0 || len > MAX_EMOJI_CHARS || emoji.chars().any(char::is_whitespace) {
        return Err(AppError::validation("invalid reaction"));
    }
    Ok(emoji)
}

fn load_message(db: &Db, message_id: &str) -> AppResult<Message> {
    db.find_message(message_id)?
        .ok_or_else(|| AppError::not_found("message"))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub fn send_message(db: &Db, sender: &User, recipient_id: &str, input: NewMessage) -> AppResult<Message> {
    if recipient_id == sender.id {
        return Err(AppError::validation("you cannot message yourself"));
    }
    db.find_user(recipient_id)?
        .ok_or_else(|| AppError::not_found("recipient"))?;
    validate_attachments(&input.attachments)?;
    let body = validate_body(&input.body, !input.attachments.is_empty())?;

    if let Some(parent_id) = &input.reply_to_id {
        let parent = load_message(db, parent_id)?;
        if !(parent.involves(&sender.id) && parent.involves(recipient_id)) {
            return Err(AppError::validation("replies must stay in the same conversation"));
        }
    }

    let id = Uuid::new_v4().to_string();
    let attachments = input
        .attachments
        .into_iter()
        .map(|a| Attachment {
            id: Uuid::new_v4().to_string(),
            message_id: id.clone(),
            file_name: a.file_name.trim().to_string(),
            content_type: a.content_type,
            size_bytes: a.size_bytes,
            storage_key: a.storage_key,
        })
        .collect();
    let message = Message {
        id,
        sender_id: sender.id.clone(),
        recipient_id: recipient_id.to_string(),
        body,
        reply_to_id: input.reply_to_id,
        created_at: Utc::now(),
        edited_at: None,
        deleted_at: None,
        delivered_at: None,
        read_at: None,
        attachments,
        reactions: Vec::new(),
    };
    db.insert_message(&message)?;
    tracing::debug!(message_id = %message.id, "message sent");
    Ok(message)
}

pub fn edit_message(db: &Db, actor: &User, message_id: &str, body: &str) -> AppResult<Message> {
    let mut message = load_message(db, message_id)?;
    if message.sender_id != actor.id {
        return Err(AppError::forbidden("only the sender can edit a message"));
    }
    if message.is_deleted() {
        return Err(AppError::conflict("message has been deleted"));
    }
    message.body = validate_body(body, !message.attachments.is_empty())?;
    message.edited_at = Some(Utc::now());
    db.update_message_body(&message.id, &message.body, message.edited_at)?;
    Ok(message)
}

pub fn delete_message(db: &Db, actor: &User, message_id: &str) -> AppResult<()> {
    let message = load_message(db, message_id)?;
    if message.sender_id != actor.id {
        return Err(AppError::forbidden("only the sender can delete a message"));
    }
    if message.is_deleted() {
        return Err(AppError::conflict("message already deleted"));
    }
    db.soft_delete_message(message_id, Utc::now())
}

/// Add the reaction, or remove it if the actor already used that emoji.
pub fn toggle_reaction(
    db: &Db,
    actor: &User,
    message_id: &str,
    emoji: &str,
) -> AppResult<Vec<ReactionSummary>> {
    let emoji = validate_emoji(emoji)?;
    let message = load_message(db, message_id)?;
    if !message.involves(&actor.id) {
        return Err(AppError::forbidden("not a participant in this conversation"));
    }
    if message.is_deleted() {
        return Err(AppError::conflict("message has been deleted"));
    }
    db.toggle_reaction(message_id, &actor.id, emoji, Utc::now())?;
    let updated = load_message(db, message_id)?;
    Ok(summarize_reactions(&updated.reactions, &actor.id))
}

/// Open the thread with `counterpart_id`, marking incoming messages read.
pub fn open_conversation(
    db: &Db,
    viewer: &User,
    counterpart_id: &str,
    limit: usize,
) -> AppResult<ConversationView> {
    let counterpart = db
        .find_user(counterpart_id)?
        .ok_or_else(|| AppError::not_found("user"))?;
    let marked = db.mark_read(&viewer.id, counterpart_id, Utc::now())?;
    if marked > 0 {
        tracing::debug!(viewer = %viewer.id, marked, "messages marked read");
    }
    let messages = db.conversation(&viewer.id, counterpart_id, limit.clamp(1, 500))?;
    Ok(ConversationView {
        counterpart: counterpart.profile(),
        messages: messages.iter().map(|m| MessageView::new(m, &viewer.id)).collect(),
    })
}

/// Inbox for `viewer`. Fetching it counts as delivery of pending messages.
pub fn inbox(db: &Db, viewer: &User) -> AppResult<Vec<InboxEntry>> {
    db.mark_delivered(&viewer.id, Utc::now())?;
    let messages = db.messages_involving(&viewer.id)?;
    let summaries = summarize(&viewer.id, &messages);

    let ids: Vec<String> = summaries.iter().map(|s| s.counterpart_id.clone()).collect();
    let users = db.users_by_ids(&ids)?;
    Ok(summaries
        .into_iter()
        .map(|summary| InboxEntry {
            counterpart_name: users
                .get(&summary.counterpart_id)
                .map(|u| u.display_name.clone())
                .unwrap_or_else(|| "Deleted user".to_string()),
            summary,
        })
        .collect())
}

pub fn unread_count(db: &Db, viewer: &User) -> AppResult<u32> {
    db.unread_count(&viewer.id)
}
