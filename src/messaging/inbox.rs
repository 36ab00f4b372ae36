//! Per-user inbox summary derived from the flat message table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DeliveryStatus, Message};

const PREVIEW_CHARS: usize = 80;

/// One row of the inbox: the latest state of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub counterpart_id: String,
    pub last_message_id: String,
    pub preview: String,
    pub last_sender_id: String,
    pub last_activity_at: DateTime<Utc>,
    /// Incoming messages not yet read (deleted ones excluded).
    pub unread_count: u32,
    pub message_count: u32,
    pub last_status: DeliveryStatus,
}

/// Short text shown for a message in the inbox.
pub fn preview(message: &Message) -> String {
    if message.is_deleted() {
        return "Message deleted".to_string();
    }
    let body = message.body.trim();
    if body.is_empty() {
        let n = message.attachments.len();
        return format!("[{} attachment{}]", n, if n == 1 { "" } else { "s" });
    }
    if body.chars().count() > PREVIEW_CHARS {
        let cut: String = body.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut.trim_end())
    } else {
        body.to_string()
    }
}

/// Group `messages` by counterpart of `viewer` and summarise each group.
///
/// Messages not involving the viewer are ignored. Entries are ordered by
/// last activity, newest first, with the counterpart id breaking ties.
pub fn summarize(viewer: &str, messages: &[Message]) -> Vec<ConversationSummary> {
    let mut groups: HashMap<&str, Vec<&Message>> = HashMap::new();
    for message in messages.iter().filter(|m| m.involves(viewer)) {
        groups.entry(message.counterpart(viewer)).or_default().push(message);
    }

    let mut summaries: Vec<ConversationSummary> = groups
        .into_iter()
        .filter_map(|(counterpart, group)| {
            let last = group
                .iter()
                .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))?;
            let unread = group
                .iter()
                .filter(|m| m.recipient_id == viewer && m.read_at.is_none() && !m.is_deleted())
                .count();
            Some(ConversationSummary {
                counterpart_id: counterpart.to_string(),
                last_message_id: last.id.clone(),
                preview: preview(last),
                last_sender_id: last.sender_id.clone(),
                last_activity_at: last.created_at,
                unread_count: unread as u32,
                message_count: group.len() as u32,
                last_status: last.status(),
            })
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.last_activity_at
            .cmp(&a.last_activity_at)
            .then(a.counterpart_id.cmp(&b.counterpart_id))
    });
    summaries
}
