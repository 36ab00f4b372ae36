//! In-app notifications with an email copy.
//!
//! Rows are written first; the email is best effort and a delivery failure
//! is only logged.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::User;
use crate::error::{AppError, AppResult};
use crate::mail::{templates, Email, Mailer};
use crate::store::Db;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TopicReply,
    ReplyAccepted,
    TutorRequest,
    RequestUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TopicReply => "topic_reply",
            NotificationKind::ReplyAccepted => "reply_accepted",
            NotificationKind::TutorRequest => "tutor_request",
            NotificationKind::RequestUpdate => "request_update",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            NotificationKind::TopicReply => "New reply on a topic you follow",
            NotificationKind::ReplyAccepted => "Your reply was accepted",
            NotificationKind::TutorRequest => "New tutoring request",
            NotificationKind::RequestUpdate => "Your tutoring request was updated",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topic_reply" => Ok(NotificationKind::TopicReply),
            "reply_accepted" => Ok(NotificationKind::ReplyAccepted),
            "tutor_request" => Ok(NotificationKind::TutorRequest),
            "request_update" => Ok(NotificationKind::RequestUpdate),
            other => Err(format!("unknown notification kind '{}'", other)),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub message: String,
    /// Site-relative path of the thing the notification is about.
    pub link: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Writes notifications and mails a copy.
#[derive(Clone)]
pub struct Notifier {
    db: Db,
    mailer: Arc<dyn Mailer>,
    site_name: String,
    public_base_url: String,
}

impl Notifier {
    pub fn new(db: Db, mailer: Arc<dyn Mailer>, public_base_url: impl Into<String>) -> Self {
        Self {
            db,
            mailer,
            site_name: "TutorHub".to_string(),
            public_base_url: public_base_url.into(),
        }
    }

    pub async fn notify(
        &self,
        recipient: &User,
        kind: NotificationKind,
        message: &str,
        link: Option<&str>,
    ) -> AppResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: recipient.id.clone(),
            kind,
            message: message.to_string(),
            link: link.map(str::to_string),
            read_at: None,
            created_at: Utc::now(),
        };
        self.db.insert_notification(&notification)?;

        let url = link.map(|path| format!("{}{}", self.public_base_url, path));
        let sent = match templates::render_notification(
            &self.site_name,
            &recipient.display_name,
            message,
            url.as_deref(),
        ) {
            Ok(body) => {
                let email = Email {
                    to: recipient.email.clone(),
                    subject: kind.subject().to_string(),
                    body,
                };
                self.mailer.send(&email).await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = sent {
            tracing::warn!(user_id = %recipient.id, kind = %kind, error = %err, "notification email failed");
        }
        Ok(notification)
    }

    /// Notify every recipient except `skip_user_id`. A recipient whose
    /// notification cannot be stored is logged and skipped. Returns how many
    /// were stored.
    pub async fn notify_all(
        &self,
        recipients: &[User],
        skip_user_id: Option<&str>,
        kind: NotificationKind,
        message: &str,
        link: Option<&str>,
    ) -> usize {
        let mut count = 0;
        for recipient in recipients {
            if Some(recipient.id.as_str()) == skip_user_id {
                continue;
            }
            match self.notify(recipient, kind, message, link).await {
                Ok(_) => count += 1,
                Err(err) => {
                    tracing::warn!(user_id = %recipient.id, kind = %kind, error = %err, "notification not stored");
                }
            }
        }
        count
    }
}

/// Mark one of `user`'s notifications read. Already-read is fine; an id the
/// user does not own is not found.
pub fn mark_read(db: &Db, user: &User, notification_id: &str) -> AppResult<()> {
    if db.mark_notification_read(notification_id, &user.id)? {
        return Ok(());
    }
    if db.notification_exists(notification_id, &user.id)? {
        Ok(())
    } else {
        Err(AppError::not_found("notification"))
    }
}
