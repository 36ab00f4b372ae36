use chrono::Utc;
use rusqlite::params;

use super::Db;
use crate::error::AppResult;
use crate::notifications::Notification;

impl Db {
    pub fn insert_notification(&self, notification: &Notification) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, message, link, read_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    notification.id,
                    notification.user_id,
                    notification.kind,
                    notification.message,
                    notification.link,
                    notification.read_at,
                    notification.created_at
                ],
            )
        })?;
        Ok(())
    }

    /// Unread first, newest first within each group.
    pub fn list_notifications(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, message, link, read_at, created_at FROM notifications
                 WHERE user_id = ?1
                 ORDER BY read_at IS NOT NULL, created_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map([user_id], |row| {
                Ok(Notification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    kind: row.get(2)?,
                    message: row.get(3)?,
                    link: row.get(4)?,
                    read_at: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?;
            let notifications = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(notifications)
        })
    }

    /// Returns `false` when the notification is missing, already read, or
    /// belongs to someone else.
    pub fn mark_notification_read(&self, id: &str, user_id: &str) -> AppResult<bool> {
        let changed = self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET read_at = ?3
                 WHERE id = ?1 AND user_id = ?2 AND read_at IS NULL",
                params![id, user_id, Utc::now()],
            )
        })?;
        Ok(changed > 0)
    }

    pub fn notification_exists(&self, id: &str, user_id: &str) -> AppResult<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM notifications WHERE id = ?1 AND user_id = ?2)",
                params![id, user_id],
                |row| row.get(0),
            )
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> AppResult<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET read_at = ?2 WHERE user_id = ?1 AND read_at IS NULL",
                params![user_id, Utc::now()],
            )
        })
    }
}
