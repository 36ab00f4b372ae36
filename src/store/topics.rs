use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::Db;
use crate::auth::User;
use crate::error::AppResult;
use crate::topics::{Reply, Topic, TopicStatus, TopicSummary};

const TOPIC_COLUMNS: &str = "t.id, t.module_id, t.author_id, t.title, t.body, t.anonymous, \
     t.status, t.accepted_reply_id, t.created_at, t.updated_at";

/// Reply count and last activity, appended after `TOPIC_COLUMNS`.
const SUMMARY_COLUMNS: &str = "(SELECT COUNT(*) FROM topic_replies r WHERE r.topic_id = t.id), \
     MAX(t.updated_at, COALESCE((SELECT MAX(r.created_at) FROM topic_replies r WHERE r.topic_id = t.id), t.updated_at))";

fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        module_id: row.get(1)?,
        author_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        anonymous: row.get(5)?,
        status: row.get(6)?,
        accepted_reply_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<TopicSummary> {
    Ok(TopicSummary {
        topic: topic_from_row(row)?,
        reply_count: row.get(10)?,
        last_activity_at: row.get(11)?,
    })
}

fn reply_from_row(row: &Row<'_>) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        anonymous: row.get(4)?,
        created_at: row.get(5)?,
        edited_at: row.get(6)?,
    })
}

const REPLY_COLUMNS: &str = "id, topic_id, author_id, body, anonymous, created_at, edited_at";

impl Db {
    pub fn insert_topic(&self, topic: &Topic) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO topics (id, module_id, author_id, title, body, anonymous, status,
                                     accepted_reply_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    topic.id,
                    topic.module_id,
                    topic.author_id,
                    topic.title,
                    topic.body,
                    topic.anonymous,
                    topic.status,
                    topic.accepted_reply_id,
                    topic.created_at,
                    topic.updated_at
                ],
            )
        })?;
        Ok(())
    }

    pub fn find_topic(&self, id: &str) -> AppResult<Option<Topic>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM topics t WHERE t.id = ?1", TOPIC_COLUMNS),
                [id],
                topic_from_row,
            )
            .optional()
        })
    }

    pub fn topic_summary(&self, id: &str) -> AppResult<Option<TopicSummary>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {}, {} FROM topics t WHERE t.id = ?1",
                    TOPIC_COLUMNS, SUMMARY_COLUMNS
                ),
                [id],
                summary_from_row,
            )
            .optional()
        })
    }

    /// Topics of a module, most recently active first.
    pub fn list_topics(&self, module_id: &str, status: Option<TopicStatus>) -> AppResult<Vec<TopicSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, {} AS last_activity FROM topics t
                 WHERE t.module_id = ?1 AND (?2 IS NULL OR t.status = ?2)
                 ORDER BY last_activity DESC, t.rowid DESC",
                TOPIC_COLUMNS, SUMMARY_COLUMNS
            ))?;
            let rows = stmt.query_map(params![module_id, status], summary_from_row)?;
            let topics = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(topics)
        })
    }

    pub fn update_topic(&self, topic: &Topic) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE topics SET title = ?2, body = ?3, updated_at = ?4 WHERE id = ?1",
                params![topic.id, topic.title, topic.body, topic.updated_at],
            )
        })?;
        Ok(())
    }

    pub fn set_accepted_reply(&self, topic_id: &str, reply_id: Option<&str>, status: TopicStatus) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE topics SET accepted_reply_id = ?2, status = ?3 WHERE id = ?1",
                params![topic_id, reply_id, status],
            )
        })?;
        Ok(())
    }

    pub fn delete_topic(&self, id: &str) -> AppResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM topics WHERE id = ?1", [id]))?;
        Ok(())
    }

    // -- replies ------------------------------------------------------------

    pub fn insert_reply(&self, reply: &Reply) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO topic_replies (id, topic_id, author_id, body, anonymous, created_at, edited_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    reply.id,
                    reply.topic_id,
                    reply.author_id,
                    reply.body,
                    reply.anonymous,
                    reply.created_at,
                    reply.edited_at
                ],
            )
        })?;
        Ok(())
    }

    pub fn find_reply(&self, id: &str) -> AppResult<Option<Reply>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM topic_replies WHERE id = ?1", REPLY_COLUMNS),
                [id],
                reply_from_row,
            )
            .optional()
        })
    }

    pub fn list_replies(&self, topic_id: &str) -> AppResult<Vec<Reply>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM topic_replies WHERE topic_id = ?1 ORDER BY created_at, rowid",
                REPLY_COLUMNS
            ))?;
            let rows = stmt.query_map([topic_id], reply_from_row)?;
            let replies = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(replies)
        })
    }

    pub fn update_reply(&self, reply: &Reply) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE topic_replies SET body = ?2, edited_at = ?3 WHERE id = ?1",
                params![reply.id, reply.body, reply.edited_at],
            )
        })?;
        Ok(())
    }

    pub fn delete_reply(&self, id: &str) -> AppResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM topic_replies WHERE id = ?1", [id]))?;
        Ok(())
    }

    // -- subscriptions ------------------------------------------------------

    pub fn subscribe(&self, topic_id: &str, user_id: &str) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO topic_subscriptions (topic_id, user_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![topic_id, user_id, Utc::now()],
            )
        })?;
        Ok(())
    }

    pub fn unsubscribe(&self, topic_id: &str, user_id: &str) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM topic_subscriptions WHERE topic_id = ?1 AND user_id = ?2",
                params![topic_id, user_id],
            )
        })?;
        Ok(())
    }

    pub fn is_subscribed(&self, topic_id: &str, user_id: &str) -> AppResult<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM topic_subscriptions WHERE topic_id = ?1 AND user_id = ?2)",
                params![topic_id, user_id],
                |row| row.get(0),
            )
        })
    }

    pub fn subscribers(&self, topic_id: &str) -> AppResult<Vec<User>> {
        let ids: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM topic_subscriptions WHERE topic_id = ?1 ORDER BY created_at, rowid",
            )?;
            let rows = stmt.query_map([topic_id], |row| row.get(0))?;
            let ids = rows.collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })?;
        let mut users = self.users_by_ids(&ids)?;
        Ok(ids.iter().filter_map(|id| users.remove(id)).collect())
    }

    pub fn subscribed_topics(&self, user_id: &str) -> AppResult<Vec<TopicSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {}, {} AS last_activity FROM topics t
                 JOIN topic_subscriptions s ON s.topic_id = t.id
                 WHERE s.user_id = ?1
                 ORDER BY last_activity DESC, t.rowid DESC",
                TOPIC_COLUMNS, SUMMARY_COLUMNS
            ))?;
            let rows = stmt.query_map([user_id], summary_from_row)?;
            let topics = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(topics)
        })
    }
}
