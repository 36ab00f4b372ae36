use std::collections::HashMap;

use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{placeholders, Db};
use crate::error::AppResult;
use crate::forum::{Comment, ForumPost};

const POST_COLUMNS: &str = "id, author_id, title, body, anonymous, created_at, edited_at";
const COMMENT_COLUMNS: &str = "id, post_id, author_id, body, anonymous, created_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<ForumPost> {
    Ok(ForumPost {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        anonymous: row.get(4)?,
        created_at: row.get(5)?,
        edited_at: row.get(6)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        anonymous: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Db {
    pub fn insert_post(&self, post: &ForumPost) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO forum_posts (id, author_id, title, body, anonymous, created_at, edited_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    post.id,
                    post.author_id,
                    post.title,
                    post.body,
                    post.anonymous,
                    post.created_at,
                    post.edited_at
                ],
            )
        })?;
        Ok(())
    }

    pub fn find_post(&self, id: &str) -> AppResult<Option<ForumPost>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM forum_posts WHERE id = ?1", POST_COLUMNS),
                [id],
                post_from_row,
            )
            .optional()
        })
    }

    /// All posts, newest first. Callers re-sort when they need score order.
    pub fn list_posts(&self) -> AppResult<Vec<ForumPost>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM forum_posts ORDER BY created_at DESC, rowid DESC",
                POST_COLUMNS
            ))?;
            let rows = stmt.query_map([], post_from_row)?;
            let posts = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(posts)
        })
    }

    pub fn update_post(&self, post: &ForumPost) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE forum_posts SET title = ?2, body = ?3, edited_at = ?4 WHERE id = ?1",
                params![post.id, post.title, post.body, post.edited_at],
            )
        })?;
        Ok(())
    }

    pub fn delete_post(&self, id: &str) -> AppResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM forum_posts WHERE id = ?1", [id]))?;
        Ok(())
    }

    pub fn comment_counts(&self, post_ids: &[String]) -> AppResult<HashMap<String, u32>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT post_id, COUNT(*) FROM forum_comments WHERE post_id IN ({}) GROUP BY post_id",
                placeholders(post_ids.len())
            ))?;
            let rows = stmt.query_map(params_from_iter(post_ids.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?;
            let counts = rows.collect::<rusqlite::Result<HashMap<_, _>>>()?;
            Ok(counts)
        })
    }

    // -- comments -----------------------------------------------------------

    pub fn insert_comment(&self, comment: &Comment) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO forum_comments (id, post_id, author_id, body, anonymous, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    comment.id,
                    comment.post_id,
                    comment.author_id,
                    comment.body,
                    comment.anonymous,
                    comment.created_at
                ],
            )
        })?;
        Ok(())
    }

    pub fn find_comment(&self, id: &str) -> AppResult<Option<Comment>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM forum_comments WHERE id = ?1", COMMENT_COLUMNS),
                [id],
                comment_from_row,
            )
            .optional()
        })
    }

    /// Comments on a post, oldest first.
    pub fn list_comments(&self, post_id: &str) -> AppResult<Vec<Comment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM forum_comments WHERE post_id = ?1 ORDER BY created_at, rowid",
                COMMENT_COLUMNS
            ))?;
            let rows = stmt.query_map([post_id], comment_from_row)?;
            let comments = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }

    pub fn delete_comment(&self, id: &str) -> AppResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM forum_comments WHERE id = ?1", [id]))?;
        Ok(())
    }
}
