//! Vote rows for forum posts and topic replies. Both tables share a shape.

use rusqlite::{params, params_from_iter, OptionalExtension};

use super::{placeholders, Db};
use crate::error::AppResult;
use crate::voting::{Vote, VoteChange, VoteValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Post,
    Reply,
}

impl VoteTarget {
    fn table(self) -> &'static str {
        match self {
            VoteTarget::Post => "post_votes",
            VoteTarget::Reply => "reply_votes",
        }
    }
}

fn vote_value(raw: i64) -> rusqlite::Result<VoteValue> {
    VoteValue::from_i64(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Integer,
            format!("invalid vote value {}", raw).into(),
        )
    })
}

impl Db {
    pub fn current_vote(&self, target: VoteTarget, target_id: &str, user_id: &str) -> AppResult<Option<VoteValue>> {
        let raw: Option<i64> = self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT value FROM {} WHERE target_id = ?1 AND user_id = ?2",
                    target.table()
                ),
                params![target_id, user_id],
                |row| row.get(0),
            )
            .optional()
        })?;
        Ok(raw.and_then(VoteValue::from_i64))
    }

    pub fn apply_vote(&self, target: VoteTarget, target_id: &str, user_id: &str, change: VoteChange) -> AppResult<()> {
        let table = target.table();
        self.with_conn(|conn| match change {
            VoteChange::Insert(value) | VoteChange::Switch(value) => conn.execute(
                &format!(
                    "INSERT INTO {} (target_id, user_id, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT (target_id, user_id) DO UPDATE SET value = excluded.value",
                    table
                ),
                params![target_id, user_id, value.as_i64()],
            ),
            VoteChange::Remove => conn.execute(
                &format!("DELETE FROM {} WHERE target_id = ?1 AND user_id = ?2", table),
                params![target_id, user_id],
            ),
        })?;
        Ok(())
    }

    /// Every vote on any of `target_ids`.
    pub fn votes_for(&self, target: VoteTarget, target_ids: &[String]) -> AppResult<Vec<Vote>> {
        if target_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT target_id, user_id, value FROM {} WHERE target_id IN ({})",
                target.table(),
                placeholders(target_ids.len())
            ))?;
            let rows = stmt.query_map(params_from_iter(target_ids.iter()), |row| {
                Ok(Vote {
                    target_id: row.get(0)?,
                    user_id: row.get(1)?,
                    value: vote_value(row.get(2)?)?,
                })
            })?;
            let votes = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(votes)
        })
    }
}
