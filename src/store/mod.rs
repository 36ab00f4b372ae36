//! SQLite persistence.
//!
//! A single connection is shared behind a mutex; every method takes the lock
//! for the duration of one statement or transaction and never across an
//! `.await`. The schema is created idempotently when the database is opened.
//! Queries are grouped per area in the submodules, all as `impl Db` blocks.

mod catalog;
mod chatbot;
mod forum;
mod messages;
mod notifications;
mod schema;
mod topics;
mod tutoring;
mod users;
mod votes;

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, Transaction};

use crate::auth::Role;
use crate::chatbot::ChatRole;
use crate::error::{AppError, AppResult};
use crate::notifications::NotificationKind;
use crate::topics::TopicStatus;
use crate::tutoring::RequestStatus;

pub use votes::VoteTarget;

/// Handle to the database. Cheap to clone.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open (or create) the database at `path`. `:memory:` gives a private
    /// in-memory database.
    pub fn open(path: &str) -> AppResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with the connection locked.
    pub(crate) fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }

    /// Run `f` inside a transaction, committing on success.
    pub(crate) fn with_tx<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Map a UNIQUE/PRIMARY KEY violation to a conflict, anything else passes.
pub(crate) fn conflict_on_duplicate(err: AppError, message: &str) -> AppError {
    match &err {
        AppError::Database(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            AppError::conflict(message)
        }
        _ => err,
    }
}

/// `?, ?, ?` for an `IN (...)` list of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

macro_rules! text_enum_sql {
    ($($ty:ty),* $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    )*};
}

text_enum_sql!(Role, TopicStatus, RequestStatus, ChatRole, NotificationKind);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tutorhub.db");
        let path = path.to_str().unwrap();

        let db = Db::open(path).unwrap();
        crate::testing::seed_user(&db, "ada", Role::Student);
        drop(db);

        // Reopening runs the schema again and keeps the data.
        let db = Db::open(path).unwrap();
        assert_eq!(db.list_tutors(None).unwrap().len(), 0);
        assert!(db.find_credentials("ada@example.edu").unwrap().is_some());
    }

    #[test]
    fn test_enum_round_trip_through_sqlite() {
        let db = Db::open_in_memory().unwrap();
        let status: RequestStatus = db
            .with_conn(|conn| {
                conn.query_row("SELECT ?1", [RequestStatus::Cancelled], |row| row.get(0))
            })
            .unwrap();
        assert_eq!(status, RequestStatus::Cancelled);

        let bad: AppResult<Role> =
            db.with_conn(|conn| conn.query_row("SELECT 'wizard'", [], |row| row.get(0)));
        assert!(bad.is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(1), "?");
    }
}
