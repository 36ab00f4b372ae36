//! Users, sessions and tutor/module assignments.

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{conflict_on_duplicate, placeholders, Db};
use crate::auth::{Credentials, Role, Session, User};
use crate::error::AppResult;

const USER_COLUMNS: &str = "u.id, u.email, u.display_name, u.role, u.bio, u.created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        role: row.get(3)?,
        bio: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Db {
    pub fn insert_user(&self, user: &User, salt: &str, password_hash: &str) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, display_name, role, bio, salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id,
                    user.email,
                    user.display_name,
                    user.role,
                    user.bio,
                    salt,
                    password_hash,
                    user.created_at
                ],
            )
        })
        .map_err(|e| conflict_on_duplicate(e, "email already registered"))?;
        Ok(())
    }

    pub fn find_user(&self, id: &str) -> AppResult<Option<User>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS),
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn find_credentials(&self, email: &str) -> AppResult<Option<Credentials>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {}, u.salt, u.password_hash FROM users u WHERE u.email = ?1",
                    USER_COLUMNS
                ),
                [email],
                |row| {
                    Ok(Credentials {
                        user: user_from_row(row)?,
                        salt: row.get(6)?,
                        password_hash: row.get(7)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Users keyed by id. Unknown ids are simply absent.
    pub fn users_by_ids(&self, ids: &[String]) -> AppResult<HashMap<String, User>> {
        let mut unique: Vec<&String> = ids.iter().collect();
        unique.sort();
        unique.dedup();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users u WHERE u.id IN ({})",
                USER_COLUMNS,
                placeholders(unique.len())
            ))?;
            let rows = stmt.query_map(params_from_iter(unique.iter()), user_from_row)?;
            let users = rows
                .map(|r| r.map(|u| (u.id.clone(), u)))
                .collect::<rusqlite::Result<HashMap<_, _>>>()?;
            Ok(users)
        })
    }

    pub fn update_profile(&self, id: &str, display_name: &str, bio: &str) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET display_name = ?2, bio = ?3 WHERE id = ?1",
                params![id, display_name, bio],
            )
        })?;
        Ok(())
    }

    // -- sessions -----------------------------------------------------------

    pub fn insert_session(&self, session: &Session) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![session.token, session.user_id, session.expires_at],
            )
        })?;
        Ok(())
    }

    pub fn find_session(&self, token: &str) -> AppResult<Option<Session>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
                [token],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_session(&self, token: &str) -> AppResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM sessions WHERE token = ?1", [token]))?;
        Ok(())
    }

    // -- tutors -------------------------------------------------------------

    pub fn set_tutor_modules(&self, tutor_id: &str, module_ids: &[String]) -> AppResult<()> {
        self.with_tx(|tx| {
            tx.execute("DELETE FROM tutor_modules WHERE tutor_id = ?1", [tutor_id])?;
            let mut stmt =
                tx.prepare("INSERT INTO tutor_modules (tutor_id, module_id) VALUES (?1, ?2)")?;
            for module_id in module_ids {
                stmt.execute(params![tutor_id, module_id])?;
            }
            Ok(())
        })
    }

    pub fn tutor_module_ids(&self, tutor_id: &str) -> AppResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT module_id FROM tutor_modules WHERE tutor_id = ?1 ORDER BY module_id",
            )?;
            let rows = stmt.query_map([tutor_id], |row| row.get(0))?;
            let ids = rows.collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }

    /// Tutors teaching `module_id`, or every tutor when `None`.
    pub fn list_tutors(&self, module_id: Option<&str>) -> AppResult<Vec<User>> {
        self.with_conn(|conn| {
            let users = match module_id {
                Some(module_id) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM users u
                         JOIN tutor_modules tm ON tm.tutor_id = u.id
                         WHERE u.role = ?1 AND tm.module_id = ?2
                         ORDER BY u.display_name, u.id",
                        USER_COLUMNS
                    ))?;
                    let rows = stmt.query_map(params![Role::Tutor, module_id], user_from_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {} FROM users u WHERE u.role = ?1 ORDER BY u.display_name, u.id",
                        USER_COLUMNS
                    ))?;
                    let rows = stmt.query_map([Role::Tutor], user_from_row)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(users)
        })
    }
}
