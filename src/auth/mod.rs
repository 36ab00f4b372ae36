//! Accounts, credentials and login sessions.
//!
//! Users register as students or tutors (admins are provisioned directly in
//! the database), log in with email and password, and receive an opaque
//! bearer token. Every authenticated route resolves that token through the
//! [`AuthUser`] extractor.

pub mod password;
pub mod session;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::Db;

pub use session::AuthUser;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

const MIN_PASSWORD_LEN: usize = 8;
const MAX_DISPLAY_NAME_LEN: usize = 80;
const MAX_BIO_LEN: usize = 1000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Tutor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Tutor => "tutor",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "tutor" => Ok(Role::Tutor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_tutor(&self) -> bool {
        self.role == Role::Tutor
    }

    pub fn profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            bio: self.bio.clone(),
        }
    }
}

/// What other users may see of an account.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    pub bio: String,
}

/// Stored password material for a user.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub salt: String,
    pub password_hash: String,
}

/// `POST /auth/register` body.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub display_name: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Student
}

/// `PATCH /me` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

/// An issued login session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_display_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(AppError::validation(format!(
            "display name must be 1 to {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Create an account after validating the registration.
pub fn register(db: &Db, registration: Registration) -> AppResult<User> {
    let email = normalize_email(&registration.email);
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(AppError::validation("invalid email address"));
    }
    let display_name = validate_display_name(&registration.display_name)?;
    if registration.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if registration.role == Role::Admin {
        return Err(AppError::forbidden("admin accounts cannot self-register"));
    }

    let salt = password::generate_salt();
    let hash = password::hash_password(&salt, &registration.password);
    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        display_name,
        role: registration.role,
        bio: String::new(),
        created_at: Utc::now(),
    };
    db.insert_user(&user, &salt, &hash)?;
    tracing::info!(user_id = %user.id, role = %user.role, "user registered");
    Ok(user)
}

/// Check credentials and open a session.
pub fn login(db: &Db, email: &str, password: &str, ttl_hours: i64) -> AppResult<Session> {
    let credentials = db
        .find_credentials(&normalize_email(email))?
        .ok_or(AppError::Unauthorized)?;
    if !password::verify_password(&credentials.salt, password, &credentials.password_hash) {
        tracing::debug!(user_id = %credentials.user.id, "rejected login");
        return Err(AppError::Unauthorized);
    }

    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::Internal(format!("session lifetime of {} hours is out of range", ttl_hours)))?;
    let session = Session {
        token: Uuid::new_v4().to_string(),
        user_id: credentials.user.id,
        expires_at,
    };
    db.insert_session(&session)?;
    Ok(session)
}

/// Resolve a bearer token to its user. Expired sessions are removed.
pub fn authenticate(db: &Db, token: &str) -> AppResult<User> {
    let session = db.find_session(token)?.ok_or(AppError::Unauthorized)?;
    if session.expires_at <= Utc::now() {
        db.delete_session(token)?;
        return Err(AppError::Unauthorized);
    }
    db.find_user(&session.user_id)?.ok_or(AppError::Unauthorized)
}

pub fn logout(db: &Db, token: &str) -> AppResult<()> {
    db.delete_session(token)
}

/// Apply a profile update to `user` and persist it.
pub fn update_profile(db: &Db, user: &User, update: ProfileUpdate) -> AppResult<User> {
    let mut updated = user.clone();
    if let Some(name) = update.display_name {
        updated.display_name = validate_display_name(&name)?;
    }
    if let Some(bio) = update.bio {
        let bio = bio.trim().to_string();
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(AppError::validation(format!(
                "bio must be at most {} characters",
                MAX_BIO_LEN
            )));
        }
        updated.bio = bio;
    }
    db.update_profile(&updated.id, &updated.display_name, &updated.bio)?;
    Ok(updated)
}
