//! # TutorHub
//!
//! Backend for a university peer-tutoring platform. Students ask questions
//! in module boards, talk in a public forum (optionally under a stable
//! codename), message each other and tutors directly, and work through
//! problems with an AI study assistant that can hand a conversation over
//! to a human tutor.
//!
//! The crate is a library plus the `server` binary; everything is reachable
//! over HTTP through [`server::app_router`].

pub mod auth;
pub mod authorship;
pub mod catalog;
pub mod chatbot;
pub mod codename;
pub mod config;
pub mod error;
pub mod forum;
pub mod mail;
pub mod messaging;
pub mod notifications;
pub mod server;
pub mod store;
pub mod topics;
pub mod tutoring;
pub mod validate;
pub mod voting;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use server::{app_router, AppState};
pub use store::Db;

/// Crate version, reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
