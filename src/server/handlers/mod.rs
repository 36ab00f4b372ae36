//! Route handlers, one submodule per area.

pub(super) mod auth;
pub(super) mod catalog;
pub(super) mod chatbot;
pub(super) mod forum;
pub(super) mod messages;
pub(super) mod notifications;
pub(super) mod topics;
pub(super) mod tutoring;
