//! HTTP surface.
//!
//! Every route except `/health`, `/auth/register` and `/auth/login`
//! requires a bearer token, resolved by [`crate::auth::AuthUser`].
//! Handlers are thin: they extract, call the domain function and wrap the
//! result; all rules live in the domain modules.

mod handlers;
pub mod routes;

use std::sync::Arc;

use crate::chatbot::CompletionClient;
use crate::config::AppConfig;
use crate::notifications::Notifier;
use crate::store::Db;

pub use routes::app_router;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<AppConfig>,
    /// Study assistant backend.
    pub completion: Arc<dyn CompletionClient>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(
        db: Db,
        config: AppConfig,
        completion: Arc<dyn CompletionClient>,
        mailer: Arc<dyn crate::mail::Mailer>,
    ) -> Self {
        let notifier = Notifier::new(db.clone(), mailer, config.public_base_url.clone());
        Self {
            db,
            config: Arc::new(config),
            completion,
            notifier,
        }
    }
}
