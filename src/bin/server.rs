//! TutorHub HTTP server binary.
//!
//! # Environment Variables
//!
//! - `HOST` / `PORT` bind address (default `0.0.0.0:8080`)
//! - `DATABASE_PATH` SQLite file (default `tutorhub.db`, `:memory:` allowed)
//! - `AI_API_KEY` enables the study assistant; without it questions get 503
//! - `EMAIL_API_KEY` enables outbound email; without it emails are logged
//! - `RUST_LOG` tracing filter (default `info,tutorhub=debug`)
//!
//! See [`tutorhub::config`] for the full list.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;
use tutorhub::chatbot::{CompletionClient, HttpCompletionClient, UnconfiguredCompletion};
use tutorhub::mail::{HttpMailer, LogMailer, Mailer};
use tutorhub::{app_router, AppConfig, AppState, Db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tutorhub=debug".into()),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let db = Db::open(&config.database_path)
        .with_context(|| format!("failed to open database at {}", config.database_path))?;

    let completion: Arc<dyn CompletionClient> = match config.chatbot.api_key.clone() {
        Some(key) => {
            tracing::info!(model = %config.chatbot.model, "study assistant enabled");
            Arc::new(
                HttpCompletionClient::new(&config.chatbot, key).context("failed to build completion client")?,
            )
        }
        None => {
            tracing::warn!("AI_API_KEY not set, study assistant disabled");
            Arc::new(UnconfiguredCompletion)
        }
    };
    let mailer: Arc<dyn Mailer> = match config.mail.api_key.clone() {
        Some(key) => Arc::new(HttpMailer::new(&config.mail, key).context("failed to build mail client")?),
        None => {
            tracing::warn!("EMAIL_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let bind_addr = config.bind_addr();
    let app = app_router(AppState::new(db, config, completion, mailer));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("tutorhub server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
