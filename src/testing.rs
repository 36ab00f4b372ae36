//! Shared fixtures for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::auth::{password, Role, User};
use crate::catalog::Module;
use crate::chatbot::{ChatTurn, ChatbotError, CompletionClient};
use crate::config::AppConfig;
use crate::mail::MemoryMailer;
use crate::notifications::Notifier;
use crate::server::AppState;
use crate::store::Db;

pub const TEST_PASSWORD: &str = "correct horse battery";

/// Insert a user named `name` with email `{name}@example.edu`.
pub fn seed_user(db: &Db, name: &str, role: Role) -> User {
    let mut chars = name.chars();
    let display_name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: format!("{}@example.edu", name),
        display_name,
        role,
        bio: String::new(),
        created_at: Utc::now(),
    };
    let salt = password::generate_salt();
    db.insert_user(&user, &salt, &password::hash_password(&salt, TEST_PASSWORD))
        .unwrap();
    user
}

pub fn seed_module(db: &Db, code: &str) -> Module {
    let module = Module {
        id: Uuid::new_v4().to_string(),
        code: code.to_string(),
        title: format!("{} module", code),
        description: String::new(),
        created_at: Utc::now(),
    };
    db.insert_module(&module).unwrap();
    module
}

/// An in-memory database with one module and one user per role.
pub struct TestWorld {
    pub db: Db,
    pub module: Module,
    pub student: User,
    pub tutor: User,
    pub admin: User,
    pub notifier: Notifier,
    pub mailer: Arc<MemoryMailer>,
}

impl TestWorld {
    pub fn new() -> Self {
        let db = Db::open_in_memory().unwrap();
        let mailer = Arc::new(MemoryMailer::default());
        let notifier = Notifier::new(db.clone(), mailer.clone(), "http://localhost:3000");
        TestWorld {
            module: seed_module(&db, "COMP2001"),
            student: seed_user(&db, "ada", Role::Student),
            tutor: seed_user(&db, "tom", Role::Tutor),
            admin: seed_user(&db, "root", Role::Admin),
            notifier,
            mailer,
            db,
        }
    }

    /// Application state over this world's database.
    pub fn state(&self, completion: Arc<dyn CompletionClient>) -> AppState {
        AppState {
            db: self.db.clone(),
            config: Arc::new(AppConfig::default()),
            completion,
            notifier: self.notifier.clone(),
        }
    }

    /// Log `user` in and return the bearer token.
    pub fn token_for(&self, user: &User) -> String {
        crate::auth::login(&self.db, &user.email, TEST_PASSWORD, 1)
            .unwrap()
            .token
    }
}

/// Completion client returning a fixed answer and recording what it saw.
pub struct ScriptedCompletion {
    reply: String,
    prompts: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Vec<ChatTurn> {
        self.prompts.lock().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String, ChatbotError> {
        self.prompts.lock().push(turns.to_vec());
        Ok(self.reply.clone())
    }
}
