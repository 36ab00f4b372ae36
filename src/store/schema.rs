//! Table definitions. Timestamps are stored as text, enums as lowercase text.

pub(super) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    display_name  TEXT NOT NULL,
    role          TEXT NOT NULL,
    bio           TEXT NOT NULL DEFAULT '',
    salt          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS modules (
    id          TEXT PRIMARY KEY,
    code        TEXT NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tutor_modules (
    tutor_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    module_id TEXT NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    PRIMARY KEY (tutor_id, module_id)
);

CREATE TABLE IF NOT EXISTS topics (
    id                TEXT PRIMARY KEY,
    module_id         TEXT NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    author_id         TEXT NOT NULL,
    title             TEXT NOT NULL,
    body              TEXT NOT NULL,
    anonymous         INTEGER NOT NULL DEFAULT 0,
    status            TEXT NOT NULL,
    accepted_reply_id TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_topics_module ON topics(module_id);

CREATE TABLE IF NOT EXISTS topic_replies (
    id         TEXT PRIMARY KEY,
    topic_id   TEXT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    author_id  TEXT NOT NULL,
    body       TEXT NOT NULL,
    anonymous  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    edited_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_replies_topic ON topic_replies(topic_id);

CREATE TABLE IF NOT EXISTS reply_votes (
    target_id TEXT NOT NULL REFERENCES topic_replies(id) ON DELETE CASCADE,
    user_id   TEXT NOT NULL,
    value     INTEGER NOT NULL CHECK (value IN (-1, 1)),
    PRIMARY KEY (target_id, user_id)
);

CREATE TABLE IF NOT EXISTS topic_subscriptions (
    topic_id   TEXT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (topic_id, user_id)
);

CREATE TABLE IF NOT EXISTS forum_posts (
    id         TEXT PRIMARY KEY,
    author_id  TEXT NOT NULL,
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    anonymous  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    edited_at  TEXT
);

CREATE TABLE IF NOT EXISTS forum_comments (
    id         TEXT PRIMARY KEY,
    post_id    TEXT NOT NULL REFERENCES forum_posts(id) ON DELETE CASCADE,
    author_id  TEXT NOT NULL,
    body       TEXT NOT NULL,
    anonymous  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_post ON forum_comments(post_id);

CREATE TABLE IF NOT EXISTS post_votes (
    target_id TEXT NOT NULL REFERENCES forum_posts(id) ON DELETE CASCADE,
    user_id   TEXT NOT NULL,
    value     INTEGER NOT NULL CHECK (value IN (-1, 1)),
    PRIMARY KEY (target_id, user_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id           TEXT PRIMARY KEY,
    sender_id    TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    body         TEXT NOT NULL,
    reply_to_id  TEXT,
    created_at   TEXT NOT NULL,
    edited_at    TEXT,
    deleted_at   TEXT,
    delivered_at TEXT,
    read_at      TEXT
);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id);
CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient_id);

CREATE TABLE IF NOT EXISTS message_attachments (
    id           TEXT PRIMARY KEY,
    message_id   TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    file_name    TEXT NOT NULL,
    content_type TEXT NOT NULL,
    size_bytes   INTEGER NOT NULL,
    storage_key  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS message_reactions (
    message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    user_id    TEXT NOT NULL,
    emoji      TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (message_id, user_id, emoji)
);

CREATE TABLE IF NOT EXISTS chatbot_conversations (
    id                   TEXT PRIMARY KEY,
    user_id              TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    module_id            TEXT,
    title                TEXT NOT NULL,
    escalated_request_id TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chatbot_messages (
    id              TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES chatbot_conversations(id) ON DELETE CASCADE,
    role            TEXT NOT NULL,
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tutor_requests (
    id              TEXT PRIMARY KEY,
    student_id      TEXT NOT NULL,
    tutor_id        TEXT,
    module_id       TEXT,
    conversation_id TEXT,
    subject         TEXT NOT NULL,
    details         TEXT NOT NULL,
    status          TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    kind       TEXT NOT NULL,
    message    TEXT NOT NULL,
    link       TEXT,
    read_at    TEXT,
    created_at TEXT NOT NULL
);
";
