//! Database schema and migrations for Dropgate.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.
//! Timestamps are unix seconds.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: System users
    r#"
CREATE TABLE users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password    TEXT NOT NULL,           -- Argon2 hash
    email       TEXT,
    role        TEXT NOT NULL DEFAULT 'user',  -- 'user', 'admin'
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  INTEGER NOT NULL
);
"#,
    // v2: Uploaded files
    r#"
CREATE TABLE files (
    id                   TEXT PRIMARY KEY,     -- opaque link id
    name                 TEXT NOT NULL,
    stored_name          TEXT NOT NULL,
    size                 INTEGER NOT NULL,
    content_type         TEXT,
    owner_id             INTEGER NOT NULL REFERENCES users(id),
    created_at           INTEGER NOT NULL,
    expire_at            INTEGER NOT NULL DEFAULT 0,
    unlimited_time       INTEGER NOT NULL DEFAULT 0,
    downloads_remaining  INTEGER NOT NULL DEFAULT 0 CHECK (downloads_remaining >= 0),
    unlimited_downloads  INTEGER NOT NULL DEFAULT 0,
    download_count       INTEGER NOT NULL DEFAULT 0,
    password             TEXT,                 -- AES-GCM ciphertext, owner-recoverable
    require_auth         INTEGER NOT NULL DEFAULT 0,
    notify_on_download   INTEGER NOT NULL DEFAULT 0,
    deleted_at           INTEGER               -- trash
);

CREATE INDEX idx_files_owner ON files(owner_id);
"#,
    // v3: Teams and file shares
    r#"
CREATE TABLE teams (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_by  INTEGER NOT NULL REFERENCES users(id),
    created_at  INTEGER NOT NULL
);

CREATE TABLE team_members (
    team_id     INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role        TEXT NOT NULL DEFAULT 'member',  -- 'owner', 'admin', 'member'
    added_at    INTEGER NOT NULL,
    PRIMARY KEY (team_id, user_id)
);

CREATE INDEX idx_team_members_user ON team_members(user_id);

CREATE TABLE team_files (
    file_id     TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    team_id     INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    shared_by   INTEGER NOT NULL REFERENCES users(id),
    shared_at   INTEGER NOT NULL,
    PRIMARY KEY (file_id, team_id)
);

CREATE INDEX idx_team_files_team ON team_files(team_id);
"#,
    // v4: Download accounts and the download log
    r#"
CREATE TABLE download_accounts (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name          TEXT NOT NULL,
    password      TEXT NOT NULL,         -- Argon2 hash
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    INTEGER NOT NULL,
    last_used_at  INTEGER
);

-- No cascades: log rows outlive files and anonymized accounts.
CREATE TABLE download_logs (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id        TEXT NOT NULL,
    account_id     INTEGER,
    ip             TEXT NOT NULL,
    user_agent     TEXT NOT NULL,
    downloaded_at  INTEGER NOT NULL,
    authenticated  INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_download_logs_file ON download_logs(file_id);
CREATE INDEX idx_download_logs_account ON download_logs(account_id);
"#,
    // v5: Audit log
    r#"
CREATE TABLE audit_logs (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id       INTEGER,
    actor_email    TEXT,
    action         TEXT NOT NULL,
    entity_type    TEXT NOT NULL,
    entity_id      TEXT,
    details        TEXT,
    ip             TEXT,
    user_agent     TEXT,
    created_at     INTEGER NOT NULL,
    success        INTEGER NOT NULL DEFAULT 1,
    error_message  TEXT
);

CREATE INDEX idx_audit_logs_created ON audit_logs(created_at);
CREATE INDEX idx_audit_logs_action ON audit_logs(action);
CREATE INDEX idx_audit_logs_entity ON audit_logs(entity_type, entity_id);
"#,
];
