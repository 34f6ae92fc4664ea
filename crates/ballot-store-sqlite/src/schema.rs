//! SQL schema for the Ballot SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Identity and content. Owned by other systems; mirrored here so the
-- pipeline can resolve ids. Vote tallies are maintained by vote commits.
CREATE TABLE IF NOT EXISTS accounts (
    account_id   INTEGER PRIMARY KEY,
    name         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS communities (
    community_id INTEGER PRIMARY KEY,
    name         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS links (
    link_id      INTEGER PRIMARY KEY,
    author_id    INTEGER NOT NULL,
    community_id INTEGER NOT NULL,
    url          TEXT,             -- NULL for text posts
    created_at   TEXT NOT NULL,    -- RFC 3339 UTC
    ups          INTEGER NOT NULL DEFAULT 0,
    downs        INTEGER NOT NULL DEFAULT 0,
    spam         INTEGER NOT NULL DEFAULT 0,
    deleted      INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id   INTEGER PRIMARY KEY,
    link_id      INTEGER NOT NULL,
    author_id    INTEGER NOT NULL,
    community_id INTEGER NOT NULL,
    created_at   TEXT NOT NULL,
    ups          INTEGER NOT NULL DEFAULT 0,
    downs        INTEGER NOT NULL DEFAULT 0,
    spam         INTEGER NOT NULL DEFAULT 0,
    deleted      INTEGER NOT NULL DEFAULT 0
);

-- One row per (actor, target). Upserted by vote commits only.
CREATE TABLE IF NOT EXISTS votes (
    actor_id           INTEGER NOT NULL,
    target             TEXT NOT NULL,   -- fullname, e.g. 'link:42'
    direction          TEXT NOT NULL,   -- 'up' | 'down' | 'none'
    previous_direction TEXT,            -- NULL for an actor's first vote
    date               TEXT NOT NULL,
    data_json          TEXT NOT NULL DEFAULT '{}',
    event_data_json    TEXT,
    -- Set when a commit makes the vote eligible for fan-out; cleared once
    -- fan-out has run for that commit.
    fanout_pending     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (actor_id, target)
);

-- Derived listings. Rebuildable; safe to truncate.
CREATE TABLE IF NOT EXISTS listings (
    listing_key  TEXT PRIMARY KEY,
    entries_json TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cache (
    key          TEXT PRIMARY KEY,
    value        TEXT NOT NULL,
    expires_at   INTEGER            -- epoch millis; NULL never expires
);

-- Cross-process locks. A row is a held lock; rows past expires_at belong
-- to holders that never released them and may be taken over.
CREATE TABLE IF NOT EXISTS locks (
    namespace    TEXT NOT NULL,
    key          TEXT NOT NULL,
    holder       TEXT NOT NULL,
    expires_at   INTEGER NOT NULL,  -- epoch millis
    PRIMARY KEY (namespace, key)
);

-- Durable at-least-once queue. A leased message is invisible until
-- visible_at; acking deletes it, nacking makes it visible again.
CREATE TABLE IF NOT EXISTS queue_messages (
    message_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    queue        TEXT NOT NULL,
    body         TEXT NOT NULL,
    enqueued_at  TEXT NOT NULL,
    visible_at   INTEGER NOT NULL,  -- epoch millis
    lease        TEXT,
    attempts     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS queue_visible_idx
    ON queue_messages(queue, visible_at, message_id);
CREATE INDEX IF NOT EXISTS votes_target_idx ON votes(target);
CREATE INDEX IF NOT EXISTS cache_expiry_idx
    ON cache(expires_at) WHERE expires_at IS NOT NULL;

PRAGMA user_version = 1;
";
