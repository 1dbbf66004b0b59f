//! SQL schema for the lobby SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per document. `seq` is the insertion order and breaks sort ties.
CREATE TABLE IF NOT EXISTS documents (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    collection  TEXT NOT NULL,
    doc_id      TEXT NOT NULL,   -- copy of body._id
    body        TEXT NOT NULL,   -- JSON object
    UNIQUE (collection, doc_id)
);

CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents(collection, seq);

-- Time-to-live rules, one per collection.
CREATE TABLE IF NOT EXISTS ttl_rules (
    collection  TEXT PRIMARY KEY,
    field       TEXT NOT NULL,
    ttl_secs    INTEGER NOT NULL
);

PRAGMA user_version = 1;
";
