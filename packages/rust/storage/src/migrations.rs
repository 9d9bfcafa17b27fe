//! SQL migration definitions for the destination repository database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: items, element_texts, item_tags, files",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Imported items
CREATE TABLE IF NOT EXISTS items (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL,
    public        INTEGER NOT NULL,
    source_key    TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection_id);
CREATE INDEX IF NOT EXISTS idx_items_source_key ON items(source_key);

-- Element texts, ordered per (item, set, element)
CREATE TABLE IF NOT EXISTS element_texts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id     INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    element_set TEXT NOT NULL,
    element     TEXT NOT NULL,
    position    INTEGER NOT NULL,
    text        TEXT NOT NULL,
    html        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_element_texts_item ON element_texts(item_id);

-- Tags
CREATE TABLE IF NOT EXISTS item_tags (
    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    tag     TEXT NOT NULL,
    UNIQUE(item_id, tag)
);

-- Files queued for ingestion
CREATE TABLE IF NOT EXISTS files (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id        INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    position       INTEGER NOT NULL,
    source         TEXT NOT NULL,
    name           TEXT NOT NULL,
    transfer_type  TEXT NOT NULL,
    ignore_invalid INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_item ON files(item_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Import run tracking for resumable imports",
            sql: r#"
CREATE TABLE IF NOT EXISTS import_runs (
    id             TEXT PRIMARY KEY,
    library_type   TEXT NOT NULL,
    library_id     TEXT NOT NULL,
    collection_id  INTEGER NOT NULL,
    next_start     INTEGER NOT NULL DEFAULT 0,
    items_imported INTEGER NOT NULL DEFAULT 0,
    started_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    finished_at    TEXT
);

CREATE INDEX IF NOT EXISTS idx_import_runs_library
    ON import_runs(library_type, library_id, collection_id);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
