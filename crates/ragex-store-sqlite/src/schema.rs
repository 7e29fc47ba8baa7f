//! SQL schema for the SQLite experiment store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS datasets (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_name  TEXT NOT NULL UNIQUE,
    data_creation TEXT NOT NULL,       -- YYYY-MM-DD
    data_update   TEXT                 -- YYYY-MM-DD or NULL
);

-- One row per query version. Only `obsolete` is ever updated.
CREATE TABLE IF NOT EXISTS queries (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_id  INTEGER NOT NULL REFERENCES datasets(id) ON DELETE RESTRICT,
    position_id INTEGER NOT NULL CHECK (position_id >= 1),
    version     INTEGER NOT NULL CHECK (version >= 1),
    prompt      TEXT NOT NULL,
    device      TEXT,
    customer    TEXT,
    complexity  TEXT NOT NULL CHECK (complexity IN (
                  'Textual_Description', 'Image_Analysis',
                  'Table_Analysis', 'Reasoning')),
    obsolete    INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,         -- RFC 3339 UTC
    UNIQUE (dataset_id, position_id, version)
);

-- At most one current version per position.
CREATE UNIQUE INDEX IF NOT EXISTS queries_current_idx
    ON queries(dataset_id, position_id) WHERE obsolete = 0;

-- Content-addressed; never updated.
CREATE TABLE IF NOT EXISTS hierarchical_metadata (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    id_section    TEXT,
    section_title TEXT,
    depth         INTEGER,
    signature     TEXT NOT NULL UNIQUE
);

-- Content-addressed; never updated.
CREATE TABLE IF NOT EXISTS ground_truths (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    filename                 TEXT NOT NULL,
    confidence               TEXT NOT NULL CHECK (confidence IN ('Low', 'Medium', 'High')),
    hierarchical_metadata_id INTEGER REFERENCES hierarchical_metadata(id),
    signature                TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS query_ground_truths (
    query_id        INTEGER NOT NULL REFERENCES queries(id) ON DELETE CASCADE,
    ground_truth_id INTEGER NOT NULL REFERENCES ground_truths(id),
    PRIMARY KEY (query_id, ground_truth_id)
);

CREATE TABLE IF NOT EXISTS knowledge_bases (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,          -- RFC 3339 UTC
    updated_at TEXT
);

-- One row per document version. Only `obsolete` and `deleted` are ever updated.
CREATE TABLE IF NOT EXISTS documents (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    knowledge_base_id INTEGER NOT NULL REFERENCES knowledge_bases(id),
    filename          TEXT NOT NULL,
    version           REAL NOT NULL CHECK (version >= 1.0),
    type              TEXT NOT NULL,
    hash              TEXT NOT NULL,
    obsolete          INTEGER NOT NULL DEFAULT 0,
    deleted           INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    UNIQUE (knowledge_base_id, filename, version)
);

-- At most one active version per filename.
CREATE UNIQUE INDEX IF NOT EXISTS documents_active_idx
    ON documents(knowledge_base_id, filename) WHERE obsolete = 0 AND deleted = 0;

CREATE INDEX IF NOT EXISTS queries_dataset_idx    ON queries(dataset_id);
CREATE INDEX IF NOT EXISTS query_gt_gt_idx        ON query_ground_truths(ground_truth_id);
CREATE INDEX IF NOT EXISTS documents_kb_file_idx  ON documents(knowledge_base_id, filename);
CREATE INDEX IF NOT EXISTS documents_hash_idx     ON documents(hash);

PRAGMA user_version = 1;
";
