//! `SQLite` schema for the journal store.
//!
//! Every collection shares one `documents` table. The owner reference and
//! creation timestamp live in their own columns so listing never has to parse
//! the JSON body.

/// SQL statement to create the documents table.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    body TEXT NOT NULL
)
";

/// Owner-filtered listing, newest first.
pub const CREATE_OWNER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_owner
    ON documents(collection, owner_id, created_at DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_DOCUMENTS_TABLE,
    CREATE_OWNER_INDEX,
    CREATE_METADATA_TABLE,
];
