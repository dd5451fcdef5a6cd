//! SQL DDL for initializing the catalog.

/// SQLite schema with:
/// - `catalog_databases.name` UNIQUE, compared case-insensitively
/// - `catalog_tables` unique per (database, name), removed with its database
/// - `catalog_columns` ordered by `ordinal`, removed with its table
/// - timestamps stored as RFC3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS catalog_databases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    location TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS catalog_tables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    database_id INTEGER NOT NULL REFERENCES catalog_databases(id) ON DELETE CASCADE,
    name TEXT NOT NULL COLLATE NOCASE,
    location TEXT NOT NULL,
    format TEXT NOT NULL,
    row_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (database_id, name)
);

CREATE TABLE IF NOT EXISTS catalog_columns (
    table_id INTEGER NOT NULL REFERENCES catalog_tables(id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    name TEXT NOT NULL,
    data_type TEXT NOT NULL,
    nullable INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (table_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_catalog_tables_database_id ON catalog_tables(database_id);
"#;
