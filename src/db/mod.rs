//! Catalog module: persistent record of databases, tables and columns.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring catalog rows
//! - `schema.rs`: SQL DDL for initializing the catalog (SQLite)
//! - `sqlite.rs`: connection setup and catalog queries

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{DbColumn, DbDatabase, DbTable, NewTable};
pub use schema::SQLITE_INIT;
pub use sqlite::{CatalogStorage, SqlitePool, connect, connect_file};
