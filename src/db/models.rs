use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbDatabase {
    pub id: i64,
    pub name: String,
    pub location: PathBuf,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbTable {
    pub id: i64,
    pub database: String,
    pub name: String,
    pub location: PathBuf,
    pub format: String,
    pub row_count: i64,
    pub updated_at: DateTime<Utc>,
    pub columns: Vec<DbColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DbColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Table registration input; `columns` are stored in order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTable {
    pub database_id: i64,
    pub name: String,
    pub location: PathBuf,
    pub format: String,
    pub row_count: i64,
    pub columns: Vec<DbColumn>,
}
