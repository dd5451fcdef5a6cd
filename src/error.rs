use datafusion::error::DataFusionError;
use sqlx::Error as SqlxError;
use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum WarehouseError {
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("setting `{key}` is empty after removing quotes")]
    EmptySetting { key: &'static str },

    #[error("unknown session setting `{0}`")]
    UnknownSetting(String),

    #[error("invalid value `{value}` for session setting `{key}`")]
    InvalidSetting { key: String, value: String },

    #[error("invalid identifier `{0}`: expected letters, digits and underscores")]
    InvalidIdentifier(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("unsupported storage scheme `{0}`")]
    UnsupportedStorage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("source file `{0}` not found")]
    SourceNotFound(String),

    #[error("Engine error: {0}")]
    Engine(#[from] DataFusionError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("database `{0}` not found")]
    DatabaseNotFound(String),

    #[error("database `{0}` already exists")]
    DatabaseAlreadyExists(String),

    #[error("database `{0}` is not empty; drop it with cascade")]
    DatabaseNotEmpty(String),

    #[error("table `{0}` not found")]
    TableNotFound(String),

    #[error("table `{0}` already exists")]
    TableAlreadyExists(String),

    #[error("cannot create managed table `{table}`: location {} is not empty", location.display())]
    LocationNotEmpty { table: String, location: PathBuf },
}

impl From<figment::Error> for WarehouseError {
    fn from(e: figment::Error) -> Self {
        WarehouseError::Config(Box::new(e))
    }
}
