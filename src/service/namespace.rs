use crate::db::{DbDatabase, DbTable};
use crate::error::WarehouseError;
use crate::service::session::WarehouseSession;
use crate::types::{DatabaseName, QualifiedName};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropOptions {
    /// Succeed quietly when the database is absent.
    pub if_exists: bool,
    /// Drop contained tables too; otherwise a non-empty database is an error.
    pub cascade: bool,
}

impl DropOptions {
    pub const IF_EXISTS_CASCADE: DropOptions = DropOptions {
        if_exists: true,
        cascade: true,
    };
}

impl WarehouseSession {
    /// Returns whether a database was actually dropped.
    pub async fn drop_database(
        &self,
        name: &DatabaseName,
        options: DropOptions,
    ) -> Result<bool, WarehouseError> {
        let Some(db) = self.catalog().get_database(name.as_str()).await? else {
            if options.if_exists {
                debug!(database = %name, "database absent; nothing to drop");
                return Ok(false);
            }
            return Err(WarehouseError::DatabaseNotFound(name.to_string()));
        };

        let tables = self.catalog().list_tables(db.id).await?;
        if !tables.is_empty() && !options.cascade {
            return Err(WarehouseError::DatabaseNotEmpty(name.to_string()));
        }
        for table in &tables {
            remove_dir_if_exists(&table.location).await?;
        }
        remove_dir_if_exists(&db.location).await?;
        self.catalog().delete_database(db.id).await?;

        info!(database = %name, tables = tables.len(), "database dropped");
        Ok(true)
    }

    pub async fn create_database(&self, name: &DatabaseName) -> Result<(), WarehouseError> {
        if self.catalog().get_database(name.as_str()).await?.is_some() {
            return Err(WarehouseError::DatabaseAlreadyExists(name.to_string()));
        }
        let location = self.database_location(name);
        tokio::fs::create_dir_all(&location).await?;
        self.catalog()
            .insert_database(name.as_str(), &location)
            .await?;
        info!(database = %name, location = %location.display(), "database created");
        Ok(())
    }

    pub async fn database_exists(&self, name: &DatabaseName) -> Result<bool, WarehouseError> {
        Ok(self.catalog().get_database(name.as_str()).await?.is_some())
    }

    pub async fn list_databases(&self) -> Result<Vec<DbDatabase>, WarehouseError> {
        self.catalog().list_databases().await
    }

    pub async fn list_tables(&self, name: &DatabaseName) -> Result<Vec<DbTable>, WarehouseError> {
        let db = self
            .catalog()
            .get_database(name.as_str())
            .await?
            .ok_or_else(|| WarehouseError::DatabaseNotFound(name.to_string()))?;
        self.catalog().list_tables(db.id).await
    }

    /// Catalog entry with its columns.
    pub async fn describe_table(&self, name: &QualifiedName) -> Result<DbTable, WarehouseError> {
        self.catalog()
            .get_table(name.database.as_str(), name.table.as_str())
            .await?
            .ok_or_else(|| WarehouseError::TableNotFound(name.to_string()))
    }

    /// `<warehouse>/<NAME>.db`
    pub fn database_location(&self, name: &DatabaseName) -> PathBuf {
        self.warehouse_dir().join(format!("{name}.db"))
    }
}

pub(crate) async fn remove_dir_if_exists(path: &Path) -> Result<(), WarehouseError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
