use crate::db::models::{DbColumn, DbDatabase, DbTable, NewTable};
use crate::db::schema::SQLITE_INIT;
use crate::error::WarehouseError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

/// Open the catalog at `url` (e.g. `sqlite:/var/lib/warehouse/metastore.db`),
/// creating the file when missing.
pub async fn connect(url: &str) -> Result<SqlitePool, WarehouseError> {
    connect_with(SqliteConnectOptions::from_str(url)?).await
}

/// Open the catalog stored in the file at `path`.
pub async fn connect_file(path: &Path) -> Result<SqlitePool, WarehouseError> {
    connect_with(SqliteConnectOptions::new().filename(path)).await
}

async fn connect_with(options: SqliteConnectOptions) -> Result<SqlitePool, WarehouseError> {
    // One connection keeps `sqlite::memory:` catalogs coherent.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options.create_if_missing(true).foreign_keys(true))
        .await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct CatalogStorage {
    pool: SqlitePool,
}

impl CatalogStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), WarehouseError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Register a database. Returns the row id.
    pub async fn insert_database(
        &self,
        name: &str,
        location: &Path,
    ) -> Result<i64, WarehouseError> {
        let created_at = Utc::now().to_rfc3339();
        let res = sqlx::query(
            "INSERT INTO catalog_databases (name, location, created_at) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(location.to_string_lossy().into_owned())
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_database(&self, name: &str) -> Result<Option<DbDatabase>, WarehouseError> {
        let row = sqlx::query(
            "SELECT id, name, location, created_at FROM catalog_databases WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_database).transpose()
    }

    pub async fn list_databases(&self) -> Result<Vec<DbDatabase>, WarehouseError> {
        let rows = sqlx::query(
            "SELECT id, name, location, created_at FROM catalog_databases ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_database).collect()
    }

    /// Remove a database row; its tables and columns go with it.
    pub async fn delete_database(&self, id: i64) -> Result<(), WarehouseError> {
        sqlx::query("DELETE FROM catalog_databases WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Upsert by (database, name), replacing the column list. Returns the row id.
    pub async fn upsert_table(&self, table: NewTable) -> Result<i64, WarehouseError> {
        let mut ids = self.upsert_tables(vec![table]).await?;
        ids.pop()
            .ok_or_else(|| WarehouseError::DatabaseError(sqlx::Error::RowNotFound))
    }

    /// Batch upsert using a single transaction. Returns ids in the same order.
    pub async fn upsert_tables(&self, items: Vec<NewTable>) -> Result<Vec<i64>, WarehouseError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(items.len());
        let updated_at = Utc::now().to_rfc3339();

        for table in items.into_iter() {
            sqlx::query(
                r#"
                INSERT INTO catalog_tables (
                    database_id, name, location, format, row_count, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(database_id, name) DO UPDATE SET
                    location=excluded.location,
                    format=excluded.format,
                    row_count=excluded.row_count,
                    updated_at=excluded.updated_at
                "#,
            )
            .bind(table.database_id)
            .bind(&table.name)
            .bind(table.location.to_string_lossy().into_owned())
            .bind(&table.format)
            .bind(table.row_count)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;

            let rec: (i64,) =
                sqlx::query_as("SELECT id FROM catalog_tables WHERE database_id = ? AND name = ?")
                    .bind(table.database_id)
                    .bind(&table.name)
                    .fetch_one(&mut *tx)
                    .await?;

            sqlx::query("DELETE FROM catalog_columns WHERE table_id = ?")
                .bind(rec.0)
                .execute(&mut *tx)
                .await?;
            for (ordinal, column) in table.columns.iter().enumerate() {
                sqlx::query(
                    r#"INSERT INTO catalog_columns (table_id, ordinal, name, data_type, nullable)
                       VALUES (?, ?, ?, ?, ?)"#,
                )
                .bind(rec.0)
                .bind(ordinal as i64)
                .bind(&column.name)
                .bind(&column.data_type)
                .bind(if column.nullable { 1 } else { 0 })
                .execute(&mut *tx)
                .await?;
            }
            ids.push(rec.0);
        }

        tx.commit().await?;
        Ok(ids)
    }

    pub async fn get_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Option<DbTable>, WarehouseError> {
        let row = sqlx::query(
            r#"SELECT t.id, d.name AS database_name, t.name, t.location, t.format,
               t.row_count, t.updated_at
               FROM catalog_tables t JOIN catalog_databases d ON d.id = t.database_id
               WHERE d.name = ? AND t.name = ?"#,
        )
        .bind(database)
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.row_to_table(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_tables(&self, database_id: i64) -> Result<Vec<DbTable>, WarehouseError> {
        let rows = sqlx::query(
            r#"SELECT t.id, d.name AS database_name, t.name, t.location, t.format,
               t.row_count, t.updated_at
               FROM catalog_tables t JOIN catalog_databases d ON d.id = t.database_id
               WHERE t.database_id = ? ORDER BY t.name"#,
        )
        .bind(database_id)
        .fetch_all(&self.pool)
        .await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(self.row_to_table(row).await?);
        }
        Ok(tables)
    }

    async fn columns(&self, table_id: i64) -> Result<Vec<DbColumn>, WarehouseError> {
        let rows = sqlx::query(
            "SELECT name, data_type, nullable FROM catalog_columns \
             WHERE table_id = ? ORDER BY ordinal",
        )
        .bind(table_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<DbColumn, WarehouseError> {
                let nullable: i64 = row.try_get("nullable")?;
                Ok(DbColumn {
                    name: row.try_get("name")?,
                    data_type: row.try_get("data_type")?,
                    nullable: nullable != 0,
                })
            })
            .collect()
    }

    fn row_to_database(row: SqliteRow) -> Result<DbDatabase, WarehouseError> {
        let id: i64 = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let location: String = row.try_get("location")?;
        let created_at: String = row.try_get("created_at")?;
        Ok(DbDatabase {
            id,
            name,
            location: PathBuf::from(location),
            created_at: parse_timestamp(&created_at)?,
        })
    }

    async fn row_to_table(&self, row: SqliteRow) -> Result<DbTable, WarehouseError> {
        let id: i64 = row.try_get("id")?;
        let database: String = row.try_get("database_name")?;
        let name: String = row.try_get("name")?;
        let location: String = row.try_get("location")?;
        let format: String = row.try_get("format")?;
        let row_count: i64 = row.try_get("row_count")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(DbTable {
            id,
            database,
            name,
            location: PathBuf::from(location),
            format,
            row_count,
            updated_at: parse_timestamp(&updated_at)?,
            columns: self.columns(id).await?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, WarehouseError> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);
    Ok(ts)
}
