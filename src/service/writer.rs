//! Managed table writes.
//!
//! Every write lands in a staging directory under `<warehouse>/_temporary`
//! first. Committing moves the staged files to the table location and records
//! the table in the catalog. With gang scheduling enabled a batch of writes is
//! staged concurrently and committed only when every member succeeded.

use crate::db::{DbColumn, NewTable};
use crate::error::WarehouseError;
use crate::service::namespace::remove_dir_if_exists;
use crate::service::session::WarehouseSession;
use crate::types::QualifiedName;
use chrono::Utc;
use datafusion::arrow::array::{Array, UInt64Array};
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::dataframe::{DataFrame, DataFrameWriteOptions};
use datafusion::error::DataFusionError;
use datafusion::parquet::arrow::ArrowWriter;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TABLE_FORMAT: &str = "parquet";
const STAGING_DIR: &str = "_temporary";
const EMPTY_PART: &str = "part-00000.parquet";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveMode {
    /// Replace an existing table.
    Overwrite,
    #[default]
    ErrorIfExists,
    /// Keep an existing table and skip the write.
    Ignore,
}

/// Outcome of one committed table write.
#[derive(Debug, Clone, PartialEq)]
pub struct TableWrite {
    pub name: QualifiedName,
    pub location: PathBuf,
    pub row_count: u64,
    pub columns: Vec<DbColumn>,
}

struct StagedTable {
    target: QualifiedName,
    database_id: i64,
    staging: PathBuf,
    location: PathBuf,
    columns: Vec<DbColumn>,
    row_count: u64,
}

impl WarehouseSession {
    /// Write `frame` as a Parquet table. Returns `None` when `SaveMode::Ignore`
    /// skipped an existing table.
    pub async fn save_as_table(
        &self,
        frame: DataFrame,
        target: &QualifiedName,
        mode: SaveMode,
    ) -> Result<Option<TableWrite>, WarehouseError> {
        let Some(staged) = self.stage_table(frame, target, mode).await? else {
            return Ok(None);
        };
        let mut written = self.commit_staged(vec![staged]).await?;
        Ok(written.pop())
    }

    /// Write a batch of tables, in order unless gang scheduling is on.
    pub async fn save_all(
        &self,
        writes: Vec<(DataFrame, QualifiedName)>,
        mode: SaveMode,
    ) -> Result<Vec<TableWrite>, WarehouseError> {
        if !self.flags().gang_scheduling {
            let mut written = Vec::with_capacity(writes.len());
            for (frame, target) in writes {
                if let Some(w) = self.save_as_table(frame, &target, mode).await? {
                    written.push(w);
                }
            }
            return Ok(written);
        }

        debug!(tables = writes.len(), "staging gang-scheduled writes");
        let results = join_all(
            writes
                .into_iter()
                .map(|(frame, target)| async move { self.stage_table(frame, &target, mode).await }),
        )
        .await;

        let mut staged = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(Some(table)) => staged.push(table),
                Ok(None) => {}
                Err(e) if failure.is_none() => failure = Some(e),
                Err(e) => warn!(error = %e, "additional gang write failure"),
            }
        }
        if let Some(err) = failure {
            self.abort_staged(staged).await;
            return Err(err);
        }
        self.commit_staged(staged).await
    }

    async fn stage_table(
        &self,
        frame: DataFrame,
        target: &QualifiedName,
        mode: SaveMode,
    ) -> Result<Option<StagedTable>, WarehouseError> {
        let db = self
            .catalog()
            .get_database(target.database.as_str())
            .await?
            .ok_or_else(|| WarehouseError::DatabaseNotFound(target.database.to_string()))?;
        let existing = self
            .catalog()
            .get_table(target.database.as_str(), target.table.as_str())
            .await?;

        if existing.is_some() {
            match mode {
                SaveMode::Overwrite => {}
                SaveMode::ErrorIfExists => {
                    return Err(WarehouseError::TableAlreadyExists(target.to_string()));
                }
                SaveMode::Ignore => {
                    debug!(table = %target, "table exists; write ignored");
                    return Ok(None);
                }
            }
        }

        let location = db.location.join(target.table.as_str());
        if existing.is_none() && has_entries(&location).await? {
            if !self.flags().allow_nonempty_location {
                return Err(WarehouseError::LocationNotEmpty {
                    table: target.to_string(),
                    location,
                });
            }
            warn!(
                table = %target,
                location = %location.display(),
                "managed table location is not empty; existing files will be replaced"
            );
        }

        let staging = self.warehouse_dir().join(STAGING_DIR).join(format!(
            "{}.{}-{}",
            target.database,
            target.table,
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        tokio::fs::create_dir_all(&staging).await?;

        let columns: Vec<DbColumn> = frame
            .schema()
            .fields()
            .iter()
            .map(|f| DbColumn {
                name: f.name().clone(),
                data_type: f.data_type().to_string(),
                nullable: f.is_nullable(),
            })
            .collect();

        let row_count = match write_parquet(frame, &staging).await {
            Ok(rows) => rows,
            Err(e) => {
                if let Err(cleanup) = remove_dir_if_exists(&staging).await {
                    warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "failed to remove staging dir"
                    );
                }
                return Err(e);
            }
        };
        debug!(
            table = %target,
            rows = row_count,
            staging = %staging.display(),
            "table staged"
        );

        Ok(Some(StagedTable {
            target: target.clone(),
            database_id: db.id,
            staging,
            location,
            columns,
            row_count,
        }))
    }

    /// Move every staged table into place and register the batch. Existing
    /// locations are parked beside their staging dir until the catalog
    /// transaction succeeds, so a failure anywhere restores the old tables.
    async fn commit_staged(
        &self,
        staged: Vec<StagedTable>,
    ) -> Result<Vec<TableWrite>, WarehouseError> {
        let mut swaps: Vec<Swap> = Vec::with_capacity(staged.len());
        let mut registrations = Vec::with_capacity(staged.len());
        let mut written = Vec::with_capacity(staged.len());

        let mut pending = staged.into_iter();
        while let Some(table) = pending.next() {
            match swap_in(&table).await {
                Ok(swap) => swaps.push(swap),
                Err(e) => {
                    warn!(table = %table.target, error = %e, "commit failed; rolling back batch");
                    self.abort_staged(std::iter::once(table).chain(pending).collect())
                        .await;
                    roll_back(swaps).await;
                    return Err(e);
                }
            }
            registrations.push(NewTable {
                database_id: table.database_id,
                name: table.target.table.to_string(),
                location: table.location.clone(),
                format: TABLE_FORMAT.to_string(),
                row_count: i64::try_from(table.row_count).unwrap_or(i64::MAX),
                columns: table.columns.clone(),
            });
            written.push(TableWrite {
                name: table.target,
                location: table.location,
                row_count: table.row_count,
                columns: table.columns,
            });
        }

        if let Err(e) = self.catalog().upsert_tables(registrations).await {
            warn!(error = %e, "catalog update failed; rolling back batch");
            roll_back(swaps).await;
            return Err(e);
        }
        for swap in swaps {
            if let Some(backup) = swap.backup {
                if let Err(e) = remove_dir_if_exists(&backup).await {
                    warn!(path = %backup.display(), error = %e, "failed to remove replaced table");
                }
            }
        }
        for w in &written {
            info!(table = %w.name, rows = w.row_count, "table populated");
        }
        Ok(written)
    }

    async fn abort_staged(&self, staged: Vec<StagedTable>) {
        for table in staged {
            if let Err(e) = remove_dir_if_exists(&table.staging).await {
                warn!(table = %table.target, error = %e, "failed to discard staged output");
            }
        }
    }
}

/// A table location that now holds staged output, and where its previous
/// contents were parked.
struct Swap {
    location: PathBuf,
    backup: Option<PathBuf>,
}

async fn swap_in(table: &StagedTable) -> Result<Swap, WarehouseError> {
    let backup = if tokio::fs::try_exists(&table.location).await? {
        let mut parked = table.staging.clone().into_os_string();
        parked.push(".previous");
        let parked = PathBuf::from(parked);
        tokio::fs::rename(&table.location, &parked).await?;
        Some(parked)
    } else {
        None
    };

    if let Err(e) = tokio::fs::rename(&table.staging, &table.location).await {
        if let Some(parked) = &backup {
            if let Err(restore) = tokio::fs::rename(parked, &table.location).await {
                warn!(
                    path = %table.location.display(),
                    error = %restore,
                    "failed to restore replaced table"
                );
            }
        }
        return Err(e.into());
    }
    Ok(Swap {
        location: table.location.clone(),
        backup,
    })
}

/// Undo committed swaps, newest first.
async fn roll_back(swaps: Vec<Swap>) {
    for swap in swaps.into_iter().rev() {
        if let Err(e) = remove_dir_if_exists(&swap.location).await {
            warn!(path = %swap.location.display(), error = %e, "failed to remove new table files");
            continue;
        }
        if let Some(backup) = swap.backup {
            if let Err(e) = tokio::fs::rename(&backup, &swap.location).await {
                warn!(
                    path = %swap.location.display(),
                    error = %e,
                    "failed to restore replaced table"
                );
            }
        }
    }
}

async fn has_entries(dir: &Path) -> Result<bool, WarehouseError> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn write_parquet(frame: DataFrame, dir: &Path) -> Result<u64, WarehouseError> {
    let schema = Arc::clone(frame.schema().inner());
    let path = format!("{}/", dir.display());
    let batches = frame
        .write_parquet(&path, DataFrameWriteOptions::new(), None)
        .await?;
    let rows = rows_written(&batches);
    if rows == 0 && !has_entries(dir).await? {
        write_empty_part(dir, schema)?;
    }
    Ok(rows)
}

/// The engine emits no file for an empty frame; a footer-only part keeps the
/// column layout readable.
fn write_empty_part(dir: &Path, schema: SchemaRef) -> Result<(), WarehouseError> {
    let file = std::fs::File::create(dir.join(EMPTY_PART))?;
    let writer = ArrowWriter::try_new(file, schema, None).map_err(DataFusionError::from)?;
    writer.close().map_err(DataFusionError::from)?;
    Ok(())
}

/// Sum of the `count` column the engine reports after a write.
fn rows_written(batches: &[RecordBatch]) -> u64 {
    batches
        .iter()
        .filter_map(|b| b.column_by_name("count"))
        .filter_map(|c| c.as_any().downcast_ref::<UInt64Array>())
        .flat_map(|counts| counts.iter().flatten())
        .sum()
}
