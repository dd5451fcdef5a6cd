//! The bootstrap job: load the five source datasets, reset the three
//! databases, then materialize every dataset as a Parquet table.

use crate::config::{JobConfig, RuntimeConfig};
use crate::error::WarehouseError;
use crate::service::namespace::DropOptions;
use crate::service::session::{ALLOW_NONEMPTY_LOCATION, GANG_SCHEDULING, WarehouseSession};
use crate::service::storage::StorageRoot;
use crate::service::writer::{SaveMode, TableWrite};
use crate::types::{DatabaseName, Dataset, Namespaces};
use datafusion::dataframe::DataFrame;
use std::collections::HashMap;
use std::fmt;
use tracing::info;

pub const SESSION_SETTINGS: [(&str, &str); 2] =
    [(ALLOW_NONEMPTY_LOCATION, "true"), (GANG_SCHEDULING, "true")];

/// Console milestones, printed to stdout in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Started,
    Dropped,
    Created,
    Populated,
    Completed,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = match self {
            Progress::Started => "JOB STARTED...",
            Progress::Dropped => "\tDROP DATABASE(S) COMPLETED",
            Progress::Created => "\tCREATE DATABASE(S) COMPLETED",
            Progress::Populated => "\tPOPULATE TABLE(S) COMPLETED",
            Progress::Completed => "JOB COMPLETED.\n\n",
        };
        f.write_str(line)
    }
}

fn announce(progress: Progress) {
    info!(stage = ?progress, "{}", progress.to_string().trim());
    println!("{progress}");
}

#[derive(Debug)]
pub struct JobReport {
    pub app_name: String,
    /// Databases that existed before the run and were dropped.
    pub dropped: Vec<DatabaseName>,
    pub created: Vec<DatabaseName>,
    pub tables: Vec<TableWrite>,
}

/// `Ingest-<prefix>` session with both engine flags enabled.
pub async fn open_session(
    job: &JobConfig,
    runtime: &RuntimeConfig,
) -> Result<WarehouseSession, WarehouseError> {
    let mut builder = WarehouseSession::builder()
        .app_name(format!("Ingest-{}", job.user_prefix))
        .warehouse_dir(&runtime.warehouse_dir);
    if let Some(url) = runtime.catalog_url.as_deref() {
        builder = builder.catalog_url(url);
    }
    for (key, value) in SESSION_SETTINGS {
        builder = builder.config(key, value);
    }
    builder.create().await
}

/// Load the job settings from `runtime.config_path`, then run. Nothing is
/// opened or created when the file is missing a setting.
pub async fn run_configured(runtime: &RuntimeConfig) -> Result<JobReport, WarehouseError> {
    let job = JobConfig::load(&runtime.config_path)?;
    info!(
        s3_bucket_path = %job.s3_bucket_path,
        user_prefix = %job.user_prefix,
        "job configuration loaded"
    );
    run(&job, runtime).await
}

pub async fn run(job: &JobConfig, runtime: &RuntimeConfig) -> Result<JobReport, WarehouseError> {
    let namespaces = Namespaces::from_prefix(&job.user_prefix)?;
    let root = StorageRoot::parse(&job.s3_bucket_path)?;
    let session = open_session(job, runtime).await?;
    run_with_session(&session, &namespaces, &root).await
}

pub async fn run_with_session(
    session: &WarehouseSession,
    namespaces: &Namespaces,
    root: &StorageRoot,
) -> Result<JobReport, WarehouseError> {
    session.register_storage(root)?;

    let mut frames: HashMap<Dataset, DataFrame> =
        HashMap::with_capacity(Dataset::READ_ORDER.len());
    for dataset in Dataset::READ_ORDER {
        let path = root.locate(dataset.file_name());
        frames.insert(dataset, session.read_csv(&path).await?);
    }

    announce(Progress::Started);

    let mut dropped = Vec::new();
    for name in namespaces.all() {
        if session
            .drop_database(name, DropOptions::IF_EXISTS_CASCADE)
            .await?
        {
            dropped.push(name.clone());
        }
    }
    announce(Progress::Dropped);

    let mut created = Vec::new();
    for name in namespaces.all() {
        session.create_database(name).await?;
        created.push(name.clone());
    }
    announce(Progress::Created);

    let mut writes = Vec::with_capacity(Dataset::WRITE_ORDER.len());
    for dataset in Dataset::WRITE_ORDER {
        if let Some(frame) = frames.remove(&dataset) {
            writes.push((frame, dataset.target(namespaces)?));
        }
    }
    let tables = session.save_all(writes, SaveMode::Overwrite).await?;
    announce(Progress::Populated);
    announce(Progress::Completed);

    Ok(JobReport {
        app_name: session.app_name().to_string(),
        dropped,
        created,
        tables,
    })
}
