//! Warehouse session: a DataFusion context bound to a warehouse directory and
//! its persistent catalog, plus the engine flags that shape table writes.

use crate::config::METASTORE_FILE;
use crate::db::{CatalogStorage, connect, connect_file};
use crate::error::WarehouseError;
use datafusion::prelude::{SessionConfig, SessionContext};
use std::path::{Path, PathBuf};
use tracing::info;

/// Clear a non-empty location when creating a managed table the catalog does
/// not know about, instead of failing.
pub const ALLOW_NONEMPTY_LOCATION: &str =
    "warehouse.sql.allowCreatingManagedTableUsingNonemptyLocation";

/// Schedule a batch of table writes together: all of them commit or none do.
pub const GANG_SCHEDULING: &str = "warehouse.gangScheduling.enabled";

const DATAFUSION_PREFIX: &str = "datafusion.";
const DEFAULT_APP_NAME: &str = "warehouse";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineFlags {
    pub allow_nonempty_location: bool,
    pub gang_scheduling: bool,
}

#[derive(Debug, Default)]
pub struct SessionBuilder {
    app_name: Option<String>,
    warehouse_dir: Option<PathBuf>,
    catalog_url: Option<String>,
    settings: Vec<(String, String)>,
}

impl SessionBuilder {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn warehouse_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.warehouse_dir = Some(dir.into());
        self
    }

    /// Catalog location; defaults to `metastore.db` inside the warehouse dir.
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = Some(url.into());
        self
    }

    /// Engine setting. Validated when the session is created.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }

    pub async fn create(self) -> Result<WarehouseSession, WarehouseError> {
        let mut flags = EngineFlags::default();
        let mut config = SessionConfig::new().with_information_schema(true);
        for (key, value) in &self.settings {
            apply_setting(&mut flags, &mut config, key, value)?;
        }

        let warehouse_dir = self
            .warehouse_dir
            .unwrap_or_else(|| PathBuf::from("./warehouse"));
        tokio::fs::create_dir_all(&warehouse_dir).await?;
        let warehouse_dir = tokio::fs::canonicalize(&warehouse_dir).await?;

        let pool = match self.catalog_url.as_deref() {
            Some(url) => connect(url).await?,
            None => connect_file(&warehouse_dir.join(METASTORE_FILE)).await?,
        };
        let catalog = CatalogStorage::new(pool);
        catalog.init_schema().await?;

        let app_name = self
            .app_name
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        info!(
            app = %app_name,
            warehouse = %warehouse_dir.display(),
            allow_nonempty_location = flags.allow_nonempty_location,
            gang_scheduling = flags.gang_scheduling,
            "warehouse session created"
        );

        Ok(WarehouseSession {
            app_name,
            ctx: SessionContext::new_with_config(config),
            catalog,
            warehouse_dir,
            flags,
        })
    }
}

fn apply_setting(
    flags: &mut EngineFlags,
    config: &mut SessionConfig,
    key: &str,
    value: &str,
) -> Result<(), WarehouseError> {
    match key {
        ALLOW_NONEMPTY_LOCATION => flags.allow_nonempty_location = parse_flag(key, value)?,
        GANG_SCHEDULING => flags.gang_scheduling = parse_flag(key, value)?,
        k if k.starts_with(DATAFUSION_PREFIX) => {
            config
                .options_mut()
                .set(k, value)
                .map_err(|_| WarehouseError::InvalidSetting {
                    key: k.to_string(),
                    value: value.to_string(),
                })?
        }
        other => return Err(WarehouseError::UnknownSetting(other.to_string())),
    }
    Ok(())
}

fn parse_flag(key: &str, value: &str) -> Result<bool, WarehouseError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(WarehouseError::InvalidSetting {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Process-scoped handle for one bootstrap run.
pub struct WarehouseSession {
    app_name: String,
    ctx: SessionContext,
    catalog: CatalogStorage,
    warehouse_dir: PathBuf,
    flags: EngineFlags,
}

impl WarehouseSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn catalog(&self) -> &CatalogStorage {
        &self.catalog
    }

    pub fn warehouse_dir(&self) -> &Path {
        &self.warehouse_dir
    }

    pub fn flags(&self) -> EngineFlags {
        self.flags
    }
}
