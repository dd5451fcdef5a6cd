use crate::error::WarehouseError;
use crate::service::session::WarehouseSession;
use crate::types::QualifiedName;
use datafusion::dataframe::DataFrame;
use datafusion::datasource::listing::ListingTableUrl;
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions};
use tracing::debug;

/// Column types are inferred from every record, not a sample.
const INFER_ALL_RECORDS: usize = usize::MAX;

impl WarehouseSession {
    /// Load a CSV file whose first row holds the column names. The schema is
    /// inferred eagerly, so an unreachable path fails here.
    pub async fn read_csv(&self, path: &str) -> Result<DataFrame, WarehouseError> {
        self.ensure_source_exists(path).await?;
        let options = CsvReadOptions::new()
            .has_header(true)
            .schema_infer_max_records(INFER_ALL_RECORDS);
        let frame = self.context().read_csv(path, options).await?;
        debug!(
            path,
            columns = frame.schema().fields().len(),
            "csv dataset loaded"
        );
        Ok(frame)
    }

    /// The engine treats a missing file as an empty listing, so look the
    /// object up directly.
    async fn ensure_source_exists(&self, path: &str) -> Result<(), WarehouseError> {
        let url = ListingTableUrl::parse(path)?;
        let store = self.context().runtime_env().object_store(url.object_store())?;
        match store.head(url.prefix()).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(WarehouseError::SourceNotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Scan a catalog table.
    pub async fn table(&self, name: &QualifiedName) -> Result<DataFrame, WarehouseError> {
        let entry = self.describe_table(name).await?;
        let path = format!("{}/", entry.location.display());
        let frame = self
            .context()
            .read_parquet(path.as_str(), ParquetReadOptions::default())
            .await?;
        Ok(frame)
    }
}
