use crate::error::WarehouseError;
use crate::service::session::WarehouseSession;
use object_store::aws::AmazonS3Builder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Root under which the source CSV files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRoot {
    Local(PathBuf),
    /// `s3://`, `s3a://` or `s3n://` bucket URL.
    S3(Url),
}

impl StorageRoot {
    pub fn parse(raw: &str) -> Result<Self, WarehouseError> {
        if !raw.contains("://") {
            return Ok(StorageRoot::Local(PathBuf::from(raw)));
        }
        let url = Url::parse(raw)?;
        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(StorageRoot::Local)
                .map_err(|_| WarehouseError::UnsupportedStorage(raw.to_string())),
            "s3" | "s3a" | "s3n" if url.host_str().is_some() => Ok(StorageRoot::S3(url)),
            other => Err(WarehouseError::UnsupportedStorage(other.to_string())),
        }
    }

    /// Path of `file_name` directly under the root.
    pub fn locate(&self, file_name: &str) -> String {
        match self {
            StorageRoot::Local(dir) => dir.join(file_name).to_string_lossy().into_owned(),
            StorageRoot::S3(url) => {
                format!("{}/{}", url.as_str().trim_end_matches('/'), file_name)
            }
        }
    }
}

impl WarehouseSession {
    /// Make the root readable by the engine. S3 credentials and region come
    /// from the standard `AWS_*` environment variables.
    pub fn register_storage(&self, root: &StorageRoot) -> Result<(), WarehouseError> {
        let StorageRoot::S3(url) = root else {
            return Ok(());
        };
        let bucket = url
            .host_str()
            .ok_or_else(|| WarehouseError::UnsupportedStorage(url.to_string()))?;
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        let store_url = Url::parse(&format!("{}://{}", url.scheme(), bucket))?;
        self.context()
            .register_object_store(&store_url, Arc::new(store));
        info!(bucket, scheme = url.scheme(), "registered object store");
        Ok(())
    }
}
