//! Configuration: the job's INI file plus environment-driven runtime settings.
//!
//! The job file carries the two values the bootstrap needs (storage root and
//! name prefix). Runtime settings (warehouse directory, catalog location, log
//! level) come from `WAREHOUSE_*` environment variables layered over defaults.

use crate::error::WarehouseError;
use figment::providers::{Env, Serialized};
use figment::value::{Dict, Map, Value};
use figment::{Figment, Metadata, Profile, Provider, Source};
use ini::Ini;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/app/mount/cde_examples.ini";
pub const CONFIG_SECTION: &str = "CDE-examples";
pub const METASTORE_FILE: &str = "metastore.db";

const BUCKET_PATH_KEY: &str = "s3BucketPath";
const USER_PREFIX_KEY: &str = "userPrefix";

/// Values read from the job's INI section. Keys are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobConfig {
    #[serde(rename = "s3bucketpath")]
    pub s3_bucket_path: String,
    #[serde(rename = "userprefix")]
    pub user_prefix: String,
}

impl JobConfig {
    /// Load `[CDE-examples]` from `path`. Fails on a missing file, section or
    /// key; there are no defaults.
    pub fn load(path: &Path) -> Result<Self, WarehouseError> {
        let raw: JobConfig = Figment::from(IniSection::new(path, CONFIG_SECTION)).extract()?;
        raw.sanitized()
    }

    fn sanitized(self) -> Result<Self, WarehouseError> {
        let s3_bucket_path = strip_quotes(&self.s3_bucket_path);
        if s3_bucket_path.is_empty() {
            return Err(WarehouseError::EmptySetting {
                key: BUCKET_PATH_KEY,
            });
        }
        let user_prefix = strip_quotes(&self.user_prefix);
        if user_prefix.is_empty() {
            return Err(WarehouseError::EmptySetting {
                key: USER_PREFIX_KEY,
            });
        }
        Ok(Self {
            s3_bucket_path,
            user_prefix,
        })
    }
}

fn strip_quotes(value: &str) -> String {
    value.replace(['"', '\''], "").trim().to_string()
}

/// Figment provider exposing one section of an INI file as a flat dictionary
/// with lower-cased keys.
pub struct IniSection {
    path: PathBuf,
    section: String,
}

impl IniSection {
    pub fn new(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            section: section.into(),
        }
    }
}

impl Provider for IniSection {
    fn metadata(&self) -> Metadata {
        Metadata::named(format!("INI section [{}]", self.section))
            .source(Source::File(self.path.clone()))
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        let ini = Ini::load_from_file(&self.path).map_err(|e| {
            figment::Error::from(format!(
                "failed to read config file {}: {e}",
                self.path.display()
            ))
        })?;
        let props = ini.section(Some(self.section.as_str())).ok_or_else(|| {
            figment::Error::from(format!(
                "section [{}] not found in {}",
                self.section,
                self.path.display()
            ))
        })?;
        let dict: Dict = props
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), Value::from(v.to_string())))
            .collect();
        Ok(Profile::Default.collect(dict))
    }
}

/// Process-level settings, overridable through `WAREHOUSE_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub config_path: PathBuf,
    #[serde(rename = "dir")]
    pub warehouse_dir: PathBuf,
    #[serde(default)]
    pub catalog_url: Option<String>,
    pub loglevel: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            warehouse_dir: PathBuf::from("./warehouse"),
            catalog_url: None,
            loglevel: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, WarehouseError> {
        Self::from_figment(Figment::from(Serialized::defaults(Self::default())))
    }

    fn from_figment(base: Figment) -> Result<Self, WarehouseError> {
        Ok(base.merge(Env::prefixed("WAREHOUSE_")).extract()?)
    }

    /// Catalog database file used when no explicit URL is configured.
    pub fn metastore_path(&self) -> PathBuf {
        self.warehouse_dir.join(METASTORE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_ini(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cde_examples.ini");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_and_strips_quotes() {
        let (_dir, path) = write_ini(
            "[CDE-examples]\ns3BucketPath = \"s3a://bucket/demo\"\nuserPrefix = 'DEMO'\n",
        );
        let cfg = JobConfig::load(&path).unwrap();
        assert_eq!(cfg.s3_bucket_path, "s3a://bucket/demo");
        assert_eq!(cfg.user_prefix, "DEMO");
    }

    #[test]
    fn unquoted_values_pass_through() {
        let (_dir, path) = write_ini("[CDE-examples]\ns3BucketPath=/data/raw\nuserPrefix=abc\n");
        let cfg = JobConfig::load(&path).unwrap();
        assert_eq!(cfg.s3_bucket_path, "/data/raw");
        assert_eq!(cfg.user_prefix, "abc");
    }

    #[test]
    fn key_lookup_ignores_case() {
        let (_dir, path) = write_ini("[CDE-examples]\nS3BUCKETPATH=/data\nuserprefix=X\n");
        let cfg = JobConfig::load(&path).unwrap();
        assert_eq!(cfg.s3_bucket_path, "/data");
        assert_eq!(cfg.user_prefix, "X");
    }

    #[test]
    fn missing_key_fails() {
        let (_dir, path) = write_ini("[CDE-examples]\ns3BucketPath=/data\n");
        let err = JobConfig::load(&path).unwrap_err();
        assert!(matches!(err, WarehouseError::Config(_)));
        assert!(err.to_string().contains("userprefix"));
    }

    #[test]
    fn missing_section_fails() {
        let (_dir, path) = write_ini("[other]\ns3BucketPath=/data\nuserPrefix=X\n");
        let err = JobConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("CDE-examples"));
    }

    #[test]
    fn missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = JobConfig::load(&dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, WarehouseError::Config(_)));
    }

    #[test]
    fn value_of_only_quotes_is_empty() {
        let (_dir, path) = write_ini("[CDE-examples]\ns3BucketPath=/data\nuserPrefix=\"\"\n");
        let err = JobConfig::load(&path).unwrap_err();
        assert!(matches!(
            err,
            WarehouseError::EmptySetting {
                key: "userPrefix"
            }
        ));
    }

    #[test]
    fn runtime_defaults() {
        let defaults = Figment::from(Serialized::defaults(RuntimeConfig::default()));
        let cfg = RuntimeConfig::from_figment(defaults).unwrap();
        assert_eq!(cfg.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cfg.metastore_path(), PathBuf::from("./warehouse").join(METASTORE_FILE));
    }

    #[test]
    fn runtime_overrides_layer_over_defaults() {
        let base = Figment::from(Serialized::defaults(RuntimeConfig::default()))
            .merge(Serialized::default("dir", "/srv/warehouse"))
            .merge(Serialized::default("loglevel", "debug"));
        let cfg = RuntimeConfig::from_figment(base).unwrap();
        assert_eq!(cfg.warehouse_dir, PathBuf::from("/srv/warehouse"));
        assert_eq!(cfg.loglevel, "debug");
        assert_eq!(cfg.catalog_url, None);
    }
}
