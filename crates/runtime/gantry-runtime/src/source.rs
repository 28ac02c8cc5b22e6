//! Where configuration snapshots come from

use crate::error::{RuntimeError, RuntimeResult};
use crate::record::ConfigurationRecord;
use async_trait::async_trait;
use gantry_core::Validatable;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Produces the full set of desired resources
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    /// Name used in logs and errors
    fn source_name(&self) -> &str;

    /// Load a complete snapshot; resources missing from it are torn down
    async fn load(&self) -> RuntimeResult<Vec<ConfigurationRecord>>;
}

/// In-memory snapshot, replaceable at runtime
#[derive(Debug, Default)]
pub struct StaticConfigurationSource {
    records: RwLock<Vec<ConfigurationRecord>>,
}

impl StaticConfigurationSource {
    /// Source serving `records`
    pub fn new(records: Vec<ConfigurationRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Replace the snapshot
    pub fn replace(&self, records: Vec<ConfigurationRecord>) {
        *self.records.write() = records;
    }
}

#[async_trait]
impl ConfigurationSource for StaticConfigurationSource {
    fn source_name(&self) -> &str {
        "static"
    }

    async fn load(&self) -> RuntimeResult<Vec<ConfigurationRecord>> {
        Ok(self.records.read().clone())
    }
}

#[derive(Debug, Deserialize)]
struct ResourceFile {
    #[serde(default)]
    resources: BTreeMap<String, ConfigurationRecord>,
}

/// TOML or JSON file with a top-level `resources` table keyed by resource name
///
/// ```toml
/// [resources.db1]
/// connector_type = "jdbc"
/// connection_string = "tcp://host:1"
/// parameters = { user = "a" }
///
/// [resources.db1.attributes.cpu]
/// name = "cpu_load"
/// ```
#[derive(Debug, Clone)]
pub struct FileConfigurationSource {
    name: String,
    path: PathBuf,
}

impl FileConfigurationSource {
    /// Source reading `path`; the format follows the extension (`.json`, otherwise TOML)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
        }
    }

    /// File being read
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_json(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }

    fn parse(&self, content: &str) -> RuntimeResult<ResourceFile> {
        if self.is_json() {
            serde_json::from_str(content).map_err(|err| RuntimeError::source_failed(&self.name, err))
        } else {
            toml::from_str(content).map_err(|err| RuntimeError::source_failed(&self.name, err))
        }
    }
}

#[async_trait]
impl ConfigurationSource for FileConfigurationSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> RuntimeResult<Vec<ConfigurationRecord>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let file = self.parse(&content)?;

        file.resources
            .into_iter()
            .map(|(key, mut record)| {
                if record.resource_name.is_empty() {
                    record.resource_name = key;
                } else if record.resource_name != key {
                    return Err(RuntimeError::InvalidRecord(format!(
                        "resource '{key}' declares a different name '{}'",
                        record.resource_name
                    )));
                }
                record
                    .validate()
                    .map_err(|err| RuntimeError::InvalidRecord(err.to_string()))?;
                Ok(record)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_connector::FeatureOptions;

    #[test]
    fn test_static_source_replace() {
        let source = StaticConfigurationSource::new(vec![ConfigurationRecord::new("db1", "jdbc", "")]);
        assert_eq!(tokio_test::block_on(source.load()).unwrap().len(), 1);

        source.replace(vec![
            ConfigurationRecord::new("db1", "jdbc", ""),
            ConfigurationRecord::new("db2", "jdbc", "").with_attribute("cpu", "cpu", FeatureOptions::new()),
        ]);
        assert_eq!(tokio_test::block_on(source.load()).unwrap().len(), 2);
        assert_eq!(source.source_name(), "static");
    }

    #[test]
    fn test_format_follows_extension() {
        assert!(FileConfigurationSource::new("/etc/gantry/resources.JSON").is_json());
        assert!(!FileConfigurationSource::new("/etc/gantry/resources.toml").is_json());
    }
}
