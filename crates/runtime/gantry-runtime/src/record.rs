//! Configuration records consumed by the reconciler

use crate::hash::ConfigurationHash;
use gantry_connector::{ConnectionParameters, FeatureOptions};
use gantry_core::{GantryError, GantryResult, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Declared attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeConfig {
    /// Connector-side attribute name
    pub name: String,
    /// Attribute options
    #[serde(default)]
    pub parameters: FeatureOptions,
}

/// Declared notification list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Notification category
    pub category: String,
    /// List options
    #[serde(default)]
    pub parameters: FeatureOptions,
}

/// Declared operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationConfig {
    /// Connector-side operation name
    pub name: String,
    /// Operation options
    #[serde(default)]
    pub parameters: FeatureOptions,
}

/// Desired state of one managed resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    /// Unique resource name; filled from the map key when loaded from a source
    #[serde(default)]
    pub resource_name: String,
    /// Connector type tag selecting the factory
    pub connector_type: String,
    /// Connector-specific address
    #[serde(default)]
    pub connection_string: String,
    /// Connection parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Attributes by feature id
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeConfig>,
    /// Notification lists by subscription-list id
    #[serde(default)]
    pub events: BTreeMap<String, EventConfig>,
    /// Operations by feature id
    #[serde(default)]
    pub operations: BTreeMap<String, OperationConfig>,
}

impl ConfigurationRecord {
    /// Record without parameters or features
    pub fn new(
        resource_name: impl Into<String>,
        connector_type: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            connector_type: connector_type.into(),
            connection_string: connection_string.into(),
            ..Self::default()
        }
    }

    /// Builder-style connection parameter
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Builder-style attribute declaration
    #[must_use]
    pub fn with_attribute(mut self, id: impl Into<String>, name: impl Into<String>, parameters: FeatureOptions) -> Self {
        self.attributes.insert(
            id.into(),
            AttributeConfig {
                name: name.into(),
                parameters,
            },
        );
        self
    }

    /// Builder-style notification list declaration
    #[must_use]
    pub fn with_event(mut self, list_id: impl Into<String>, category: impl Into<String>, parameters: FeatureOptions) -> Self {
        self.events.insert(
            list_id.into(),
            EventConfig {
                category: category.into(),
                parameters,
            },
        );
        self
    }

    /// Builder-style operation declaration
    #[must_use]
    pub fn with_operation(mut self, id: impl Into<String>, name: impl Into<String>, parameters: FeatureOptions) -> Self {
        self.operations.insert(
            id.into(),
            OperationConfig {
                name: name.into(),
                parameters,
            },
        );
        self
    }

    /// Fingerprint of the connection string and parameters
    pub fn hash(&self) -> ConfigurationHash {
        ConfigurationHash::compute(&self.connection_string, &self.parameters)
    }

    /// Connection parameters handed to the factory
    pub fn connection_parameters(&self) -> ConnectionParameters {
        ConnectionParameters {
            connection_string: self.connection_string.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// Declared attribute ids
    pub fn attribute_ids(&self) -> HashSet<String> {
        self.attributes.keys().cloned().collect()
    }

    /// Declared notification list ids
    pub fn event_ids(&self) -> HashSet<String> {
        self.events.keys().cloned().collect()
    }

    /// Declared operation ids
    pub fn operation_ids(&self) -> HashSet<String> {
        self.operations.keys().cloned().collect()
    }
}

impl Validatable for ConfigurationRecord {
    fn validate(&self) -> GantryResult<()> {
        if self.resource_name.trim().is_empty() {
            return Err(GantryError::invalid_input("resource name must not be empty"));
        }
        if self.connector_type.trim().is_empty() {
            return Err(GantryError::invalid_input(format!(
                "resource '{}' has no connector type",
                self.resource_name
            )));
        }
        let unnamed = self
            .attributes
            .iter()
            .filter(|(_, cfg)| cfg.name.is_empty())
            .map(|(id, _)| id)
            .chain(self.events.iter().filter(|(_, cfg)| cfg.category.is_empty()).map(|(id, _)| id))
            .chain(self.operations.iter().filter(|(_, cfg)| cfg.name.is_empty()).map(|(id, _)| id))
            .next();
        if let Some(id) = unnamed {
            return Err(GantryError::invalid_input(format!(
                "feature '{id}' of resource '{}' has no name",
                self.resource_name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_do_not_affect_hash() {
        let plain = ConfigurationRecord::new("db1", "jdbc", "tcp://host:1").with_parameter("user", "a");
        let featured = plain
            .clone()
            .with_attribute("cpu", "cpu", FeatureOptions::new())
            .with_event("alarms", "alarm", FeatureOptions::new());
        assert_eq!(plain.hash(), featured.hash());
        assert_ne!(plain.hash(), plain.clone().with_parameter("user", "b").hash());
    }

    #[test]
    fn test_validation() {
        assert!(ConfigurationRecord::new("db1", "jdbc", "").is_valid());
        assert!(!ConfigurationRecord::new("", "jdbc", "").is_valid());
        assert!(!ConfigurationRecord::new("db1", " ", "").is_valid());
        assert!(!ConfigurationRecord::new("db1", "jdbc", "")
            .with_event("alarms", "", FeatureOptions::new())
            .is_valid());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let record: ConfigurationRecord = toml::from_str(
            r#"
            connector_type = "jdbc"
            connection_string = "tcp://host:1"

            [parameters]
            user = "a"

            [attributes.cpu]
            name = "cpu_load"
            parameters = { type = "float64" }

            [events.alarms]
            category = "alarm"
            "#,
        )
        .unwrap();

        assert_eq!(record.connector_type, "jdbc");
        assert_eq!(record.parameters["user"], "a");
        assert_eq!(record.attributes["cpu"].parameters.type_hint(), Some("float64"));
        assert!(record.events["alarms"].parameters.is_empty());
        assert!(record.operations.is_empty());
    }
}
