//! Option bags attached to attributes, notification lists and operations.

use crate::error::{ConnectorError, ConnectorResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

/// Well-known option naming the declared type of an attribute (e.g. `int64[]`)
pub const TYPE_OPTION: &str = "type";

/// Well-known option naming a human readable description
pub const DESCRIPTION_OPTION: &str = "description";

/// Well-known option overriding the display name
pub const DISPLAY_NAME_OPTION: &str = "displayName";

/// Well-known option carrying a per-feature timeout in milliseconds
pub const TIMEOUT_OPTION: &str = "readWriteTimeout";

/// String-keyed configuration options for one feature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureOptions(BTreeMap<String, String>);

impl FeatureOptions {
    /// Empty option bag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up an option
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether an option is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Add an option unless the key is already set. Returns `true` if added.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        match self.0.entry(key.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Declared type hint, if any
    pub fn type_hint(&self) -> Option<&str> {
        self.get(TYPE_OPTION)
    }

    /// Per-feature timeout, if configured and parseable
    pub fn timeout(&self) -> Option<Duration> {
        self.get(TIMEOUT_OPTION)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
    }

    /// `requested`, shortened to the per-feature timeout when one is configured
    #[must_use]
    pub fn bound_timeout(&self, requested: Duration) -> Duration {
        self.timeout().map_or(requested, |limit| limit.min(requested))
    }

    /// Iterate over all options in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of options
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for FeatureOptions {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, String>> for FeatureOptions {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FeatureOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Run a connector call, failing with [`ConnectorError::Timeout`] once `timeout` passes.
///
/// Connector code is handed the same budget; this only stops the registry from
/// waiting on a call that ignores it.
pub(crate) async fn within<T, F>(timeout: Duration, what: impl FnOnce() -> String, call: F) -> ConnectorResult<T>
where
    F: Future<Output = ConnectorResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ConnectorError::timeout(format!("{} after {}ms", what(), timeout.as_millis()))),
    }
}
