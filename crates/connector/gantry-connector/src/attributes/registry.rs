//! Thread-safe registry of connected attributes

use super::{AttributeDescriptor, AttributeSupport};
use crate::entity::{EntityValue, ScalarType, TypeProjectionRegistry, Value};
use crate::error::{ConnectorError, ConnectorResult};
use crate::feature::{within, FeatureOptions};
use gantry_core::CountdownTimer;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Outcome of a single fetch. `Missing` is distinct from a null value: it means
/// no value was produced and the caller's default must stay in place.
enum Fetched {
    Value(EntityValue),
    Missing,
}

/// Map from attribute id to connected descriptor, guarded by one reader/writer lock.
///
/// Single reads and writes run under the read side so they never block each
/// other; `connect`, `disconnect`, `clear` and batch writes take the write side.
/// Unknown ids are not errors: reads fall back to the caller's default and writes
/// report `false`.
pub struct AttributeRegistry {
    resource_name: String,
    support: Arc<dyn AttributeSupport>,
    types: Arc<TypeProjectionRegistry>,
    attributes: RwLock<HashMap<String, Arc<AttributeDescriptor>>>,
}

impl AttributeRegistry {
    /// Empty registry backed by `support`
    pub fn new(
        resource_name: impl Into<String>,
        support: Arc<dyn AttributeSupport>,
        types: Arc<TypeProjectionRegistry>,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            support,
            types,
            attributes: RwLock::new(HashMap::new()),
        }
    }

    /// Resource this registry belongs to
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Type catalog used to type fetched values
    pub fn types(&self) -> &Arc<TypeProjectionRegistry> {
        &self.types
    }

    /// Connect attribute `name` under `id`.
    ///
    /// Idempotent per id: when `id` is already connected the existing descriptor is
    /// returned and the connector is not consulted again, whatever `name` and
    /// `options` say. `Ok(None)` means the connector does not know the attribute.
    pub async fn connect(
        &self,
        id: &str,
        name: &str,
        options: FeatureOptions,
    ) -> ConnectorResult<Option<Arc<AttributeDescriptor>>> {
        if id.is_empty() {
            return Err(ConnectorError::InvalidInput("attribute id must not be empty".into()));
        }

        let mut attributes = self.attributes.write().await;
        if let Some(existing) = attributes.get(id) {
            debug!(resource = %self.resource_name, attribute = %id, "Attribute already connected");
            return Ok(Some(existing.clone()));
        }

        let Some(descriptor) = self.support.resolve(name, &options).await? else {
            debug!(resource = %self.resource_name, attribute = %id, name = %name, "Attribute not resolved");
            return Ok(None);
        };

        let descriptor = descriptor.bind(id);
        if let Some(ty) = options.type_hint().and_then(|hint| self.types.detect(hint)) {
            descriptor.entity_type_or_init(|| ty);
        }
        let descriptor = Arc::new(descriptor);
        attributes.insert(id.to_string(), descriptor.clone());
        info!(resource = %self.resource_name, attribute = %id, name = %name, "Attribute connected");
        Ok(Some(descriptor))
    }

    /// Read attribute `id`, returning `default` when it is not connected.
    ///
    /// Timeouts and connector failures propagate typed.
    pub async fn read(&self, id: &str, timeout: Duration, default: EntityValue) -> ConnectorResult<EntityValue> {
        let attributes = self.attributes.read().await;
        let Some(descriptor) = attributes.get(id) else {
            return Ok(default);
        };
        match self.fetch(descriptor, timeout).await? {
            Fetched::Value(value) => Ok(value),
            Fetched::Missing => Ok(default),
        }
    }

    /// Read every id in `values`, replacing defaults with fetched values.
    ///
    /// Items are fetched in id order and share one countdown of `timeout`. A
    /// failing or slow item never aborts the batch; it keeps its default and is
    /// left out of the returned set, as does every item the budget no longer covers.
    pub async fn read_batch(&self, values: &mut HashMap<String, EntityValue>, timeout: Duration) -> HashSet<String> {
        let mut snapshot: Vec<(String, Arc<AttributeDescriptor>)> = {
            let attributes = self.attributes.read().await;
            values
                .keys()
                .filter_map(|id| attributes.get(id).map(|d| (id.clone(), d.clone())))
                .collect()
        };
        snapshot.sort_by(|(a, _), (b, _)| a.cmp(b));

        let timer = CountdownTimer::start(timeout);
        let mut succeeded = HashSet::with_capacity(snapshot.len());
        for (id, descriptor) in snapshot {
            let remaining = match timer.ensure_remaining("batch read") {
                Ok(remaining) => remaining,
                Err(err) => {
                    warn!(resource = %self.resource_name, attribute = %id, error = %err, "Batch read budget exhausted");
                    break;
                }
            };
            match self.fetch(&descriptor, remaining).await {
                Ok(Fetched::Value(value)) => {
                    values.insert(id.clone(), value);
                    succeeded.insert(id);
                }
                Ok(Fetched::Missing) => {
                    debug!(resource = %self.resource_name, attribute = %id, "Batch read produced no value");
                }
                Err(err) => {
                    warn!(resource = %self.resource_name, attribute = %id, error = %err, "Batch read item failed");
                }
            }
        }
        succeeded
    }

    /// Write attribute `id`. `Ok(false)` when it is not connected or not writable.
    pub async fn write(&self, id: &str, timeout: Duration, value: EntityValue) -> ConnectorResult<bool> {
        let attributes = self.attributes.read().await;
        let Some(descriptor) = attributes.get(id) else {
            return Ok(false);
        };
        self.push(descriptor, timeout, &value).await
    }

    /// Write every entry of `values`, in id order, under one countdown of `timeout`.
    ///
    /// Returns the logical AND of all item results. Items already written stay
    /// written when a later one fails; there is no multi-attribute transaction.
    pub async fn write_batch(&self, values: &HashMap<String, EntityValue>, timeout: Duration) -> bool {
        let attributes = self.attributes.write().await;
        let timer = CountdownTimer::start(timeout);
        let mut all_succeeded = true;

        let mut entries: Vec<(&String, &EntityValue)> = values.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (id, value) in entries {
            let Some(descriptor) = attributes.get(id) else {
                all_succeeded = false;
                continue;
            };
            let outcome = match timer.ensure_remaining("batch write") {
                Ok(remaining) => self.push(descriptor, remaining, value).await,
                Err(err) => Err(err.into()),
            };
            match outcome {
                Ok(true) => {}
                Ok(false) => all_succeeded = false,
                Err(err) => {
                    warn!(resource = %self.resource_name, attribute = %id, error = %err, "Batch write item failed");
                    all_succeeded = false;
                }
            }
        }
        all_succeeded
    }

    /// Disconnect `id`. The descriptor stays connected if the connector refuses to release it.
    pub async fn disconnect(&self, id: &str) -> bool {
        let mut attributes = self.attributes.write().await;
        let Some(descriptor) = attributes.get(id).cloned() else {
            return false;
        };
        if self.support.release(id, &descriptor).await {
            attributes.remove(id);
            info!(resource = %self.resource_name, attribute = %id, "Attribute disconnected");
            true
        } else {
            warn!(resource = %self.resource_name, attribute = %id, "Connector refused to release attribute");
            false
        }
    }

    /// Disconnect every attribute whose id is not in `keep`. Returns the removed ids.
    pub async fn retain(&self, keep: &HashSet<String>) -> Vec<String> {
        let stale: Vec<String> = {
            let attributes = self.attributes.read().await;
            attributes.keys().filter(|id| !keep.contains(*id)).cloned().collect()
        };

        let mut removed = Vec::with_capacity(stale.len());
        for id in stale {
            if self.disconnect(&id).await {
                removed.push(id);
            }
        }
        removed
    }

    /// Descriptor of `id`, if connected
    pub async fn get(&self, id: &str) -> Option<Arc<AttributeDescriptor>> {
        self.attributes.read().await.get(id).cloned()
    }

    /// Snapshot of connected ids
    pub async fn list(&self) -> BTreeSet<String> {
        self.attributes.read().await.keys().cloned().collect()
    }

    /// Number of connected attributes
    pub async fn len(&self) -> usize {
        self.attributes.read().await.len()
    }

    /// Whether no attribute is connected
    pub async fn is_empty(&self) -> bool {
        self.attributes.read().await.is_empty()
    }

    /// Remove every attribute. Releases are attempted but never block removal.
    pub async fn clear(&self) -> usize {
        let mut attributes = self.attributes.write().await;
        for (id, descriptor) in attributes.iter() {
            if !self.support.release(id, descriptor).await {
                debug!(resource = %self.resource_name, attribute = %id, "Release refused during clear");
            }
        }
        let removed = attributes.len();
        attributes.clear();
        removed
    }

    async fn fetch(&self, descriptor: &AttributeDescriptor, timeout: Duration) -> ConnectorResult<Fetched> {
        if !descriptor.is_readable() {
            debug!(resource = %self.resource_name, attribute = %descriptor.id(), "Attribute is not readable");
            return Ok(Fetched::Missing);
        }
        let timeout = descriptor.options().bound_timeout(timeout);
        let call = self.support.fetch(descriptor, timeout);
        let raw = within(timeout, || format!("read of '{}'", descriptor.id()), call).await?;
        Ok(Fetched::Value(self.typed(descriptor, raw)))
    }

    async fn push(&self, descriptor: &AttributeDescriptor, timeout: Duration, value: &EntityValue) -> ConnectorResult<bool> {
        if !descriptor.is_writable() {
            debug!(resource = %self.resource_name, attribute = %descriptor.id(), "Attribute is not writable");
            return Ok(false);
        }
        let timeout = descriptor.options().bound_timeout(timeout);
        let call = self.support.push(descriptor, timeout, value);
        within(timeout, || format!("write of '{}'", descriptor.id()), call).await?;
        Ok(true)
    }

    fn typed(&self, descriptor: &AttributeDescriptor, raw: Option<Value>) -> EntityValue {
        let ty = match (descriptor.entity_type(), raw.as_ref()) {
            (Some(ty), _) => ty.clone(),
            (None, Some(value)) => descriptor
                .entity_type_or_init(|| self.types.detect_value(value))
                .clone(),
            // Nothing to detect from; do not cache a guess.
            (None, None) => self.types.scalar(ScalarType::Json),
        };
        EntityValue::new(raw, ty)
    }
}

impl std::fmt::Debug for AttributeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeRegistry")
            .field("resource_name", &self.resource_name)
            .finish_non_exhaustive()
    }
}
