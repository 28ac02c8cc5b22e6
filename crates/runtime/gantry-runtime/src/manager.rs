//! Per-resource multiplexing of reconcilers and published instances

use crate::error::{RuntimeError, RuntimeResult};
use crate::reconciler::{ConnectorReconciler, Published, ReconcileReport};
use crate::record::ConfigurationRecord;
use crate::source::ConfigurationSource;
use dashmap::DashMap;
use gantry_connector::{ConnectorFactory, ConnectorInstance, InstanceIdentity, InstanceState};
use gantry_core::{RuntimeSettings, Validatable};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Lifecycle state of a resource as seen by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// Nothing published under the name
    Absent,
    /// A live instance is published
    Active,
    /// The published instance has been closed underneath the registry
    Closed,
}

/// Discovery filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    /// Required connector type
    pub connector_type: Option<String>,
    /// Required connection string
    pub connection_string: Option<String>,
}

impl InstanceFilter {
    /// Match one connector type
    pub fn connector_type(connector_type: impl Into<String>) -> Self {
        Self {
            connector_type: Some(connector_type.into()),
            ..Self::default()
        }
    }

    /// Also require a connection string
    #[must_use]
    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Whether `identity` passes the filter
    pub fn matches(&self, identity: &InstanceIdentity) -> bool {
        self.connector_type
            .as_deref()
            .map_or(true, |ty| ty == identity.connector_type)
            && self
                .connection_string
                .as_deref()
                .map_or(true, |cs| cs == identity.connection_string)
    }
}

/// Result of applying a full configuration snapshot
#[derive(Debug, Default)]
pub struct SnapshotReport {
    /// Reports of resources reconciled successfully
    pub reconciled: Vec<ReconcileReport>,
    /// Resources whose reconciliation failed
    pub failed: Vec<(String, RuntimeError)>,
    /// Resources torn down because the snapshot no longer declares them
    pub removed: Vec<String>,
}

impl SnapshotReport {
    /// Whether every resource reconciled without error
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One resource's published state. `gate` serializes reconciliation of the resource.
#[derive(Default)]
struct ResourceSlot {
    gate: Arc<Mutex<()>>,
    published: RwLock<Option<Published>>,
}

impl ResourceSlot {
    fn published(&self) -> Option<Published> {
        self.published.read().clone()
    }

    fn publish(&self, published: Option<Published>) {
        *self.published.write() = published;
    }
}

/// Owns the map from resource name to published instance and hash.
///
/// Reconciliations of different resources run independently; reconciliations
/// of the same resource are serialized. Nothing here is global: the process
/// entry point builds one manager and passes it to whoever needs it.
#[derive(Default)]
pub struct ConnectorRegistryManager {
    settings: Arc<RuntimeSettings>,
    reconcilers: RwLock<HashMap<String, Arc<ConnectorReconciler>>>,
    slots: DashMap<String, Arc<ResourceSlot>>,
}

impl ConnectorRegistryManager {
    /// Manager without factories, using default runtime settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager whose instances are created with `settings`
    pub fn with_settings(settings: RuntimeSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            ..Self::default()
        }
    }

    /// Runtime settings handed to every factory
    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Builder-style [`register_factory`](Self::register_factory)
    #[must_use]
    pub fn with_factory(self, factory: Arc<dyn ConnectorFactory>) -> Self {
        self.register_factory(factory);
        self
    }

    /// Serve a connector type; a later factory for the same type replaces the earlier one
    pub fn register_factory(&self, factory: Arc<dyn ConnectorFactory>) {
        let connector_type = factory.connector_type().to_string();
        info!(connector_type = %connector_type, "Connector factory registered");
        self.reconcilers
            .write()
            .insert(
                connector_type,
                Arc::new(ConnectorReconciler::new(factory).with_settings(self.settings.clone())),
            );
    }

    /// Connector types with a registered factory
    pub fn connector_types(&self) -> BTreeSet<String> {
        self.reconcilers.read().keys().cloned().collect()
    }

    fn reconciler_for(&self, connector_type: &str) -> RuntimeResult<Arc<ConnectorReconciler>> {
        self.reconcilers
            .read()
            .get(connector_type)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownConnectorType(connector_type.to_string()))
    }

    /// Lock the slot for `name`, creating it if needed.
    ///
    /// A slot removed while we waited on its gate is stale; retry on the current one.
    async fn lock_slot(&self, name: &str) -> (Arc<ResourceSlot>, OwnedMutexGuard<()>) {
        loop {
            let slot = self
                .slots
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(ResourceSlot::default()))
                .clone();
            let guard = slot.gate.clone().lock_owned().await;
            let current = self.slots.get(name).is_some_and(|entry| Arc::ptr_eq(entry.value(), &slot));
            if current {
                return (slot, guard);
            }
        }
    }

    fn drop_slot(&self, name: &str, slot: &Arc<ResourceSlot>) {
        self.slots.remove_if(name, |_, current| Arc::ptr_eq(current, slot));
    }

    /// Release a published instance with its own type's reconciler, or just close it
    async fn teardown(&self, published: Published) {
        match self.reconciler_for(published.instance.connector_type()) {
            Ok(reconciler) => reconciler.teardown(published).await,
            Err(_) => published.instance.close().await,
        }
    }

    /// Reconcile one record.
    ///
    /// On failure the previous instance stays published when it is still alive;
    /// otherwise the resource becomes absent.
    pub async fn reconcile(&self, record: &ConfigurationRecord) -> RuntimeResult<ReconcileReport> {
        record
            .validate()
            .map_err(|err| RuntimeError::InvalidRecord(err.to_string()))?;
        let reconciler = self.reconciler_for(&record.connector_type)?;
        let name = record.resource_name.as_str();

        let (slot, _gate) = self.lock_slot(name).await;
        let mut previous = slot.published();

        let type_changed = previous
            .as_ref()
            .is_some_and(|p| p.instance.connector_type() != record.connector_type);
        if type_changed {
            if let Some(published) = previous.take() {
                info!(
                    resource = %name,
                    from = %published.instance.connector_type(),
                    to = %record.connector_type,
                    "Connector type changed"
                );
                slot.publish(None);
                self.teardown(published).await;
            }
        }

        match reconciler.reconcile(previous.as_ref(), record).await {
            Ok((published, report)) => {
                slot.publish(Some(published));
                Ok(report)
            }
            Err(err) => {
                match previous {
                    Some(published) if !published.instance.is_closed() => {
                        warn!(resource = %name, error = %err, "Reconciliation failed; keeping previous instance");
                    }
                    _ => {
                        warn!(resource = %name, error = %err, "Reconciliation failed; resource is absent");
                        slot.publish(None);
                        self.drop_slot(name, &slot);
                    }
                }
                Err(err)
            }
        }
    }

    /// Tear down `name`. Returns whether anything was published.
    pub async fn remove(&self, name: &str) -> bool {
        if !self.slots.contains_key(name) {
            return false;
        }
        let (slot, _gate) = self.lock_slot(name).await;
        let published = slot.published.write().take();
        self.drop_slot(name, &slot);
        match published {
            Some(published) => {
                self.teardown(published).await;
                true
            }
            None => false,
        }
    }

    /// Reconcile every record, then tear down published resources the snapshot omits
    pub async fn apply_snapshot<I>(&self, records: I) -> SnapshotReport
    where
        I: IntoIterator<Item = ConfigurationRecord>,
    {
        let mut report = SnapshotReport::default();
        let mut declared = HashSet::new();

        for record in records {
            declared.insert(record.resource_name.clone());
            match self.reconcile(&record).await {
                Ok(reconciled) => report.reconciled.push(reconciled),
                Err(err) => report.failed.push((record.resource_name.clone(), err)),
            }
        }

        for name in self.list_resource_names() {
            if !declared.contains(&name) && self.remove(&name).await {
                report.removed.push(name);
            }
        }

        debug!(
            reconciled = report.reconciled.len(),
            failed = report.failed.len(),
            removed = report.removed.len(),
            "Configuration snapshot applied"
        );
        report
    }

    /// Load a snapshot from `source` and apply it
    pub async fn refresh(&self, source: &dyn ConfigurationSource) -> RuntimeResult<SnapshotReport> {
        let records = source.load().await?;
        info!(source = %source.source_name(), resources = records.len(), "Configuration loaded");
        Ok(self.apply_snapshot(records).await)
    }

    /// Names of resources with a published instance
    pub fn list_resource_names(&self) -> BTreeSet<String> {
        self.slots
            .iter()
            .filter(|entry| entry.value().published.read().is_some())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Published instance of `name`
    pub fn get_instance(&self, name: &str) -> Option<Arc<ConnectorInstance>> {
        let slot = self.slots.get(name)?.value().clone();
        let published = slot.published();
        published.map(|p| p.instance)
    }

    /// Published instances whose identity passes `filter`
    pub fn find(&self, filter: &InstanceFilter) -> Vec<Arc<ConnectorInstance>> {
        let slots: Vec<Arc<ResourceSlot>> = self.slots.iter().map(|entry| entry.value().clone()).collect();
        slots
            .iter()
            .filter_map(|slot| slot.published())
            .map(|published| published.instance)
            .filter(|instance| filter.matches(&instance.identity()))
            .collect()
    }

    /// Lifecycle state of `name`
    pub fn state_of(&self, name: &str) -> ResourceState {
        match self.get_instance(name).map(|instance| instance.state()) {
            None => ResourceState::Absent,
            Some(InstanceState::Active) => ResourceState::Active,
            Some(InstanceState::Closed) => ResourceState::Closed,
        }
    }

    /// Release every instance and forget all resources
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        let mut released = 0usize;
        for name in names {
            if self.remove(&name).await {
                released += 1;
            }
        }
        info!(released, "Connector registry shut down");
    }
}

impl std::fmt::Debug for ConnectorRegistryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistryManager")
            .field("connector_types", &self.connector_types())
            .field("resources", &self.list_resource_names())
            .finish()
    }
}
