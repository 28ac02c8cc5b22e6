//! A live connector instance bound to one managed resource

use crate::attributes::{AttributeDescriptor, AttributeRegistry, AttributeSupport};
use crate::entity::{EntityValue, TypeProjectionRegistry};
use crate::error::{ConnectorError, ConnectorResult};
use crate::feature::FeatureOptions;
use crate::notifications::{
    invoker_for, NotificationDescriptor, NotificationInvoker, NotificationRegistry, NotificationSupport,
    SequentialInvoker, SharedListener,
};
use crate::operations::{OperationDescriptor, OperationRegistry, OperationSupport};
use gantry_core::config::DEFAULT_TIMEOUT_MS;
use gantry_core::RuntimeSettings;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock as LifecycleLock, RwLockReadGuard};
use tracing::info;

/// Connection string plus free-form parameters of one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParameters {
    /// Connector-specific address of the resource
    pub connection_string: String,
    /// Additional parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ConnectionParameters {
    /// Parameters with an empty map
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// Discovery tuple attached to every published instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceIdentity {
    /// Unique resource name
    pub resource_name: String,
    /// Connector type tag
    pub connector_type: String,
    /// Connection string the instance was last configured with
    pub connection_string: String,
}

/// Lifecycle state of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Serving calls
    Active,
    /// Terminal; every call fails fast
    Closed,
}

/// One attribute registry, optional notification and operation registries, and
/// the current connection parameters of a resource.
///
/// Once [`close`](Self::close) has run, every feature call returns
/// [`ConnectorError::Closed`]. Calls taking an `Option<Duration>` fall back to
/// the instance's default timeout; a feature's own timeout option shortens either.
pub struct ConnectorInstance {
    resource_name: String,
    connector_type: String,
    parameters: RwLock<Arc<ConnectionParameters>>,
    types: Arc<TypeProjectionRegistry>,
    attributes: AttributeRegistry,
    notifications: Option<NotificationRegistry>,
    operations: Option<OperationRegistry>,
    default_timeout: Duration,
    /// Held shared by calls that add features, exclusively by `close`
    lifecycle: LifecycleLock<()>,
    closed: AtomicBool,
}

impl ConnectorInstance {
    /// Start building an instance
    pub fn builder(
        resource_name: impl Into<String>,
        connector_type: impl Into<String>,
        parameters: ConnectionParameters,
        attributes: Arc<dyn AttributeSupport>,
    ) -> ConnectorInstanceBuilder {
        ConnectorInstanceBuilder {
            resource_name: resource_name.into(),
            connector_type: connector_type.into(),
            parameters,
            attributes,
            notifications: None,
            invoker: Arc::new(SequentialInvoker),
            operations: None,
            types: None,
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Resource name
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Connector type tag
    pub fn connector_type(&self) -> &str {
        &self.connector_type
    }

    /// Discovery tuple
    pub fn identity(&self) -> InstanceIdentity {
        InstanceIdentity {
            resource_name: self.resource_name.clone(),
            connector_type: self.connector_type.clone(),
            connection_string: self.parameters.read().connection_string.clone(),
        }
    }

    /// Current connection parameter snapshot
    pub fn parameters(&self) -> Arc<ConnectionParameters> {
        self.parameters.read().clone()
    }

    /// Replace the parameter snapshot, as an in-place update does
    pub fn update_parameters(&self, parameters: ConnectionParameters) -> ConnectorResult<()> {
        self.ensure_open()?;
        *self.parameters.write() = Arc::new(parameters);
        Ok(())
    }

    /// Type catalog of this instance
    pub fn types(&self) -> &Arc<TypeProjectionRegistry> {
        &self.types
    }

    /// Timeout used when a call passes none
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Lifecycle state
    pub fn state(&self) -> InstanceState {
        if self.is_closed() {
            InstanceState::Closed
        } else {
            InstanceState::Active
        }
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> ConnectorResult<()> {
        if self.is_closed() {
            Err(ConnectorError::Closed(self.resource_name.clone()))
        } else {
            Ok(())
        }
    }

    /// Keeps `close` out until the guard drops
    async fn open_guard(&self) -> ConnectorResult<RwLockReadGuard<'_, ()>> {
        let guard = self.lifecycle.read().await;
        self.ensure_open()?;
        Ok(guard)
    }

    /// Non-blocking [`open_guard`](Self::open_guard) for the synchronous notification paths.
    /// A `close` in progress counts as closed.
    fn try_open_guard(&self) -> ConnectorResult<RwLockReadGuard<'_, ()>> {
        let guard = self
            .lifecycle
            .try_read()
            .map_err(|_| ConnectorError::Closed(self.resource_name.clone()))?;
        self.ensure_open()?;
        Ok(guard)
    }

    fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.default_timeout)
    }

    // Attributes

    /// Connect an attribute; idempotent per id
    pub async fn add_attribute(
        &self,
        id: &str,
        name: &str,
        options: FeatureOptions,
    ) -> ConnectorResult<Option<Arc<AttributeDescriptor>>> {
        let _open = self.open_guard().await?;
        self.attributes.connect(id, name, options).await
    }

    /// Disconnect an attribute
    pub async fn remove_attribute(&self, id: &str) -> ConnectorResult<bool> {
        self.ensure_open()?;
        Ok(self.attributes.disconnect(id).await)
    }

    /// Read one attribute, `default` when unknown
    pub async fn read_attribute(
        &self,
        id: &str,
        timeout: Option<Duration>,
        default: EntityValue,
    ) -> ConnectorResult<EntityValue> {
        self.ensure_open()?;
        self.attributes.read(id, self.timeout_or_default(timeout), default).await
    }

    /// Read many attributes; see [`AttributeRegistry::read_batch`]
    pub async fn read_attributes(
        &self,
        values: &mut HashMap<String, EntityValue>,
        timeout: Option<Duration>,
    ) -> ConnectorResult<HashSet<String>> {
        self.ensure_open()?;
        Ok(self.attributes.read_batch(values, self.timeout_or_default(timeout)).await)
    }

    /// Write one attribute; `false` when unknown or read-only
    pub async fn write_attribute(&self, id: &str, timeout: Option<Duration>, value: EntityValue) -> ConnectorResult<bool> {
        self.ensure_open()?;
        self.attributes.write(id, self.timeout_or_default(timeout), value).await
    }

    /// Write many attributes; see [`AttributeRegistry::write_batch`]
    pub async fn write_attributes(
        &self,
        values: &HashMap<String, EntityValue>,
        timeout: Option<Duration>,
    ) -> ConnectorResult<bool> {
        self.ensure_open()?;
        Ok(self.attributes.write_batch(values, self.timeout_or_default(timeout)).await)
    }

    /// Descriptor of a connected attribute
    pub async fn attribute(&self, id: &str) -> Option<Arc<AttributeDescriptor>> {
        self.attributes.get(id).await
    }

    /// Connected attribute ids
    pub async fn attribute_ids(&self) -> BTreeSet<String> {
        self.attributes.list().await
    }

    /// Disconnect attributes not in `keep`
    pub async fn retain_attributes(&self, keep: &HashSet<String>) -> ConnectorResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.attributes.retain(keep).await)
    }

    // Notifications

    fn notification_registry(&self) -> ConnectorResult<&NotificationRegistry> {
        self.notifications
            .as_ref()
            .ok_or_else(|| ConnectorError::Unsupported(format!("'{}' emits no notifications", self.resource_name)))
    }

    /// Enable a notification category under `list_id`
    pub fn enable_notifications(
        &self,
        list_id: &str,
        category: &str,
        options: FeatureOptions,
    ) -> ConnectorResult<Option<Arc<NotificationDescriptor>>> {
        let _open = self.try_open_guard()?;
        self.notification_registry()?.enable(list_id, category, options)
    }

    /// Disable a notification list; `false` when it was not enabled
    pub fn disable_notifications(&self, list_id: &str) -> ConnectorResult<bool> {
        self.ensure_open()?;
        match &self.notifications {
            Some(registry) => registry.disable(list_id),
            None => Ok(false),
        }
    }

    /// Subscribe a listener; `false` when the instance emits no notifications
    pub fn subscribe(&self, listener_id: &str, listener: SharedListener, delayed: bool) -> ConnectorResult<bool> {
        let _open = self.try_open_guard()?;
        match &self.notifications {
            Some(registry) => registry.subscribe(listener_id, listener, delayed),
            None => Ok(false),
        }
    }

    /// Unsubscribe a listener
    pub fn unsubscribe(&self, listener_id: &str) -> ConnectorResult<bool> {
        self.ensure_open()?;
        Ok(self
            .notifications
            .as_ref()
            .is_some_and(|registry| registry.unsubscribe(listener_id)))
    }

    /// Descriptor of an enabled notification list
    pub fn notification(&self, list_id: &str) -> Option<Arc<NotificationDescriptor>> {
        self.notifications.as_ref().and_then(|registry| registry.get(list_id))
    }

    /// Enabled notification list ids
    pub fn notification_lists(&self) -> BTreeSet<String> {
        self.notifications.as_ref().map(NotificationRegistry::list).unwrap_or_default()
    }

    /// The notification registry, for connectors emitting events
    pub fn notifications(&self) -> Option<&NotificationRegistry> {
        self.notifications.as_ref()
    }

    /// Disable notification lists not in `keep`
    pub fn retain_notifications(&self, keep: &HashSet<String>) -> ConnectorResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self
            .notifications
            .as_ref()
            .map(|registry| registry.retain(keep))
            .unwrap_or_default())
    }

    // Operations

    fn operation_registry(&self) -> ConnectorResult<&OperationRegistry> {
        self.operations
            .as_ref()
            .ok_or_else(|| ConnectorError::Unsupported(format!("'{}' exposes no operations", self.resource_name)))
    }

    /// Enable an operation; idempotent per id
    pub async fn enable_operation(
        &self,
        id: &str,
        name: &str,
        options: FeatureOptions,
    ) -> ConnectorResult<Option<Arc<OperationDescriptor>>> {
        let _open = self.open_guard().await?;
        self.operation_registry()?.enable(id, name, options).await
    }

    /// Disable an operation
    pub async fn disable_operation(&self, id: &str) -> ConnectorResult<bool> {
        self.ensure_open()?;
        match &self.operations {
            Some(registry) => Ok(registry.disable(id).await),
            None => Ok(false),
        }
    }

    /// Invoke an enabled operation
    pub async fn invoke_operation(
        &self,
        id: &str,
        arguments: &[EntityValue],
        timeout: Option<Duration>,
    ) -> ConnectorResult<Option<EntityValue>> {
        self.ensure_open()?;
        let timeout = self.timeout_or_default(timeout);
        self.operation_registry()?.invoke(id, arguments, timeout).await
    }

    /// Enabled operation ids
    pub async fn operation_ids(&self) -> BTreeSet<String> {
        match &self.operations {
            Some(registry) => registry.list().await,
            None => BTreeSet::new(),
        }
    }

    /// Disable operations not in `keep`
    pub async fn retain_operations(&self, keep: &HashSet<String>) -> ConnectorResult<Vec<String>> {
        self.ensure_open()?;
        match &self.operations {
            Some(registry) => Ok(registry.retain(keep).await),
            None => Ok(Vec::new()),
        }
    }

    /// Clear every registry and enter the terminal state. Idempotent.
    ///
    /// Waits for feature additions already in flight, so nothing is added after the clear.
    pub async fn close(&self) {
        let _exclusive = self.lifecycle.write().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let attributes = self.attributes.clear().await;
        let notifications = self.notifications.as_ref().map_or(0, NotificationRegistry::clear);
        let operations = match &self.operations {
            Some(registry) => registry.clear().await,
            None => 0,
        };
        info!(
            resource = %self.resource_name,
            attributes,
            notifications,
            operations,
            "Connector instance closed"
        );
    }
}

impl std::fmt::Debug for ConnectorInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorInstance")
            .field("resource_name", &self.resource_name)
            .field("connector_type", &self.connector_type)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ConnectorInstance`]
pub struct ConnectorInstanceBuilder {
    resource_name: String,
    connector_type: String,
    parameters: ConnectionParameters,
    attributes: Arc<dyn AttributeSupport>,
    notifications: Option<Arc<dyn NotificationSupport>>,
    invoker: Arc<dyn NotificationInvoker>,
    operations: Option<Arc<dyn OperationSupport>>,
    types: Option<Arc<TypeProjectionRegistry>>,
    default_timeout: Duration,
}

impl ConnectorInstanceBuilder {
    /// Enable notification support
    #[must_use]
    pub fn notifications(mut self, support: Arc<dyn NotificationSupport>) -> Self {
        self.notifications = Some(support);
        self
    }

    /// Dispatch strategy for notifications (default sequential)
    #[must_use]
    pub fn invoker(mut self, invoker: Arc<dyn NotificationInvoker>) -> Self {
        self.invoker = invoker;
        self
    }

    /// Enable operation support
    #[must_use]
    pub fn operations(mut self, support: Arc<dyn OperationSupport>) -> Self {
        self.operations = Some(support);
        self
    }

    /// Share a type catalog; a fresh one for the connector type is created otherwise
    #[must_use]
    pub fn types(mut self, types: Arc<TypeProjectionRegistry>) -> Self {
        self.types = Some(types);
        self
    }

    /// Timeout used when a call passes none
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Take the default timeout and the notification dispatch strategy from `settings`
    #[must_use]
    pub fn settings(self, settings: &RuntimeSettings) -> Self {
        self.default_timeout(settings.default_timeout())
            .invoker(invoker_for(settings.invoker, settings.invoker_parallelism))
    }

    /// Finish the instance in the `Active` state
    pub fn build(self) -> ConnectorInstance {
        let types = self
            .types
            .unwrap_or_else(|| Arc::new(TypeProjectionRegistry::new(self.connector_type.clone())));
        let attributes = AttributeRegistry::new(self.resource_name.clone(), self.attributes, types.clone());
        let notifications = self
            .notifications
            .map(|support| NotificationRegistry::new(self.resource_name.clone(), support, self.invoker));
        let operations = self
            .operations
            .map(|support| OperationRegistry::new(self.resource_name.clone(), support));

        ConnectorInstance {
            resource_name: self.resource_name,
            connector_type: self.connector_type,
            parameters: RwLock::new(Arc::new(self.parameters)),
            types,
            attributes,
            notifications,
            operations,
            default_timeout: self.default_timeout,
            lifecycle: LifecycleLock::new(()),
            closed: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ScalarType, Value};
    use crate::fields::{FieldAttributeSupport, FieldSpec};

    fn instance() -> ConnectorInstance {
        let types = Arc::new(TypeProjectionRegistry::new("process"));
        let support = FieldAttributeSupport::builder(types.clone())
            .field(FieldSpec::read_only("uptime", ScalarType::Integer, || Ok(Some(Value::Integer(7)))))
            .build();
        ConnectorInstance::builder(
            "proc1",
            "process",
            ConnectionParameters::new("local://self").with("pid", "1"),
            Arc::new(support),
        )
        .types(types)
        .build()
    }

    #[tokio::test]
    async fn test_identity_and_parameters() {
        let instance = instance();
        let identity = instance.identity();
        assert_eq!(identity.resource_name, "proc1");
        assert_eq!(identity.connector_type, "process");
        assert_eq!(identity.connection_string, "local://self");
        assert_eq!(instance.parameters().get("pid"), Some("1"));

        instance
            .update_parameters(ConnectionParameters::new("local://other"))
            .unwrap();
        assert_eq!(instance.identity().connection_string, "local://other");
    }

    #[tokio::test]
    async fn test_missing_registries() {
        let instance = instance();
        let err = instance
            .enable_notifications("l1", "alarm", FeatureOptions::new())
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Unsupported(_)));
        assert!(!instance
            .subscribe("x", Arc::new(|_: &crate::notifications::Notification| {}), false)
            .unwrap());
        assert!(instance.enable_operation("op", "op", FeatureOptions::new()).await.is_err());
        assert!(instance.operation_ids().await.is_empty());
    }

    struct SlowResolve {
        released: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AttributeSupport for SlowResolve {
        async fn resolve(&self, name: &str, options: &FeatureOptions) -> ConnectorResult<Option<AttributeDescriptor>> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(Some(AttributeDescriptor::builder(name).options(options.clone()).build()))
        }

        async fn fetch(&self, _descriptor: &AttributeDescriptor, _timeout: Duration) -> ConnectorResult<Option<Value>> {
            Ok(None)
        }

        async fn push(&self, _descriptor: &AttributeDescriptor, _timeout: Duration, _value: &EntityValue) -> ConnectorResult<()> {
            Ok(())
        }

        async fn release(&self, _id: &str, _descriptor: &AttributeDescriptor) -> bool {
            self.released.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn test_close_waits_for_attribute_in_flight() {
        let support = Arc::new(SlowResolve {
            released: std::sync::atomic::AtomicUsize::new(0),
        });
        let instance = Arc::new(
            ConnectorInstance::builder("proc1", "process", ConnectionParameters::new("local://"), support.clone()).build(),
        );

        let adding = {
            let instance = instance.clone();
            tokio::spawn(async move { instance.add_attribute("cpu", "cpu", FeatureOptions::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        instance.close().await;

        assert!(adding.await.unwrap().unwrap().is_some());
        assert!(instance.attribute_ids().await.is_empty());
        assert_eq!(support.released.load(Ordering::SeqCst), 1);

        let err = instance.add_attribute("mem", "mem", FeatureOptions::new()).await.unwrap_err();
        assert_eq!(err, ConnectorError::Closed("proc1".to_string()));
        assert!(instance
            .enable_notifications("l1", "alarm", FeatureOptions::new())
            .is_err());
    }

    #[tokio::test]
    async fn test_settings_configure_instance() {
        let settings = RuntimeSettings {
            default_timeout_ms: 250,
            invoker: gantry_core::InvokerKind::Parallel,
            ..RuntimeSettings::default()
        };
        let types = Arc::new(TypeProjectionRegistry::new("process"));
        let support = FieldAttributeSupport::builder(types.clone()).build();
        let instance = ConnectorInstance::builder("proc1", "process", ConnectionParameters::new("local://"), Arc::new(support))
            .settings(&settings)
            .build();
        assert_eq!(instance.default_timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_closed_instance_fails_fast() {
        let instance = instance();
        instance.add_attribute("up", "uptime", FeatureOptions::new()).await.unwrap();
        assert_eq!(instance.state(), InstanceState::Active);

        instance.close().await;
        instance.close().await;
        assert_eq!(instance.state(), InstanceState::Closed);
        assert!(instance.attribute_ids().await.is_empty());

        let default = EntityValue::null(instance.types().scalar(ScalarType::Integer));
        let err = instance
            .read_attribute("up", Some(Duration::from_secs(1)), default)
            .await
            .unwrap_err();
        assert_eq!(err, ConnectorError::Closed("proc1".to_string()));
        assert!(instance.update_parameters(ConnectionParameters::default()).is_err());
    }
}
