//! Enabled operations: descriptors, the connector SPI and the registry.
//!
//! Operations follow the attribute model (idempotent enable per id, release
//! must succeed before removal) but an invocation has no default value to fall
//! back to, so an unknown id is a typed [`ConnectorError::NotFound`].

use crate::entity::{EntityValue, ScalarType};
use crate::error::{ConnectorError, ConnectorResult};
use crate::feature::{within, FeatureOptions, DESCRIPTION_OPTION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// What invoking an operation does to the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationImpact {
    /// Read-only, returns information
    Info,
    /// Changes resource state
    Action,
    /// Changes state and returns information
    ActionInfo,
    /// Not declared
    #[default]
    Unknown,
}

/// One formal parameter of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Parameter name
    pub name: String,
    /// Expected scalar type
    pub ty: ScalarType,
    /// Whether the caller may omit it
    pub optional: bool,
}

impl ParameterDescriptor {
    /// Required parameter
    pub fn required(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
        }
    }

    /// Optional parameter
    pub fn optional(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, ty)
        }
    }
}

/// Metadata of one enabled operation
pub struct OperationDescriptor {
    id: String,
    name: String,
    description: String,
    parameters: Vec<ParameterDescriptor>,
    return_type: Option<ScalarType>,
    impact: OperationImpact,
    options: FeatureOptions,
    extension: Option<Arc<dyn Any + Send + Sync>>,
}

impl OperationDescriptor {
    /// Descriptor for the connector-side operation `name`
    pub fn new(name: impl Into<String>, options: FeatureOptions) -> Self {
        let description = options.get(DESCRIPTION_OPTION).unwrap_or_default().to_string();
        Self {
            id: String::new(),
            name: name.into(),
            description,
            parameters: Vec::new(),
            return_type: None,
            impact: OperationImpact::Unknown,
            options,
            extension: None,
        }
    }

    /// Append a formal parameter
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declare the return type
    #[must_use]
    pub fn with_return_type(mut self, ty: ScalarType) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Declare the impact
    #[must_use]
    pub fn with_impact(mut self, impact: OperationImpact) -> Self {
        self.impact = impact;
        self
    }

    /// Override the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach a connector-specific payload
    #[must_use]
    pub fn with_extension<T: Any + Send + Sync>(mut self, extension: T) -> Self {
        self.extension = Some(Arc::new(extension));
        self
    }

    fn bind(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Id the operation is enabled under
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Connector-side name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Formal parameters
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Return type, `None` for no result
    pub fn return_type(&self) -> Option<ScalarType> {
        self.return_type
    }

    /// Impact
    pub fn impact(&self) -> OperationImpact {
        self.impact
    }

    /// Options it was enabled with
    pub fn options(&self) -> &FeatureOptions {
        &self.options
    }

    /// Connector-specific payload
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extension.as_deref().and_then(|ext| ext.downcast_ref::<T>())
    }

    /// Check argument count against the formal parameters
    pub fn check_arity(&self, arguments: &[EntityValue]) -> ConnectorResult<()> {
        let required = self.parameters.iter().filter(|p| !p.optional).count();
        let total = self.parameters.len();
        if arguments.len() < required || arguments.len() > total {
            return Err(ConnectorError::InvalidInput(format!(
                "operation '{}' takes {}..={} arguments, got {}",
                self.name,
                required,
                total,
                arguments.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .field("impact", &self.impact)
            .finish_non_exhaustive()
    }
}

/// Operation half of the connector-module SPI
#[async_trait]
pub trait OperationSupport: Send + Sync {
    /// Discover the operation `name`. `Ok(None)` means the resource has no such operation.
    async fn resolve(&self, name: &str, options: &FeatureOptions) -> ConnectorResult<Option<OperationDescriptor>>;

    /// Run the operation
    async fn invoke(
        &self,
        descriptor: &OperationDescriptor,
        arguments: &[EntityValue],
        timeout: Duration,
    ) -> ConnectorResult<Option<EntityValue>>;

    /// Release connector resources held for `id`. Returning `false` keeps it enabled.
    async fn release(&self, _id: &str, _descriptor: &OperationDescriptor) -> bool {
        true
    }
}

/// Thread-safe map from operation id to enabled descriptor
pub struct OperationRegistry {
    resource_name: String,
    support: Arc<dyn OperationSupport>,
    operations: RwLock<HashMap<String, Arc<OperationDescriptor>>>,
}

impl OperationRegistry {
    /// Empty registry backed by `support`
    pub fn new(resource_name: impl Into<String>, support: Arc<dyn OperationSupport>) -> Self {
        Self {
            resource_name: resource_name.into(),
            support,
            operations: RwLock::new(HashMap::new()),
        }
    }

    /// Enable operation `name` under `id`; idempotent per id
    pub async fn enable(
        &self,
        id: &str,
        name: &str,
        options: FeatureOptions,
    ) -> ConnectorResult<Option<Arc<OperationDescriptor>>> {
        if id.is_empty() {
            return Err(ConnectorError::InvalidInput("operation id must not be empty".into()));
        }

        let mut operations = self.operations.write().await;
        if let Some(existing) = operations.get(id) {
            return Ok(Some(existing.clone()));
        }
        let Some(descriptor) = self.support.resolve(name, &options).await? else {
            debug!(resource = %self.resource_name, operation = %id, name = %name, "Operation not resolved");
            return Ok(None);
        };
        let descriptor = Arc::new(descriptor.bind(id));
        operations.insert(id.to_string(), descriptor.clone());
        info!(resource = %self.resource_name, operation = %id, name = %name, "Operation enabled");
        Ok(Some(descriptor))
    }

    /// Invoke `id`. Unknown ids and arity mismatches fail typed.
    pub async fn invoke(
        &self,
        id: &str,
        arguments: &[EntityValue],
        timeout: Duration,
    ) -> ConnectorResult<Option<EntityValue>> {
        let operations = self.operations.read().await;
        let descriptor = operations
            .get(id)
            .ok_or_else(|| ConnectorError::not_found(format!("operation '{id}'")))?;
        descriptor.check_arity(arguments)?;
        let timeout = descriptor.options().bound_timeout(timeout);
        let call = self.support.invoke(descriptor, arguments, timeout);
        within(timeout, || format!("invocation of '{id}'"), call).await
    }

    /// Disable `id`; it stays enabled if the connector refuses the release
    pub async fn disable(&self, id: &str) -> bool {
        let mut operations = self.operations.write().await;
        let Some(descriptor) = operations.get(id).cloned() else {
            return false;
        };
        if !self.support.release(id, &descriptor).await {
            warn!(resource = %self.resource_name, operation = %id, "Connector refused to release operation");
            return false;
        }
        operations.remove(id);
        info!(resource = %self.resource_name, operation = %id, "Operation disabled");
        true
    }

    /// Disable every operation not in `keep`. Returns the removed ids.
    pub async fn retain(&self, keep: &HashSet<String>) -> Vec<String> {
        let stale: Vec<String> = self.list().await.into_iter().filter(|id| !keep.contains(id)).collect();
        let mut removed = Vec::with_capacity(stale.len());
        for id in stale {
            if self.disable(&id).await {
                removed.push(id);
            }
        }
        removed
    }

    /// Descriptor of `id`, if enabled
    pub async fn get(&self, id: &str) -> Option<Arc<OperationDescriptor>> {
        self.operations.read().await.get(id).cloned()
    }

    /// Snapshot of enabled ids
    pub async fn list(&self) -> BTreeSet<String> {
        self.operations.read().await.keys().cloned().collect()
    }

    /// Remove everything; releases are attempted but do not block removal
    pub async fn clear(&self) -> usize {
        let mut operations = self.operations.write().await;
        for (id, descriptor) in operations.iter() {
            if !self.support.release(id, descriptor).await {
                debug!(resource = %self.resource_name, operation = %id, "Release refused during clear");
            }
        }
        let removed = operations.len();
        operations.clear();
        removed
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("resource_name", &self.resource_name)
            .finish_non_exhaustive()
    }
}
