//! Connected attributes: descriptors, the connector SPI and the registry

mod descriptor;
mod registry;

pub use descriptor::{AttributeAccess, AttributeDescriptor, AttributeDescriptorBuilder, DEFAULT_ATTRIBUTE_CLASS};
pub use registry::AttributeRegistry;

use crate::entity::{EntityValue, Value};
use crate::error::ConnectorResult;
use crate::feature::FeatureOptions;
use async_trait::async_trait;
use std::time::Duration;

/// Attribute half of the connector-module SPI.
///
/// The registry owns locking, idempotence and id bookkeeping; implementors only
/// talk to the managed resource.
#[async_trait]
pub trait AttributeSupport: Send + Sync {
    /// Discover the attribute `name`. `Ok(None)` means the resource has no such attribute.
    async fn resolve(&self, name: &str, options: &FeatureOptions) -> ConnectorResult<Option<AttributeDescriptor>>;

    /// Read the current raw value, honouring `timeout`
    async fn fetch(&self, descriptor: &AttributeDescriptor, timeout: Duration) -> ConnectorResult<Option<Value>>;

    /// Write a value, honouring `timeout`
    async fn push(&self, descriptor: &AttributeDescriptor, timeout: Duration, value: &EntityValue) -> ConnectorResult<()>;

    /// Release connector resources held for `id`. Returning `false` keeps the attribute connected.
    async fn release(&self, _id: &str, _descriptor: &AttributeDescriptor) -> bool {
        true
    }
}
