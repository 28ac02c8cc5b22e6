//! # Gantry Connector
//!
//! Building blocks every Gantry connector module is assembled from.
//!
//! ## Features
//!
//! - **Type Projection**: entity types with per-connector converter catalogs and
//!   well-known projections to text, numbers and JSON
//! - **Attributes**: a thread-safe attribute registry with timeouts, batch reads
//!   and writes, and default-value fallback
//! - **Notifications**: subscription lists, delayed listeners and pluggable
//!   dispatch (sequential or parallel)
//! - **Operations**: invocable operations with typed parameters
//! - **Field Support**: attribute support built from explicit getter/setter specs
//! - **Lifecycle**: connector instances and the factory SPI used by the runtime
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gantry_connector::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> ConnectorResult<()> {
//! let types = Arc::new(TypeProjectionRegistry::new("process"));
//! let support = FieldAttributeSupport::builder(types.clone())
//!     .field(FieldSpec::read_only("uptime", ScalarType::Integer, || Ok(Some(Value::Integer(42)))))
//!     .build();
//!
//! let instance = ConnectorInstance::builder("proc1", "process", ConnectionParameters::new("local://"), Arc::new(support))
//!     .types(types.clone())
//!     .build();
//!
//! instance.add_attribute("up", "uptime", FeatureOptions::new()).await?;
//! let default = EntityValue::null(types.scalar(ScalarType::Integer));
//! let uptime = instance.read_attribute("up", Some(Duration::from_secs(1)), default).await?;
//! assert_eq!(uptime.to_text()?, Some("42".to_string()));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod attributes;
pub mod entity;
pub mod error;
pub mod factory;
pub mod feature;
pub mod fields;
pub mod instance;
pub mod notifications;
pub mod operations;

// Re-export commonly used items
pub use error::{ConnectorError, ConnectorResult};
pub use factory::{ConnectorFactory, UpdateOutcome};
pub use feature::FeatureOptions;
pub use instance::{ConnectionParameters, ConnectorInstance, InstanceIdentity, InstanceState};

/// Version information for the Gantry Connector library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    pub use crate::attributes::{AttributeAccess, AttributeDescriptor, AttributeRegistry, AttributeSupport};
    pub use crate::entity::{EntityType, EntityValue, Representation, ScalarType, Shape, TypeProjectionRegistry, Value};
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::factory::{ConnectorFactory, UpdateOutcome};
    pub use crate::feature::FeatureOptions;
    pub use crate::fields::{FieldAttributeSupport, FieldSpec};
    pub use crate::instance::{ConnectionParameters, ConnectorInstance, InstanceIdentity, InstanceState};
    pub use crate::notifications::{
        Notification, NotificationDescriptor, NotificationListener, NotificationRegistry, NotificationSupport,
        SharedListener, SubscriptionToken,
    };
    pub use crate::operations::{OperationDescriptor, OperationImpact, OperationRegistry, OperationSupport};
    pub use gantry_core::RuntimeSettings;
}
