//! # Gantry Runtime
//!
//! Keeps live connector instances in agreement with configuration.
//!
//! ## Features
//!
//! - **Reconciliation**: create, update in place, or recreate an instance when
//!   its connection settings change, gated by an order-independent fingerprint
//! - **Feature Sync**: declared attributes, notification lists and operations are
//!   re-applied on every pass and undeclared ones removed
//! - **Registry**: one published instance per resource name, with discovery by
//!   connector type and connection string
//! - **Sources**: full configuration snapshots from TOML/JSON files or memory
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gantry_runtime::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo(factory: Arc<dyn gantry_connector::ConnectorFactory>) -> RuntimeResult<()> {
//! let manager = ConnectorRegistryManager::new().with_factory(factory);
//! let source = FileConfigurationSource::new("/etc/gantry/resources.toml");
//!
//! let report = manager.refresh(&source).await?;
//! for failed in &report.failed {
//!     eprintln!("{} failed: {}", failed.0, failed.1);
//! }
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod hash;
pub mod manager;
pub mod reconciler;
pub mod record;
pub mod source;

// Re-export commonly used items
pub use error::{RuntimeError, RuntimeResult};
pub use hash::ConfigurationHash;
pub use manager::{ConnectorRegistryManager, InstanceFilter, ResourceState, SnapshotReport};
pub use reconciler::{ConnectorReconciler, FeatureFailure, FeatureKind, Published, ReconcileAction, ReconcileReport};
pub use record::{AttributeConfig, ConfigurationRecord, EventConfig, OperationConfig};
pub use source::{ConfigurationSource, FileConfigurationSource, StaticConfigurationSource};

/// Version information for the Gantry Runtime library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{RuntimeError, RuntimeResult};
    pub use crate::manager::{ConnectorRegistryManager, InstanceFilter, ResourceState};
    pub use crate::reconciler::{ReconcileAction, ReconcileReport};
    pub use crate::record::ConfigurationRecord;
    pub use crate::source::{ConfigurationSource, FileConfigurationSource, StaticConfigurationSource};
}
