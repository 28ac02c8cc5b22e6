//! # Gantry Core
//!
//! Shared foundation for the Gantry connector runtime. Every other Gantry crate
//! depends on the pieces collected here.
//!
//! ## Features
//!
//! - **Error Handling**: the error taxonomy shared by registries, connectors and the reconciler
//! - **Configuration**: runtime settings layered from defaults, files and environment
//! - **Observability**: `tracing` subscriber bootstrap
//! - **Timing**: a countdown timer that bounds batch operations by a single budget
//!
//! ## Quick Start
//!
//! ```rust
//! use gantry_core::{GantryError, GantryResult};
//!
//! fn lookup(id: &str) -> GantryResult<u32> {
//!     Err(GantryError::not_found(id))
//! }
//!
//! assert!(lookup("cpu").unwrap_err().is_client_error());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod timer;
pub mod traits;

// Re-export commonly used items
pub use config::{InvokerKind, LoggingSettings, RuntimeSettings};
pub use error::{GantryError, GantryResult};
pub use timer::CountdownTimer;
pub use traits::Validatable;

/// Version information for the Gantry Core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the Gantry Core library
pub const NAME: &str = env!("CARGO_PKG_NAME");
