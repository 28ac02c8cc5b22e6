//! Core traits shared by Gantry components.

use crate::GantryResult;

/// Trait for validatable objects
pub trait Validatable {
    /// Validate this object
    fn validate(&self) -> GantryResult<()>;

    /// Check if this object is valid
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
