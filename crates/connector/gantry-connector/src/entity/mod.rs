//! Value types and the type-projection system.
//!
//! An [`EntityValue`] pairs an optional raw [`Value`] with its [`EntityType`].
//! Consumers ask for a [`Representation`]; the type either hands the value back
//! unchanged (it is already in that representation) or runs a registered
//! converter. A missing converter is reported as
//! [`ConnectorError::UnsupportedProjection`](crate::error::ConnectorError).

mod registry;
mod types;
mod value;
mod wellknown;

pub use registry::TypeProjectionRegistry;
pub use types::{Column, Converter, EntityType, ScalarType, Shape, ShapeKind, TableSchema};
pub use value::{Representation, TableData, Value, INDEX_COLUMN, VALUE_COLUMN};

use crate::error::ConnectorResult;
use std::borrow::Cow;

/// A raw value together with its type. The type is always present; the raw value may be null.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityValue {
    raw: Option<Value>,
    ty: EntityType,
}

impl EntityValue {
    /// Pair a possibly-null raw value with its type
    pub fn new(raw: Option<Value>, ty: EntityType) -> Self {
        Self { raw, ty }
    }

    /// A non-null value
    pub fn of(raw: impl Into<Value>, ty: EntityType) -> Self {
        Self::new(Some(raw.into()), ty)
    }

    /// A null value of type `ty`
    pub fn null(ty: EntityType) -> Self {
        Self::new(None, ty)
    }

    /// The raw value
    pub fn raw(&self) -> Option<&Value> {
        self.raw.as_ref()
    }

    /// Consume into the raw value
    pub fn into_raw(self) -> Option<Value> {
        self.raw
    }

    /// The value's type
    pub fn entity_type(&self) -> &EntityType {
        &self.ty
    }

    /// Whether the raw value is null
    pub fn is_null(&self) -> bool {
        self.raw.is_none()
    }

    /// Project to `target`. Null stays null; missing converters are an error.
    pub fn convert(&self, target: Representation) -> ConnectorResult<Option<Cow<'_, Value>>> {
        self.raw
            .as_ref()
            .map(|raw| self.ty.convert(raw, target))
            .transpose()
    }

    /// Project to text, a shortcut used by logging and simple consumers
    pub fn to_text(&self) -> ConnectorResult<Option<String>> {
        Ok(self.convert(Representation::Text)?.and_then(|v| match v.into_owned() {
            Value::Text(s) => Some(s),
            _ => None,
        }))
    }
}
