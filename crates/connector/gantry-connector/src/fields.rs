//! Attribute support built from explicit field specs.
//!
//! Connectors exposing in-process state list their fields up front: a name, a
//! scalar type, a getter and an optional setter. Resolution is by field name and
//! values are coerced to the declared type on the way in and out.
//!
//! ```rust
//! use gantry_connector::entity::{ScalarType, TypeProjectionRegistry, Value};
//! use gantry_connector::fields::{FieldAttributeSupport, FieldSpec};
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::Arc;
//!
//! let hits = Arc::new(AtomicI64::new(0));
//! let reader = hits.clone();
//! let support = FieldAttributeSupport::builder(Arc::new(TypeProjectionRegistry::new("process")))
//!     .field(FieldSpec::read_only("hits", ScalarType::Integer, move || {
//!         Ok(Some(Value::Integer(reader.load(Ordering::Relaxed))))
//!     }))
//!     .build();
//! assert!(support.field_names().contains(&"hits".to_string()));
//! ```

use crate::attributes::{AttributeAccess, AttributeDescriptor, AttributeSupport};
use crate::entity::{EntityValue, ScalarType, TypeProjectionRegistry, Value};
use crate::error::{ConnectorError, ConnectorResult};
use crate::feature::FeatureOptions;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Descriptor class of attributes resolved from field specs
pub const FIELD_ATTRIBUTE_CLASS: &str = "field";

type Getter = Arc<dyn Fn() -> ConnectorResult<Option<Value>> + Send + Sync>;
type Setter = Arc<dyn Fn(Value) -> ConnectorResult<()> + Send + Sync>;

/// One exposed field
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    ty: ScalarType,
    description: String,
    cacheable: bool,
    getter: Getter,
    setter: Option<Setter>,
}

impl FieldSpec {
    /// Field that can only be read
    pub fn read_only<G>(name: impl Into<String>, ty: ScalarType, getter: G) -> Self
    where
        G: Fn() -> ConnectorResult<Option<Value>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
            cacheable: false,
            getter: Arc::new(getter),
            setter: None,
        }
    }

    /// Field that can be read and written
    pub fn read_write<G, S>(name: impl Into<String>, ty: ScalarType, getter: G, setter: S) -> Self
    where
        G: Fn() -> ConnectorResult<Option<Value>> + Send + Sync + 'static,
        S: Fn(Value) -> ConnectorResult<()> + Send + Sync + 'static,
    {
        Self {
            setter: Some(Arc::new(setter)),
            ..Self::read_only(name, ty, getter)
        }
    }

    /// Set the description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Allow consumers to cache reads
    #[must_use]
    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    fn access(&self) -> AttributeAccess {
        if self.setter.is_some() {
            AttributeAccess::ReadWrite
        } else {
            AttributeAccess::Read
        }
    }
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

/// Builder for [`FieldAttributeSupport`]
pub struct FieldAttributeSupportBuilder {
    types: Arc<TypeProjectionRegistry>,
    fields: HashMap<String, FieldSpec>,
}

impl FieldAttributeSupportBuilder {
    /// Add a field; a later spec with the same name replaces the earlier one
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.insert(spec.name.clone(), spec);
        self
    }

    /// Finish
    pub fn build(self) -> FieldAttributeSupport {
        FieldAttributeSupport {
            types: self.types,
            fields: self.fields,
        }
    }
}

/// [`AttributeSupport`] over a fixed set of field specs
pub struct FieldAttributeSupport {
    types: Arc<TypeProjectionRegistry>,
    fields: HashMap<String, FieldSpec>,
}

impl FieldAttributeSupport {
    /// Start a builder typing values through `types`
    pub fn builder(types: Arc<TypeProjectionRegistry>) -> FieldAttributeSupportBuilder {
        FieldAttributeSupportBuilder {
            types,
            fields: HashMap::new(),
        }
    }

    /// Declared field names, sorted
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    fn field(&self, descriptor: &AttributeDescriptor) -> ConnectorResult<&FieldSpec> {
        self.fields
            .get(descriptor.name())
            .ok_or_else(|| ConnectorError::not_found(format!("field '{}'", descriptor.name())))
    }
}

#[async_trait]
impl AttributeSupport for FieldAttributeSupport {
    async fn resolve(&self, name: &str, options: &FeatureOptions) -> ConnectorResult<Option<AttributeDescriptor>> {
        let Some(spec) = self.fields.get(name) else {
            return Ok(None);
        };
        let descriptor = AttributeDescriptor::builder(name)
            .description(spec.description.clone())
            .access(spec.access())
            .cacheable(spec.cacheable)
            .options(options.clone())
            .class(FIELD_ATTRIBUTE_CLASS)
            .entity_type(self.types.scalar(spec.ty))
            .build();
        Ok(Some(descriptor))
    }

    async fn fetch(&self, descriptor: &AttributeDescriptor, _timeout: Duration) -> ConnectorResult<Option<Value>> {
        let spec = self.field(descriptor)?;
        let Some(raw) = (spec.getter)()? else {
            return Ok(None);
        };
        if ScalarType::of(&raw) == Some(spec.ty) {
            return Ok(Some(raw));
        }
        let detected = self.types.detect_value(&raw);
        let value = EntityValue::new(Some(raw), detected);
        coerce(&value, spec.ty).map(Some)
    }

    async fn push(&self, descriptor: &AttributeDescriptor, _timeout: Duration, value: &EntityValue) -> ConnectorResult<()> {
        let spec = self.field(descriptor)?;
        let setter = spec
            .setter
            .as_ref()
            .ok_or_else(|| ConnectorError::Unsupported(format!("field '{}' is read-only", spec.name)))?;
        setter(coerce(value, spec.ty)?)
    }
}

fn coerce(value: &EntityValue, ty: ScalarType) -> ConnectorResult<Value> {
    value
        .convert(ty.representation())?
        .map(|converted| converted.into_owned())
        .ok_or_else(|| ConnectorError::invalid_value("null cannot be assigned to a field"))
}

impl std::fmt::Debug for FieldAttributeSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAttributeSupport")
            .field("fields", &self.field_names())
            .finish()
    }
}
