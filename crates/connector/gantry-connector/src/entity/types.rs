//! Entity types: the shape of a value plus its registered projections
//!
//! Arrays are not a nominal kind. An array type is a table type whose columns
//! are exactly `Index` and `Value`; [`Shape::is_array`] performs that structural
//! test, and code inspecting types must rely on it rather than on a tag.

use super::value::{Representation, Value, INDEX_COLUMN, VALUE_COLUMN};
use crate::error::{ConnectorError, ConnectorResult};
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Scalar element types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    /// Boolean
    Bool,
    /// Signed 64-bit integer
    Integer,
    /// 64-bit float
    Float,
    /// UTF-8 text
    Text,
    /// Opaque bytes
    Bytes,
    /// JSON document
    Json,
}

impl ScalarType {
    /// Parse a type tag such as `int64` or `string`
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Some(Self::Bool),
            "int" | "int32" | "int64" | "integer" | "long" => Some(Self::Integer),
            "float" | "float32" | "float64" | "double" => Some(Self::Float),
            "string" | "text" => Some(Self::Text),
            "bytes" | "blob" => Some(Self::Bytes),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Canonical tag
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Integer => "int64",
            Self::Float => "float64",
            Self::Text => "string",
            Self::Bytes => "bytes",
            Self::Json => "json",
        }
    }

    /// The representation values of this type natively use
    #[must_use]
    pub fn representation(self) -> Representation {
        match self {
            Self::Bool => Representation::Bool,
            Self::Integer => Representation::Integer,
            Self::Float => Representation::Float,
            Self::Text => Representation::Text,
            Self::Bytes => Representation::Bytes,
            Self::Json => Representation::Json,
        }
    }

    /// Scalar type of a value, if it is a scalar
    #[must_use]
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(_) => Some(Self::Bool),
            Value::Integer(_) => Some(Self::Integer),
            Value::Float(_) => Some(Self::Float),
            Value::Text(_) => Some(Self::Text),
            Value::Bytes(_) => Some(Self::Bytes),
            Value::Json(_) => Some(Self::Json),
            Value::Array(_) | Value::Table(_) | Value::Map(_) => None,
        }
    }
}

/// A named, typed column of a table or an item of a map
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Cell type
    pub ty: ScalarType,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Schema of a tabular type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableSchema {
    /// Columns in order
    pub columns: Vec<Column>,
    /// Names of the columns forming the row key
    pub index: Vec<String>,
}

/// The shape of a value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A single scalar
    Scalar(ScalarType),
    /// Rows of columns; arrays are tables with `Index` and `Value` columns
    Table(TableSchema),
    /// Named items
    Map(Vec<Column>),
}

/// Coarse classification used to key converters that apply to a family of shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// A particular scalar type
    Scalar(ScalarType),
    /// Any array
    Array,
    /// Any non-array table
    Table,
    /// Any map
    Map,
}

impl Shape {
    /// The array-of-`element` shape: a table keyed by `Index` with a `Value` column
    #[must_use]
    pub fn array_of(element: ScalarType) -> Self {
        Self::Table(TableSchema {
            columns: vec![
                Column::new(INDEX_COLUMN, ScalarType::Integer),
                Column::new(VALUE_COLUMN, element),
            ],
            index: vec![INDEX_COLUMN.to_string()],
        })
    }

    /// Structural array test: tabular with exactly the `Index` and `Value` columns
    #[must_use]
    pub fn is_array(&self) -> bool {
        match self {
            Self::Table(schema) => {
                schema.columns.len() == 2
                    && schema.columns.iter().any(|c| c.name == INDEX_COLUMN)
                    && schema.columns.iter().any(|c| c.name == VALUE_COLUMN)
            }
            _ => false,
        }
    }

    /// Element type of an array shape
    #[must_use]
    pub fn array_element(&self) -> Option<ScalarType> {
        match self {
            Self::Table(schema) if self.is_array() => schema
                .columns
                .iter()
                .find(|c| c.name == VALUE_COLUMN)
                .map(|c| c.ty),
            _ => None,
        }
    }

    /// Coarse kind of this shape
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Scalar(s) => ShapeKind::Scalar(*s),
            Self::Table(_) if self.is_array() => ShapeKind::Array,
            Self::Table(_) => ShapeKind::Table,
            Self::Map(_) => ShapeKind::Map,
        }
    }

    /// The representation values of this shape natively use
    #[must_use]
    pub fn native_representation(&self) -> Representation {
        match self.kind() {
            ShapeKind::Scalar(s) => s.representation(),
            ShapeKind::Array => Representation::Array,
            ShapeKind::Table => Representation::Table,
            ShapeKind::Map => Representation::Map,
        }
    }

    /// Human readable type name, e.g. `int64[]`
    #[must_use]
    pub fn type_name(&self) -> String {
        fn columns(cols: &[Column]) -> String {
            cols.iter()
                .map(|c| format!("{}:{}", c.name, c.ty.tag()))
                .collect::<Vec<_>>()
                .join(",")
        }

        match self {
            Self::Scalar(s) => s.tag().to_string(),
            Self::Table(_) if self.is_array() => {
                format!("{}[]", self.array_element().map_or("?", ScalarType::tag))
            }
            Self::Table(schema) => format!("table({})", columns(&schema.columns)),
            Self::Map(items) => format!("map({})", columns(items)),
        }
    }
}

/// Converts a value into another representation
pub trait Converter: Send + Sync {
    /// Perform the conversion
    fn convert(&self, value: &Value) -> ConnectorResult<Value>;
}

impl<F> Converter for F
where
    F: Fn(&Value) -> ConnectorResult<Value> + Send + Sync,
{
    fn convert(&self, value: &Value) -> ConnectorResult<Value> {
        self(value)
    }
}

struct TypeInner {
    name: String,
    shape: Shape,
    projections: RwLock<HashMap<Representation, Arc<dyn Converter>>>,
}

/// The type of an entity value: a shape plus the projections it supports.
///
/// Cloning is cheap and shares the projection table.
#[derive(Clone)]
pub struct EntityType {
    inner: Arc<TypeInner>,
}

impl EntityType {
    /// A type with no registered projections, named after its shape
    #[must_use]
    pub fn new(shape: Shape) -> Self {
        Self::named(shape.type_name(), shape)
    }

    /// A type with an explicit name
    pub fn named(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            inner: Arc::new(TypeInner {
                name: name.into(),
                shape,
                projections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Shape of values of this type
    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    /// Whether this is an array type (structural test)
    pub fn is_array(&self) -> bool {
        self.inner.shape.is_array()
    }

    /// Native representation of values of this type
    pub fn native_representation(&self) -> Representation {
        self.inner.shape.native_representation()
    }

    /// Register a converter to `target`; registering the same target again replaces it
    pub fn register<C>(&self, target: Representation, converter: C)
    where
        C: Converter + 'static,
    {
        self.register_shared(target, Arc::new(converter));
    }

    /// Register a closure as the converter to `target`
    pub fn register_fn<F>(&self, target: Representation, convert: F)
    where
        F: Fn(&Value) -> ConnectorResult<Value> + Send + Sync + 'static,
    {
        self.register_shared(target, Arc::new(convert));
    }

    /// Register an already shared converter
    pub fn register_shared(&self, target: Representation, converter: Arc<dyn Converter>) {
        self.inner.projections.write().insert(target, converter);
    }

    /// The converter registered for `target`, if any
    pub fn projection(&self, target: Representation) -> Option<Arc<dyn Converter>> {
        self.inner.projections.read().get(&target).cloned()
    }

    /// Representations reachable from this type, native one included
    pub fn projections(&self) -> Vec<Representation> {
        let mut targets: Vec<_> = self.inner.projections.read().keys().copied().collect();
        targets.push(self.native_representation());
        targets.sort();
        targets.dedup();
        targets
    }

    /// Whether `target` is reachable from this type
    pub fn supports(&self, target: Representation) -> bool {
        target == self.native_representation() || self.inner.projections.read().contains_key(&target)
    }

    /// Convert `value` to `target`.
    ///
    /// A value already in the target representation is returned borrowed; otherwise
    /// the registered converter runs. Missing converters are an error, never a silent null.
    pub fn convert<'a>(&self, value: &'a Value, target: Representation) -> ConnectorResult<Cow<'a, Value>> {
        if value.representation() == target {
            return Ok(Cow::Borrowed(value));
        }

        let converter = self
            .projection(target)
            .ok_or_else(|| ConnectorError::UnsupportedProjection {
                type_name: self.name().to_string(),
                target: target.to_string(),
            })?;
        converter.convert(value).map(Cow::Owned)
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.name == other.inner.name && self.inner.shape == other.inner.shape)
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.inner.name)
            .field("shape", &self.inner.shape)
            .field("projections", &self.projections())
            .finish()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_is_detected_structurally() {
        let array = Shape::array_of(ScalarType::Float);
        assert!(array.is_array());
        assert_eq!(array.array_element(), Some(ScalarType::Float));
        assert_eq!(array.type_name(), "float64[]");

        // Same columns in a different order is still an array
        let reordered = Shape::Table(TableSchema {
            columns: vec![
                Column::new(VALUE_COLUMN, ScalarType::Text),
                Column::new(INDEX_COLUMN, ScalarType::Integer),
            ],
            index: vec![],
        });
        assert!(reordered.is_array());

        // A third column breaks array-ness
        let wide = Shape::Table(TableSchema {
            columns: vec![
                Column::new(INDEX_COLUMN, ScalarType::Integer),
                Column::new(VALUE_COLUMN, ScalarType::Text),
                Column::new("Extra", ScalarType::Text),
            ],
            index: vec![],
        });
        assert!(!wide.is_array());
        assert_eq!(wide.kind(), ShapeKind::Table);
    }

    #[test]
    fn test_identity_conversion_borrows() {
        let ty = EntityType::new(Shape::Scalar(ScalarType::Integer));
        let value = Value::Integer(7);
        let converted = ty.convert(&value, Representation::Integer).unwrap();
        assert!(matches!(converted, Cow::Borrowed(_)));
    }

    #[test]
    fn test_missing_converter_is_error() {
        let ty = EntityType::new(Shape::Scalar(ScalarType::Integer));
        let err = ty.convert(&Value::Integer(7), Representation::Bytes).unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedProjection { .. }));
    }

    #[test]
    fn test_last_registration_wins_on_same_instance() {
        let ty = EntityType::new(Shape::Scalar(ScalarType::Integer));
        ty.register_fn(Representation::Text, |_| Ok(Value::from("first")));
        ty.register_fn(Representation::Text, |_| Ok(Value::from("second")));

        let converted = ty.convert(&Value::Integer(1), Representation::Text).unwrap();
        assert_eq!(converted.into_owned(), Value::from("second"));
        assert!(ty.supports(Representation::Text));
        assert_eq!(ty.projections(), vec![Representation::Integer, Representation::Text]);
    }
}
