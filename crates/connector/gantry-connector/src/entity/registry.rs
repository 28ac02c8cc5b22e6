//! Per-connector-type catalog of entity types and converters

use super::types::{Column, Converter, EntityType, ScalarType, Shape, ShapeKind, TableSchema};
use super::value::{Representation, Value};
use super::wellknown;
use super::EntityValue;
use crate::error::ConnectorResult;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

struct Extension {
    kind: ShapeKind,
    target: Representation,
    converter: Arc<dyn Converter>,
}

/// Catalog of value converters for one connector type.
///
/// Every [`EntityType`] handed out starts with the well-known projections, then
/// receives the connector-specific converters registered here. Types are cached
/// per shape, so the same shape always maps to the same type instance.
pub struct TypeProjectionRegistry {
    connector_type: String,
    extensions: RwLock<Vec<Extension>>,
    types: RwLock<HashMap<Shape, EntityType>>,
}

impl TypeProjectionRegistry {
    /// Empty catalog for `connector_type`
    pub fn new(connector_type: impl Into<String>) -> Self {
        Self {
            connector_type: connector_type.into(),
            extensions: RwLock::new(Vec::new()),
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Connector type this catalog belongs to
    pub fn connector_type(&self) -> &str {
        &self.connector_type
    }

    /// Append a converter for every type of `kind`, including types already handed out
    pub fn register<C>(&self, kind: ShapeKind, target: Representation, converter: C)
    where
        C: Converter + 'static,
    {
        let converter: Arc<dyn Converter> = Arc::new(converter);
        self.extensions.write().push(Extension {
            kind,
            target,
            converter: converter.clone(),
        });
        for ty in self.types.read().values().filter(|ty| ty.shape().kind() == kind) {
            ty.register_shared(target, converter.clone());
        }
    }

    /// Append a closure converter for every type of `kind`
    pub fn register_fn<F>(&self, kind: ShapeKind, target: Representation, convert: F)
    where
        F: Fn(&Value) -> ConnectorResult<Value> + Send + Sync + 'static,
    {
        self.register(kind, target, convert);
    }

    /// Most recently registered connector converter for `kind` and `target`
    pub fn projection(&self, kind: ShapeKind, target: Representation) -> Option<Arc<dyn Converter>> {
        self.extensions
            .read()
            .iter()
            .rev()
            .find(|ext| ext.kind == kind && ext.target == target)
            .map(|ext| ext.converter.clone())
    }

    /// The cached type for `shape`, built on first request
    pub fn entity_type(&self, shape: Shape) -> EntityType {
        if let Some(ty) = self.types.read().get(&shape) {
            return ty.clone();
        }

        let mut types = self.types.write();
        types
            .entry(shape)
            .or_insert_with_key(|shape| {
                let ty = EntityType::new(shape.clone());
                wellknown::install(&ty);
                let kind = shape.kind();
                for ext in self.extensions.read().iter().filter(|ext| ext.kind == kind) {
                    ty.register_shared(ext.target, ext.converter.clone());
                }
                tracing::trace!(connector_type = %self.connector_type, ty = %ty, "Entity type built");
                ty
            })
            .clone()
    }

    /// Scalar type shortcut
    pub fn scalar(&self, scalar: ScalarType) -> EntityType {
        self.entity_type(Shape::Scalar(scalar))
    }

    /// Array type shortcut
    pub fn array_of(&self, element: ScalarType) -> EntityType {
        self.entity_type(Shape::array_of(element))
    }

    /// Type for a declared tag such as `float64` or `string[]`
    pub fn detect(&self, hint: &str) -> Option<EntityType> {
        let hint = hint.trim();
        match hint.strip_suffix("[]") {
            Some(element) => ScalarType::parse(element).map(|s| self.array_of(s)),
            None => ScalarType::parse(hint).map(|s| self.scalar(s)),
        }
    }

    /// Infer a type from a concrete value
    pub fn detect_value(&self, value: &Value) -> EntityType {
        let shape = match value {
            Value::Array(items) => Shape::array_of(
                items
                    .first()
                    .and_then(ScalarType::of)
                    .unwrap_or(ScalarType::Text),
            ),
            Value::Table(table) => Shape::Table(TableSchema {
                columns: table
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let ty = table
                            .rows
                            .first()
                            .and_then(|row| row.get(i))
                            .and_then(ScalarType::of)
                            .unwrap_or(ScalarType::Text);
                        Column::new(name.clone(), ty)
                    })
                    .collect(),
                index: Vec::new(),
            }),
            Value::Map(entries) => Shape::Map(
                entries
                    .iter()
                    .map(|(name, v)| Column::new(name.clone(), ScalarType::of(v).unwrap_or(ScalarType::Json)))
                    .collect(),
            ),
            scalar => Shape::Scalar(ScalarType::of(scalar).unwrap_or(ScalarType::Json)),
        };
        self.entity_type(shape)
    }

    /// Convert an entity value through its own type's projections
    pub fn convert<'a>(
        &self,
        value: &'a EntityValue,
        target: Representation,
    ) -> ConnectorResult<Option<Cow<'a, Value>>> {
        value.convert(target)
    }
}

impl std::fmt::Debug for TypeProjectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeProjectionRegistry")
            .field("connector_type", &self.connector_type)
            .field("extensions", &self.extensions.read().len())
            .field("types", &self.types.read().len())
            .finish()
    }
}
