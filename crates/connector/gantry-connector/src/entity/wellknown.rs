//! Converters every entity type starts with

use super::types::{EntityType, ScalarType, ShapeKind};
use super::value::{Representation, TableData, Value, INDEX_COLUMN, VALUE_COLUMN};
use crate::error::{ConnectorError, ConnectorResult};

fn unexpected(expected: &str, value: &Value) -> ConnectorError {
    ConnectorError::invalid_value(format!(
        "expected {expected}, got {}",
        value.representation()
    ))
}

fn to_text(value: &Value) -> ConnectorResult<Value> {
    let text = match value {
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bytes(b) => hex::encode(b),
        other => other.to_json().to_string(),
    };
    Ok(Value::Text(text))
}

fn to_json(value: &Value) -> ConnectorResult<Value> {
    Ok(Value::Json(value.to_json()))
}

fn parse_text<T, F>(value: &Value, what: &str, wrap: F) -> ConnectorResult<Value>
where
    T: std::str::FromStr,
    F: Fn(T) -> Value,
{
    match value {
        Value::Text(s) => s
            .trim()
            .parse::<T>()
            .map(wrap)
            .map_err(|_| ConnectorError::invalid_value(format!("'{s}' is not a valid {what}"))),
        other => Err(unexpected("text", other)),
    }
}

/// Collapse an `Index`/`Value` table into an ordered array
pub(crate) fn table_to_array(value: &Value) -> ConnectorResult<Value> {
    let table = match value {
        Value::Table(table) => table,
        other => return Err(unexpected("table", other)),
    };
    let (index, element) = match (table.column_index(INDEX_COLUMN), table.column_index(VALUE_COLUMN)) {
        (Some(i), Some(v)) if table.columns.len() == 2 => (i, v),
        _ => return Err(ConnectorError::invalid_value("table is not array-shaped")),
    };

    let mut rows = table
        .rows
        .iter()
        .map(|row| match (row.get(index), row.get(element)) {
            (Some(Value::Integer(position)), Some(item)) => Ok((*position, item.clone())),
            (Some(Value::Integer(_)), None) | (None, _) => {
                Err(ConnectorError::invalid_value("table row is shorter than its columns"))
            }
            (Some(other), _) => Err(unexpected("integer index", other)),
        })
        .collect::<ConnectorResult<Vec<_>>>()?;
    rows.sort_by_key(|(position, _)| *position);
    Ok(Value::Array(rows.into_iter().map(|(_, item)| item).collect()))
}

/// Expand an array into an `Index`/`Value` table
pub(crate) fn array_to_table(value: &Value) -> ConnectorResult<Value> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(unexpected("array", other)),
    };
    let mut table = TableData::new([INDEX_COLUMN, VALUE_COLUMN]);
    for (position, item) in items.iter().enumerate() {
        table.push_row(vec![Value::Integer(position as i64), item.clone()]);
    }
    Ok(Value::Table(table))
}

/// Register the well-known converters for the shape of `ty`
pub(crate) fn install(ty: &EntityType) {
    match ty.shape().kind() {
        ShapeKind::Scalar(scalar) => {
            ty.register_fn(Representation::Json, to_json);
            if scalar != ScalarType::Text {
                ty.register_fn(Representation::Text, to_text);
            }
            match scalar {
                ScalarType::Integer => ty.register_fn(Representation::Float, |value| match value {
                    Value::Integer(i) => Ok(Value::Float(*i as f64)),
                    other => Err(unexpected("integer", other)),
                }),
                ScalarType::Bool => ty.register_fn(Representation::Integer, |value| match value {
                    Value::Bool(b) => Ok(Value::Integer(i64::from(*b))),
                    other => Err(unexpected("bool", other)),
                }),
                ScalarType::Text => {
                    ty.register_fn(Representation::Integer, |value| {
                        parse_text::<i64, _>(value, "integer", Value::Integer)
                    });
                    ty.register_fn(Representation::Float, |value| {
                        parse_text::<f64, _>(value, "float", Value::Float)
                    });
                    ty.register_fn(Representation::Bool, |value| {
                        parse_text::<bool, _>(value, "bool", Value::Bool)
                    });
                    ty.register_fn(Representation::Bytes, |value| match value {
                        Value::Text(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
                        other => Err(unexpected("text", other)),
                    });
                }
                ScalarType::Float | ScalarType::Bytes | ScalarType::Json => {}
            }
        }
        ShapeKind::Array => {
            ty.register_fn(Representation::Array, table_to_array);
            ty.register_fn(Representation::Table, array_to_table);
            ty.register_fn(Representation::Json, to_json);
            ty.register_fn(Representation::Text, to_text);
        }
        ShapeKind::Table | ShapeKind::Map => {
            ty.register_fn(Representation::Json, to_json);
            ty.register_fn(Representation::Text, to_text);
        }
    }
}
