//! Raw values and the representations they come in

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Column name holding the position of an array element
pub const INDEX_COLUMN: &str = "Index";

/// Column name holding the array element itself
pub const VALUE_COLUMN: &str = "Value";

/// Well-known target representations a value can be projected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Representation {
    /// `true` / `false`
    Bool,
    /// Signed 64-bit integer
    Integer,
    /// 64-bit float
    Float,
    /// UTF-8 text
    Text,
    /// Opaque bytes
    Bytes,
    /// Ordered list of values
    Array,
    /// Rows of named columns
    Table,
    /// String-keyed entries
    Map,
    /// A JSON document
    Json,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tabular data: a list of column names and rows aligned with them
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableData {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows; every row has one cell per column
    pub rows: Vec<Vec<Value>>,
}

impl TableData {
    /// Empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Rows whose width does not match the column count are rejected.
    pub fn push_row(&mut self, row: Vec<Value>) -> bool {
        if row.len() != self.columns.len() {
            return false;
        }
        self.rows.push(row);
        true
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// A raw value as produced or consumed by a connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Integer(i64),
    /// Floating point
    Float(f64),
    /// Text
    Text(String),
    /// Bytes
    Bytes(Vec<u8>),
    /// Ordered values
    Array(Vec<Value>),
    /// Tabular data
    Table(TableData),
    /// String-keyed entries
    Map(BTreeMap<String, Value>),
    /// A JSON document
    Json(serde_json::Value),
}

impl Value {
    /// The representation this value is already in
    #[must_use]
    pub fn representation(&self) -> Representation {
        match self {
            Self::Bool(_) => Representation::Bool,
            Self::Integer(_) => Representation::Integer,
            Self::Float(_) => Representation::Float,
            Self::Text(_) => Representation::Text,
            Self::Bytes(_) => Representation::Bytes,
            Self::Array(_) => Representation::Array,
            Self::Table(_) => Representation::Table,
            Self::Map(_) => Representation::Map,
            Self::Json(_) => Representation::Json,
        }
    }

    /// Render this value as JSON. Bytes become lowercase hex, tables an array of row objects.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Bool(b) => Json::Bool(*b),
            Self::Integer(i) => Json::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::Text(s) => Json::String(s.clone()),
            Self::Bytes(b) => Json::String(hex::encode(b)),
            Self::Array(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Table(table) => Json::Array(
                table
                    .rows
                    .iter()
                    .map(|row| {
                        let object = table
                            .columns
                            .iter()
                            .zip(row)
                            .map(|(column, cell)| (column.clone(), cell.to_json()))
                            .collect();
                        Json::Object(object)
                    })
                    .collect(),
            ),
            Self::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Json(doc) => doc.clone(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}
