/// GridSync cell values
///
/// Rows travel between the query engine and the grid as maps from column name
/// to `ColumnValue`. Each column in a `Schema` carries a `ColumnType` describing
/// the values it holds.
///
/// Values convert to and from `serde_json::Value` so a `DataView` can be handed
/// to a rendering layer as plain JSON.

use serde_json::Value as JsonValue;
use std::fmt;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bool,
}

impl ColumnType {
    /// Returns true for integer and floating point types
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Int32 | ColumnType::Int64 | ColumnType::Float32 | ColumnType::Float64
        )
    }
}

/// Column value enum to support multiple types
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bool(bool),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ColumnValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ColumnValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Interprets an integer value of either width as a non-negative index.
    ///
    /// Used for engine-provided columns such as `_depth`.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            ColumnValue::Int32(v) => usize::try_from(*v).ok(),
            ColumnValue::Int64(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Widens any numeric value to f64. Returns None for non-numeric values.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Int32(n) => Some(*n as f64),
            ColumnValue::Int64(n) => Some(*n as f64),
            ColumnValue::Float32(f) => Some(*f as f64),
            ColumnValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert to a JSON value. Non-finite floats become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ColumnValue::Int32(v) => JsonValue::Number((*v).into()),
            ColumnValue::Int64(v) => JsonValue::Number((*v).into()),
            ColumnValue::Float32(v) => float_to_json(*v as f64),
            ColumnValue::Float64(v) => float_to_json(*v),
            ColumnValue::String(v) => JsonValue::String(v.clone()),
            ColumnValue::Bool(v) => JsonValue::Bool(*v),
            ColumnValue::Null => JsonValue::Null,
        }
    }

    /// Convert a JSON scalar into a column value.
    ///
    /// Integers that fit in 32 bits become `Int32`, larger ones `Int64`.
    /// Arrays and objects have no column representation and return None.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => Some(ColumnValue::Null),
            JsonValue::Bool(b) => Some(ColumnValue::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(match i32::try_from(i) {
                        Ok(small) => ColumnValue::Int32(small),
                        Err(_) => ColumnValue::Int64(i),
                    })
                } else {
                    n.as_f64().map(ColumnValue::Float64)
                }
            }
            JsonValue::String(s) => Some(ColumnValue::String(s.clone())),
            _ => None,
        }
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Display form used for pivot keys; `Null` renders as the empty string.
impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Int32(v) => write!(f, "{}", v),
            ColumnValue::Int64(v) => write!(f, "{}", v),
            ColumnValue::Float32(v) => write!(f, "{}", v),
            ColumnValue::Float64(v) => write!(f, "{}", v),
            ColumnValue::String(v) => f.write_str(v),
            ColumnValue::Bool(v) => write!(f, "{}", v),
            ColumnValue::Null => Ok(()),
        }
    }
}
