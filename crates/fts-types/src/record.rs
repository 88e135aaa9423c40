//! Records, identifiers and primary-key handling.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FtsError;

/// A mutated row as returned by the record store.
pub type Record = Map<String, Value>;

/// Primary-key value in the form used by membership predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    pub fn to_json(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Str(s) => f.write_str(s),
        }
    }
}

/// Primary-key field of an entity and whether its values are numeric.
///
/// Numeric-ness is configuration; it is never inferred from data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkSpec {
    pub field: String,
    pub numeric: bool,
}

impl PkSpec {
    pub fn new(field: impl Into<String>, numeric: bool) -> Self {
        Self {
            field: field.into(),
            numeric,
        }
    }

    /// Numeric primary key.
    pub fn numeric(field: impl Into<String>) -> Self {
        Self::new(field, true)
    }

    /// String primary key.
    pub fn string(field: impl Into<String>) -> Self {
        Self::new(field, false)
    }

    /// Path suffix of a membership predicate on this key, e.g. `id.in`.
    pub fn membership_suffix(&self) -> String {
        format!("{}.in", self.field)
    }

    /// Convert a provider identifier into the key's form.
    pub fn coerce(&self, raw: &str) -> Result<RecordId, FtsError> {
        if !self.numeric {
            return Ok(RecordId::Str(raw.to_string()));
        }
        raw.trim()
            .parse::<i64>()
            .map(RecordId::Int)
            .map_err(|_| FtsError::InvalidIdentifier { id: raw.to_string() })
    }

    /// Document identifier of a record: its primary-key value as a string.
    pub fn document_id(&self, record: &Record) -> Result<String, FtsError> {
        match record.get(&self.field) {
            Some(value) if !is_blank(value) => Ok(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            _ => Err(FtsError::MissingPrimaryKey {
                primary_key: self.field.clone(),
            }),
        }
    }
}

/// True for values treated as "no data": `null` and the empty string.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
