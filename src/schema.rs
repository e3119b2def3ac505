// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Schema Flattening
//!
//! Exchanges may carry a JSON schema descriptor in their arguments. This module
//! flattens such a descriptor into a single-level map from attribute path to the
//! type of its value. Nested object keys are joined with `.`, array elements are
//! addressed as `path[i]`.

use crate::errors::AdminError;
use serde::Serialize;
use serde_json::{Number, Value};
use std::{collections::BTreeMap, fmt};

/// Flattened schema: attribute path to attribute type.
pub type Schema = BTreeMap<String, AttributeType>;

/// Type of a flattened schema attribute.
///
/// Numbers are classified by the narrowest type that holds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeType {
    String,
    Integer,
    Long,
    BigInteger,
    Double,
    Boolean,
    Null,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "String",
            AttributeType::Integer => "Integer",
            AttributeType::Long => "Long",
            AttributeType::BigInteger => "BigInteger",
            AttributeType::Double => "Double",
            AttributeType::Boolean => "Boolean",
            AttributeType::Null => "Null",
        }
    }

    /// Type of a scalar JSON value. Objects and arrays have no attribute type.
    pub fn of(value: &Value) -> Option<AttributeType> {
        match value {
            Value::Null => Some(AttributeType::Null),
            Value::Bool(_) => Some(AttributeType::Boolean),
            Value::String(_) => Some(AttributeType::String),
            Value::Number(n) => Some(Self::of_number(n)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn of_number(n: &Number) -> AttributeType {
        if let Some(i) = n.as_i64() {
            if i32::try_from(i).is_ok() {
                AttributeType::Integer
            } else {
                AttributeType::Long
            }
        } else if n.is_u64() {
            AttributeType::BigInteger
        } else {
            AttributeType::Double
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattens a JSON document into `path -> scalar` pairs.
///
/// A scalar document yields a single entry with an empty path. Empty objects and
/// arrays contribute nothing.
pub fn flatten_json(value: &Value) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    flatten_into("", value, &mut flat);
    flat
}

/// Parses `raw` as JSON and flattens it.
pub fn flatten_json_str(raw: &str) -> Result<BTreeMap<String, Value>, AdminError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| AdminError::SchemaParse(e.to_string()))?;
    Ok(flatten_json(&value))
}

fn flatten_into(path: &str, value: &Value, flat: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(fields) => {
            for (key, child) in fields {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_into(&child_path, child, flat);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(&format!("{}[{}]", path, i), item, flat);
            }
        }
        scalar => {
            flat.insert(path.to_owned(), scalar.clone());
        }
    }
}

/// Builds the schema of a flattened descriptor.
///
/// The attribute named `timestamp_attribute` is reported as `timestamp` of type `Long`.
pub fn schema_from_flat(flat: &BTreeMap<String, Value>, timestamp_attribute: &str) -> Schema {
    let mut schema = Schema::new();

    for (key, value) in flat {
        if key == timestamp_attribute {
            schema.insert("timestamp".to_owned(), AttributeType::Long);
            continue;
        }

        if let Some(kind) = AttributeType::of(value) {
            schema.insert(key.clone(), kind);
        }
    }

    schema
}

/// Parses a schema descriptor argument and builds its schema.
///
/// The descriptor is normally JSON text; a structured JSON object is used as is.
pub fn schema_from_descriptor(
    descriptor: &Value,
    timestamp_attribute: &str,
) -> Result<Schema, AdminError> {
    let flat = match descriptor {
        Value::String(raw) => flatten_json_str(raw)?,
        Value::Object(_) => flatten_json(descriptor),
        other => {
            return Err(AdminError::SchemaParse(format!(
                "schema descriptor must be a JSON object, got `{}`",
                other
            )))
        }
    };

    Ok(schema_from_flat(&flat, timestamp_attribute))
}
