// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Management for RabbitMQ
//!
//! This module provides types for defining and inspecting RabbitMQ exchanges through
//! the management API. `ExchangeDefinition` is the body sent when an exchange is
//! created; `Exchange` is an exchange as listed by the broker.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

/// Argument key under which an exchange carries its message schema
pub const SCHEMA_ARGUMENT: &str = "schema";

/// Represents the types of exchanges available in RabbitMQ.
///
/// Each exchange type has specific routing behavior:
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Direct,
    #[default]
    Fanout,
    Topic,
    Headers,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Direct => "direct",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Topic => "topic",
            ExchangeKind::Headers => "headers",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ExchangeKind::Direct),
            "fanout" => Ok(ExchangeKind::Fanout),
            "topic" => Ok(ExchangeKind::Topic),
            "headers" => Ok(ExchangeKind::Headers),
            other => Err(format!("unknown exchange type `{}`", other)),
        }
    }
}

/// Definition of a RabbitMQ exchange with its configuration parameters.
///
/// This struct implements the builder pattern and serializes to the body of
/// `PUT /api/exchanges/{vhost}/{name}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExchangeDefinition {
    #[serde(rename = "type")]
    pub(crate) kind: ExchangeKind,
    pub(crate) auto_delete: bool,
    pub(crate) durable: bool,
    pub(crate) internal: bool,
    pub(crate) arguments: Map<String, Value>,
}

impl ExchangeDefinition {
    /// Creates a new exchange definition.
    ///
    /// By default, the exchange is a transient Fanout exchange without arguments.
    pub fn new() -> ExchangeDefinition {
        ExchangeDefinition::default()
    }

    /// Sets the exchange type.
    ///
    /// # Parameters
    /// * `kind` - The exchange type
    ///
    /// # Returns
    /// Self for method chaining
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the exchange type to Fanout.
    pub fn fanout(mut self) -> Self {
        self.kind = ExchangeKind::Fanout;
        self
    }

    /// Sets the exchange type to Topic.
    pub fn topic(mut self) -> Self {
        self.kind = ExchangeKind::Topic;
        self
    }

    /// Adds a single argument to the exchange.
    ///
    /// # Parameters
    /// * `key` - The argument name
    /// * `value` - The argument value
    ///
    /// # Returns
    /// Self for method chaining
    pub fn argument(mut self, key: &str, value: Value) -> Self {
        self.arguments.insert(key.to_owned(), value);
        self
    }

    /// Attaches a message schema descriptor.
    ///
    /// The descriptor is stored as JSON text under the `schema` argument, the form
    /// read back by the schema extraction of the topology manager.
    pub fn schema(self, descriptor: &Value) -> Self {
        self.argument(SCHEMA_ARGUMENT, Value::String(descriptor.to_string()))
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }
}

/// An exchange as reported by `GET /api/exchanges`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Exchange {
    pub name: String,
    #[serde(default)]
    pub vhost: String,
    /// Raw type name; plugins may report types outside `ExchangeKind`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl Exchange {
    /// The exchange type, when it is one of the standard kinds.
    pub fn exchange_kind(&self) -> Option<ExchangeKind> {
        self.kind.parse().ok()
    }

    /// The raw schema argument, if any.
    pub fn schema_descriptor(&self) -> Option<&Value> {
        self.arguments.get(SCHEMA_ARGUMENT)
    }
}
