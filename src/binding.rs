// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Binding Management for RabbitMQ
//!
//! Bindings route messages from a source exchange to a destination queue or
//! exchange. They are created through `POST /api/bindings/...` and are only
//! discovered by listing every binding of a virtual host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a binding creation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BindingDefinition {
    pub(crate) routing_key: String,
    pub(crate) arguments: Map<String, Value>,
}

impl BindingDefinition {
    /// Creates a new binding definition with the given routing key.
    ///
    /// # Parameters
    /// * `key` - The routing key
    pub fn new(key: &str) -> BindingDefinition {
        BindingDefinition {
            routing_key: key.to_owned(),
            arguments: Map::default(),
        }
    }

    /// Adds a binding argument, used by headers exchanges.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn argument(mut self, key: &str, value: Value) -> Self {
        self.arguments.insert(key.to_owned(), value);
        self
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }
}

/// Kind of the destination of a binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    #[default]
    Queue,
    Exchange,
}

/// A binding as reported by `GET /api/bindings/{vhost}`.
///
/// The default exchange reports its implicit bindings with an empty source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Binding {
    pub source: String,
    #[serde(default)]
    pub vhost: String,
    pub destination: String,
    #[serde(default)]
    pub destination_type: DestinationKind,
    #[serde(default)]
    pub routing_key: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definition_body() {
        let def = BindingDefinition::new("prices.#").argument("x-match", json!("all"));

        assert_eq!(
            serde_json::to_value(&def).unwrap(),
            json!({"routing_key": "prices.#", "arguments": {"x-match": "all"}})
        );
    }

    #[test]
    fn test_listed_binding_decoding() {
        let raw = json!([
            {
                "source": "",
                "vhost": "/",
                "destination": "orders",
                "destination_type": "queue",
                "routing_key": "orders",
                "arguments": {},
                "properties_key": "orders"
            },
            {
                "source": "root",
                "vhost": "/",
                "destination": "esper_prices",
                "destination_type": "exchange",
                "routing_key": "esper_prices",
                "arguments": {},
                "properties_key": "esper_prices"
            }
        ]);

        let bindings: Vec<Binding> = serde_json::from_value(raw).unwrap();

        assert_eq!(bindings[0].source, "");
        assert_eq!(bindings[1].destination_type, DestinationKind::Exchange);
    }
}
