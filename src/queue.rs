// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Management for RabbitMQ
//!
//! This module provides types for defining and inspecting RabbitMQ queues through
//! the management API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Definition of a RabbitMQ queue with its configuration parameters.
///
/// Serializes to the body of `PUT /api/queues/{vhost}/{name}`. Queues created
/// by the topology manager are non-durable, not auto-deleted and carry no arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueDefinition {
    pub(crate) auto_delete: bool,
    pub(crate) durable: bool,
    pub(crate) arguments: Map<String, Value>,
}

impl QueueDefinition {
    pub fn new() -> QueueDefinition {
        QueueDefinition::default()
    }
}

/// A queue as reported by `GET /api/queues`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Queue {
    pub name: String,
    #[serde(default)]
    pub vhost: String,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_definition_body() {
        let body = serde_json::to_value(QueueDefinition::new()).unwrap();

        assert_eq!(
            body,
            json!({"auto_delete": false, "durable": false, "arguments": {}})
        );
    }

    #[test]
    fn test_listed_queue_ignores_statistics() {
        let raw = json!({
            "name": "orders",
            "vhost": "/",
            "durable": false,
            "auto_delete": false,
            "arguments": {},
            "messages": 12,
            "consumers": 1
        });

        let queue: Queue = serde_json::from_value(raw).unwrap();

        assert_eq!(queue.name, "orders");
        assert!(!queue.durable);
    }
}
