// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for RabbitMQ Topology Management
//!
//! This module provides the error types for the management API operations.
//! The `AdminError` enum represents every failure that can occur while talking to
//! the broker's management interface, loading configuration, or extracting an
//! exchange schema.

use thiserror::Error;

/// Represents errors that can occur during RabbitMQ management operations.
///
/// Create operations and the aliveness check never return these to the caller,
/// they are folded into `false` / `"NOK..."` at the topology boundary. List, delete
/// and schema operations propagate them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// The request never produced an HTTP response (connect, timeout, io)
    #[error("failure to reach the management api: {0}")]
    Transport(String),

    /// A read request answered with a status outside [200,300)
    #[error("unexpected status `{status}` for `{operation}`")]
    UnexpectedStatus { status: u16, operation: String },

    /// The response body could not be decoded
    #[error("failure to decode response: {0}")]
    Decode(String),

    /// No exchange with the given name exists in the virtual host
    #[error("exchange `{0}` not found")]
    ExchangeNotFound(String),

    /// The exchange carries no schema argument
    #[error("exchange `{0}` has no schema argument")]
    SchemaMissing(String),

    /// The schema argument is not valid JSON
    #[error("failure to parse schema: {0}")]
    SchemaParse(String),

    /// Invalid or unreadable configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
