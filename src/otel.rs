// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Integration for the Management API
//!
//! This module propagates the active trace context through the HTTP headers of
//! management API requests, so broker-side topology changes can be correlated
//! with the caller's trace.

use opentelemetry::{propagation::Injector, Context};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::error;

/// An adapter for injecting OpenTelemetry context into HTTP headers.
pub(crate) struct HttpTracePropagator<'a> {
    headers: &'a mut HeaderMap,
}

impl<'a> HttpTracePropagator<'a> {
    /// Creates a new HttpTracePropagator.
    ///
    /// # Parameters
    /// * `headers` - A mutable reference to the request headers
    pub(crate) fn new(headers: &'a mut HeaderMap) -> Self {
        Self { headers }
    }
}

impl Injector for HttpTracePropagator<'_> {
    /// Sets a trace context key-value pair in the request headers.
    fn set(&mut self, key: &str, value: String) {
        let name = match HeaderName::from_bytes(key.to_lowercase().as_bytes()) {
            Ok(name) => name,
            Err(err) => {
                error!(error = err.to_string(), key = key, "invalid trace header name");
                return;
            }
        };

        match HeaderValue::from_str(&value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(err) => error!(error = err.to_string(), key = key, "invalid trace header value"),
        }
    }
}

/// Injects the given context into `headers` using the global propagator.
pub(crate) fn inject_context(ctx: &Context, headers: &mut HeaderMap) {
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut HttpTracePropagator::new(headers))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injector_lowercases_keys() {
        let mut headers = HeaderMap::new();

        HttpTracePropagator::new(&mut headers).set("TraceParent", "00-abc-def-01".to_owned());

        assert_eq!(headers.get("traceparent").unwrap(), "00-abc-def-01");
    }

    #[test]
    fn test_injector_skips_invalid_values() {
        let mut headers = HeaderMap::new();

        HttpTracePropagator::new(&mut headers).set("tracestate", "bad\nvalue".to_owned());

        assert!(headers.is_empty());
    }

    #[test]
    fn test_inject_with_noop_propagator() {
        let mut headers = HeaderMap::new();

        inject_context(&Context::current(), &mut headers);

        assert!(headers.is_empty());
    }
}
