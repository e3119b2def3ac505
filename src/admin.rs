// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Management API Client
//!
//! This module defines the `BrokerAdmin` trait, the narrow set of management
//! operations the topology manager relies on, and `HttpBrokerAdmin`, its
//! implementation over the RabbitMQ management HTTP API.
//!
//! Write operations hand the HTTP status back to the caller untouched; deciding
//! what counts as success belongs to the topology layer. Read operations decode
//! the JSON body and fail on any status outside [200,300).

use crate::{
    binding::{Binding, BindingDefinition},
    configs::TopologyConfigs,
    errors::AdminError,
    exchange::{Exchange, ExchangeDefinition},
    otel,
    queue::{Queue, QueueDefinition},
};
use async_trait::async_trait;
use opentelemetry::Context;
use reqwest::{
    header::HeaderMap, redirect::Policy, Client, Method, RequestBuilder, Response, Url,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Outcome of a management write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminResponse {
    pub status: u16,
}

impl AdminResponse {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    /// Whether the status lies in [200,300). Redirects are failures.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body of `GET /api/aliveness-test/{vhost}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AlivenessStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Management operations consumed by the topology manager.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    /// Declares a test queue on `vhost` and round-trips a message through it.
    async fn aliveness_test(&self, vhost: &str) -> Result<AlivenessStatus, AdminError>;

    async fn create_queue(
        &self,
        vhost: &str,
        name: &str,
        def: &QueueDefinition,
    ) -> Result<AdminResponse, AdminError>;

    /// Binds `exchange` (source) to `queue` (destination).
    async fn bind_exchange_to_queue(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
        def: &BindingDefinition,
    ) -> Result<AdminResponse, AdminError>;

    async fn delete_queue(&self, vhost: &str, name: &str) -> Result<AdminResponse, AdminError>;

    /// Lists the queues of every virtual host.
    async fn list_queues(&self) -> Result<Vec<Queue>, AdminError>;

    async fn list_bindings(&self, vhost: &str) -> Result<Vec<Binding>, AdminError>;

    async fn create_exchange(
        &self,
        vhost: &str,
        name: &str,
        def: &ExchangeDefinition,
    ) -> Result<AdminResponse, AdminError>;

    /// Binds `source` to `destination`, both exchanges.
    async fn bind_exchange_to_exchange(
        &self,
        vhost: &str,
        source: &str,
        destination: &str,
        def: &BindingDefinition,
    ) -> Result<AdminResponse, AdminError>;

    async fn delete_exchange(&self, vhost: &str, name: &str)
        -> Result<AdminResponse, AdminError>;

    /// Lists the exchanges of every virtual host.
    async fn list_exchanges(&self) -> Result<Vec<Exchange>, AdminError>;
}

/// `BrokerAdmin` over the RabbitMQ management HTTP API.
pub struct HttpBrokerAdmin {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl HttpBrokerAdmin {
    /// Creates a new management client.
    ///
    /// # Parameters
    /// * `cfg` - Configuration holding the management address and credentials
    ///
    /// # Returns
    /// The client, or `AdminError::Config` when the address is not a valid URL
    pub fn new(cfg: &TopologyConfigs) -> Result<Self, AdminError> {
        let base_url = Url::parse(&cfg.management_url())
            .map_err(|e| AdminError::Config(format!("invalid management url: {}", e)))?;

        // 3xx must reach the caller as a failed status, never be followed.
        let mut builder = Client::builder().redirect(Policy::none());
        if let Some(timeout) = cfg.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|err| {
            error!(error = err.to_string(), "failure to build http client");
            AdminError::InternalError
        })?;

        Ok(HttpBrokerAdmin {
            client,
            base_url,
            username: cfg.server_username.clone(),
            password: cfg.server_password.clone(),
        })
    }

    /// Builds `{base}/api/{segments...}` with every segment percent-encoded.
    ///
    /// The default vhost `/` becomes `%2F`.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, AdminError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AdminError::Config("management url cannot be a base".to_owned()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<Response, AdminError> {
        let mut headers = HeaderMap::new();
        otel::inject_context(&Context::current(), &mut headers);
        let request_id = Uuid::new_v4().to_string();

        debug!(operation = operation, request_id = request_id, "sending management request");

        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .headers(headers)
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(|err| {
                error!(
                    error = err.to_string(),
                    operation = operation,
                    request_id = request_id,
                    "management request failed"
                );
                AdminError::Transport(err.to_string())
            })?;

        debug!(
            operation = operation,
            request_id = request_id,
            status = response.status().as_u16(),
            "management request completed"
        );

        Ok(response)
    }

    async fn write<T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&T>,
        operation: &str,
    ) -> Result<AdminResponse, AdminError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.execute(request, operation).await?;
        Ok(AdminResponse::new(response.status().as_u16()))
    }

    async fn fetch<T>(&self, url: Url, operation: &str) -> Result<T, AdminError>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(self.client.get(url), operation).await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), operation = operation, "unexpected status");
            return Err(AdminError::UnexpectedStatus {
                status: status.as_u16(),
                operation: operation.to_owned(),
            });
        }

        response.json::<T>().await.map_err(|err| {
            error!(error = err.to_string(), operation = operation, "failure to decode response");
            AdminError::Decode(err.to_string())
        })
    }
}

#[async_trait]
impl BrokerAdmin for HttpBrokerAdmin {
    async fn aliveness_test(&self, vhost: &str) -> Result<AlivenessStatus, AdminError> {
        let url = self.endpoint(&["aliveness-test", vhost])?;
        self.fetch(url, "aliveness_test").await
    }

    async fn create_queue(
        &self,
        vhost: &str,
        name: &str,
        def: &QueueDefinition,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint(&["queues", vhost, name])?;
        self.write(Method::PUT, url, Some(def), "create_queue").await
    }

    async fn bind_exchange_to_queue(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
        def: &BindingDefinition,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint(&["bindings", vhost, "e", exchange, "q", queue])?;
        self.write(Method::POST, url, Some(def), "bind_exchange_to_queue")
            .await
    }

    async fn delete_queue(&self, vhost: &str, name: &str) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint(&["queues", vhost, name])?;
        self.write::<()>(Method::DELETE, url, None, "delete_queue")
            .await
    }

    async fn list_queues(&self) -> Result<Vec<Queue>, AdminError> {
        let url = self.endpoint(&["queues"])?;
        self.fetch(url, "list_queues").await
    }

    async fn list_bindings(&self, vhost: &str) -> Result<Vec<Binding>, AdminError> {
        let url = self.endpoint(&["bindings", vhost])?;
        self.fetch(url, "list_bindings").await
    }

    async fn create_exchange(
        &self,
        vhost: &str,
        name: &str,
        def: &ExchangeDefinition,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint(&["exchanges", vhost, name])?;
        self.write(Method::PUT, url, Some(def), "create_exchange")
            .await
    }

    async fn bind_exchange_to_exchange(
        &self,
        vhost: &str,
        source: &str,
        destination: &str,
        def: &BindingDefinition,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint(&["bindings", vhost, "e", source, "e", destination])?;
        self.write(Method::POST, url, Some(def), "bind_exchange_to_exchange")
            .await
    }

    async fn delete_exchange(
        &self,
        vhost: &str,
        name: &str,
    ) -> Result<AdminResponse, AdminError> {
        let url = self.endpoint(&["exchanges", vhost, name])?;
        self.write::<()>(Method::DELETE, url, None, "delete_exchange")
            .await
    }

    async fn list_exchanges(&self) -> Result<Vec<Exchange>, AdminError> {
        let url = self.endpoint(&["exchanges"])?;
        self.fetch(url, "list_exchanges").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{RabbitTopology, Topology};
    use std::sync::Arc;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    const CREATED: &str = "HTTP/1.1 201 Created\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

    fn admin() -> HttpBrokerAdmin {
        HttpBrokerAdmin::new(&TopologyConfigs::default()).unwrap()
    }

    #[test]
    fn test_success_range() {
        assert!(AdminResponse::new(200).is_success());
        assert!(AdminResponse::new(204).is_success());
        assert!(AdminResponse::new(299).is_success());
        assert!(!AdminResponse::new(199).is_success());
        assert!(!AdminResponse::new(300).is_success());
        assert!(!AdminResponse::new(301).is_success());
        assert!(!AdminResponse::new(404).is_success());
    }

    #[test]
    fn test_default_vhost_is_encoded() {
        let url = admin().endpoint(&["queues", "/", "orders"]).unwrap();

        assert_eq!(url.as_str(), "http://localhost:15672/api/queues/%2F/orders");
    }

    #[test]
    fn test_binding_endpoint() {
        let url = admin()
            .endpoint(&["bindings", "events", "e", "root", "e", "esper_prices"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "http://localhost:15672/api/bindings/events/e/root/e/esper_prices"
        );
    }

    #[test]
    fn test_invalid_management_url() {
        let cfg = TopologyConfigs {
            server_host: "bad host".to_owned(),
            ..TopologyConfigs::default()
        };

        assert!(matches!(
            HttpBrokerAdmin::new(&cfg),
            Err(AdminError::Config(_))
        ));
    }

    #[test]
    fn test_aliveness_decoding() {
        let status: AlivenessStatus =
            serde_json::from_str(r#"{"status":"failed","reason":"timeout"}"#).unwrap();

        assert_eq!(status.status, "failed");
        assert_eq!(status.reason.as_deref(), Some("timeout"));
    }

    /// Serves one canned response per connection and records the raw requests.
    async fn serve(responses: Vec<String>) -> (TopologyConfigs, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let cfg = TopologyConfigs {
            server_host: "127.0.0.1".to_owned(),
            server_port: listener.local_addr().unwrap().port(),
            ..TopologyConfigs::default()
        };

        let handle = tokio::spawn(async move {
            let mut requests = vec![];
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            requests
        });

        (cfg, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let line = line.to_ascii_lowercase();
                        line.strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    fn json_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    fn redirect(status: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nlocation: /elsewhere\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            status
        )
    }

    #[tokio::test]
    async fn test_create_queue_request_on_the_wire() {
        let (cfg, server) = serve(vec![CREATED.to_owned()]).await;
        let admin = HttpBrokerAdmin::new(&cfg).unwrap();

        let response = admin
            .create_queue("/", "orders", &QueueDefinition::new())
            .await
            .unwrap();

        assert_eq!(response, AdminResponse::new(201));

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        let lowered = request.to_ascii_lowercase();
        assert!(request.starts_with("PUT /api/queues/%2F/orders HTTP/1.1\r\n"));
        // guest:guest
        assert!(lowered.contains("authorization: basic z3vlc3q6z3vlc3q=\r\n"));
        assert!(lowered.contains("x-request-id: "));
        assert!(lowered.contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"auto_delete":false,"durable":false,"arguments":{}}"#));
    }

    #[tokio::test]
    async fn test_write_returns_raw_error_status() {
        let (cfg, server) = serve(vec![json_response(
            "404 Not Found",
            r#"{"error":"not_found","reason":"no exchange"}"#,
        )])
        .await;
        let admin = HttpBrokerAdmin::new(&cfg).unwrap();

        let response = admin
            .bind_exchange_to_queue("/", "missing", "orders", &BindingDefinition::new("orders"))
            .await
            .unwrap();

        assert_eq!(response, AdminResponse::new(404));
        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/bindings/%2F/e/missing/q/orders HTTP/1.1\r\n"));
        assert!(requests[0].ends_with(r#"{"routing_key":"orders","arguments":{}}"#));
    }

    #[tokio::test]
    async fn test_redirect_is_reported_not_followed() {
        let (cfg, server) =
            serve(vec![redirect("301 Moved Permanently"), CREATED.to_owned()]).await;
        let admin = HttpBrokerAdmin::new(&cfg).unwrap();

        let response = admin
            .create_queue("/", "orders", &QueueDefinition::new())
            .await
            .unwrap();

        assert_eq!(response, AdminResponse::new(301));
        assert!(!response.is_success());

        // a followed redirect would have consumed the second canned response
        server.abort();
        assert!(server.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_redirected_create_skips_bind() {
        let (cfg, server) = serve(vec![redirect("302 Found")]).await;
        let topology = RabbitTopology::from_configs(cfg).unwrap();

        assert!(!topology.create_queue_with_key("orders", "output", "orders").await);

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("PUT /api/queues/%2F/orders "));
    }

    #[tokio::test]
    async fn test_failed_read_is_unexpected_status() {
        let unavailable = json_response("503 Service Unavailable", r#"{"status":"failed"}"#);
        let (cfg, server) = serve(vec![unavailable.clone(), unavailable]).await;
        let admin = HttpBrokerAdmin::new(&cfg).unwrap();

        let err = admin.aliveness_test("/").await.unwrap_err();

        assert_eq!(
            err,
            AdminError::UnexpectedStatus {
                status: 503,
                operation: "aliveness_test".to_owned(),
            }
        );

        let topology = RabbitTopology::new(cfg, Arc::new(admin));
        assert!(topology.is_alive().await.starts_with("NOK"));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/aliveness-test/%2F HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_list_exchanges_decoding() {
        let body = r#"[{"name":"esper_prices","vhost":"/","type":"topic","durable":true,
            "auto_delete":false,"internal":false,"arguments":{}}]"#;
        let (cfg, server) = serve(vec![json_response("200 OK", body)]).await;
        let admin = HttpBrokerAdmin::new(&cfg).unwrap();

        let exchanges = admin.list_exchanges().await.unwrap();

        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].name, "esper_prices");
        assert_eq!(exchanges[0].kind, "topic");
        assert!(server.await.unwrap()[0].starts_with("GET /api/exchanges HTTP/1.1\r\n"));
    }
}
