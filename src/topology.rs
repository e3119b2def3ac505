// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! This module manages a namespaced topology on top of the management API.
//! Managed exchanges live under a configured name prefix and are bound to a root
//! exchange when created; queues are bound to an output exchange by default.
//!
//! The main components are:
//! - `Topology` trait: Interface for topology management
//! - `RabbitTopology`: Implementation of the Topology trait over a `BrokerAdmin`
//! - `Provisioning`: Detailed outcome of a create-then-bind operation
//!
//! Create operations run in two phases, create then bind. The bind only runs when
//! the create answered with a status in [200,300). A failed bind is never rolled
//! back: the queue or exchange stays in place, unbound.

use crate::{
    admin::{AdminResponse, BrokerAdmin, HttpBrokerAdmin},
    binding::BindingDefinition,
    configs::TopologyConfigs,
    errors::AdminError,
    exchange::{Exchange, ExchangeDefinition, ExchangeKind},
    queue::QueueDefinition,
    schema::{schema_from_descriptor, Schema},
};
use async_trait::async_trait;
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, error, warn};

/// Prefix of the string returned by `is_alive` when the broker cannot be checked
pub const ALIVENESS_FAILURE_MARKER: &str = "NOK";

/// Outcome of a two-phase create-then-bind operation.
///
/// `status` is the HTTP status of the failed phase, or `None` when the request
/// never got a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    /// Created and bound.
    Bound,
    /// Created, but the binding failed. Nothing was rolled back.
    Unbound { status: Option<u16> },
    /// The create phase failed, no binding was attempted.
    Failed { status: Option<u16> },
}

impl Provisioning {
    pub fn is_success(&self) -> bool {
        matches!(self, Provisioning::Bound)
    }
}

/// Applies the namespace rule: names already starting with `prefix` are kept,
/// others become `prefix_name`.
///
/// The test is a literal string prefix, `prefixX` counts as already prefixed.
pub fn canonical_name(prefix: &str, name: &str) -> String {
    if name.starts_with(prefix) {
        name.to_owned()
    } else {
        format!("{}_{}", prefix, name)
    }
}

/// Trait defining the interface for topology management.
#[async_trait]
pub trait Topology: Send + Sync {
    /// Checks broker health on the configured virtual host.
    ///
    /// # Returns
    /// The broker-reported status, or a string starting with `NOK` on any failure
    async fn is_alive(&self) -> String;

    /// Creates a queue bound to the output exchange, keyed by its own name.
    async fn create_queue(&self, name: &str) -> bool {
        self.create_queue_on(name, self.output_exchange_name()).await
    }

    /// Creates a queue bound to `exchange`, keyed by its own name.
    async fn create_queue_on(&self, name: &str, exchange: &str) -> bool {
        self.create_queue_with_key(name, exchange, name).await
    }

    /// Creates a queue and binds `exchange` to it with `routing_key`.
    ///
    /// # Returns
    /// true iff the last executed phase succeeded
    async fn create_queue_with_key(&self, name: &str, exchange: &str, routing_key: &str) -> bool;

    async fn delete_queue(&self, name: &str) -> Result<AdminResponse, AdminError>;

    /// Deletes every queue bound to the root exchange.
    async fn delete_all_queues(&self) -> Result<(), AdminError>;

    /// Lists the queues bound to the root exchange.
    async fn list_queues(&self) -> Result<Vec<String>, AdminError> {
        self.list_queues_of(self.exchange_name()).await
    }

    /// Lists the existing queues that `exchange` is bound to, each name once.
    async fn list_queues_of(&self, exchange: &str) -> Result<Vec<String>, AdminError>;

    /// Lists the names of every queue of the virtual host, bound or not.
    async fn queue_names(&self) -> Result<Vec<String>, AdminError>;

    /// Creates a fanout exchange keyed by its own name.
    async fn create_exchange(&self, name: &str) -> bool {
        self.create_exchange_with(name, ExchangeKind::Fanout, name)
            .await
    }

    /// Creates a durable managed exchange and binds the root exchange to it.
    ///
    /// # Returns
    /// true iff the last executed phase succeeded
    async fn create_exchange_with(&self, name: &str, kind: ExchangeKind, routing_key: &str)
        -> bool;

    /// Deletes an exchange. `name` must already be canonical.
    async fn delete_exchange(&self, name: &str) -> Result<AdminResponse, AdminError>;

    /// Deletes every managed exchange.
    async fn delete_all_exchanges(&self) -> Result<(), AdminError>;

    /// Lists the managed exchanges of the virtual host.
    async fn list_exchanges(&self) -> Result<Vec<Exchange>, AdminError>;

    async fn list_exchange_names(&self) -> Result<Vec<String>, AdminError>;

    /// Extracts the flattened schema of an exchange.
    ///
    /// A missing or malformed schema argument is logged and yields an empty schema.
    async fn schema_for_exchange(&self, name: &str) -> Result<Schema, AdminError>;

    /// The root exchange.
    fn exchange_name(&self) -> &str;

    /// The default source exchange of new queues.
    fn output_exchange_name(&self) -> &str;
}

/// Topology manager over any `BrokerAdmin`.
pub struct RabbitTopology<A> {
    admin: Arc<A>,
    cfg: TopologyConfigs,
}

impl<A: BrokerAdmin> RabbitTopology<A> {
    /// Creates a new RabbitTopology instance.
    ///
    /// # Parameters
    /// * `cfg` - Immutable topology settings
    /// * `admin` - Management API client
    pub fn new(cfg: TopologyConfigs, admin: Arc<A>) -> RabbitTopology<A> {
        RabbitTopology { admin, cfg }
    }

    pub fn configs(&self) -> &TopologyConfigs {
        &self.cfg
    }

    /// Canonical name of a managed exchange.
    pub fn canonical_exchange_name(&self, name: &str) -> String {
        canonical_name(&self.cfg.exchange_prefix, name)
    }

    fn is_managed(&self, name: &str) -> bool {
        name.starts_with(&self.cfg.exchange_prefix)
    }

    /// Creates a queue, then binds `exchange` to it.
    pub async fn provision_queue(
        &self,
        name: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Provisioning {
        debug!("creating queue: {}", name);

        let def = QueueDefinition::new();
        let created = self.admin.create_queue(&self.cfg.vhost, name, &def).await;
        if let Some(failed) = Self::failed_phase(created, name, "failure to create queue") {
            return Provisioning::Failed { status: failed };
        }

        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            name, exchange, routing_key
        );

        let bind = BindingDefinition::new(routing_key);
        let bound = self
            .admin
            .bind_exchange_to_queue(&self.cfg.vhost, exchange, name, &bind)
            .await;
        match Self::failed_phase(bound, name, "error to bind queue to exchange") {
            Some(status) => Provisioning::Unbound { status },
            None => Provisioning::Bound,
        }
    }

    /// Creates a durable managed exchange, then binds the root exchange to it.
    pub async fn provision_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
        routing_key: &str,
    ) -> Provisioning {
        let canonical = self.canonical_exchange_name(name);
        debug!("creating exchange: {}", canonical);

        let def = ExchangeDefinition::new().kind(kind).durable();
        let created = self
            .admin
            .create_exchange(&self.cfg.vhost, &canonical, &def)
            .await;
        let failed = Self::failed_phase(created, &canonical, "error to declare the exchange");
        if let Some(failed) = failed {
            return Provisioning::Failed { status: failed };
        }

        let bind = BindingDefinition::new(routing_key);
        let bound = self
            .admin
            .bind_exchange_to_exchange(&self.cfg.vhost, &self.cfg.exchange_name, &canonical, &bind)
            .await;
        match Self::failed_phase(bound, &canonical, "error to bind exchange to root exchange") {
            Some(status) => Provisioning::Unbound { status },
            None => {
                debug!("exchange: {} was created", canonical);
                Provisioning::Bound
            }
        }
    }

    /// Returns `Some(status)` when a phase failed, logging why.
    fn failed_phase(
        result: Result<AdminResponse, AdminError>,
        name: &str,
        message: &str,
    ) -> Option<Option<u16>> {
        match result {
            Ok(response) if response.is_success() => None,
            Ok(response) => {
                error!(status = response.status, name = name, "{}", message);
                Some(Some(response.status))
            }
            Err(err) => {
                error!(error = err.to_string(), name = name, "{}", message);
                Some(None)
            }
        }
    }

    /// Finds an exchange of the virtual host by exact name.
    pub async fn find_exchange(&self, name: &str) -> Result<Option<Exchange>, AdminError> {
        let exchanges = self.admin.list_exchanges().await?;
        Ok(exchanges
            .into_iter()
            .find(|e| e.vhost == self.cfg.vhost && e.name == name))
    }

    /// Extracts the flattened schema of an exchange, reporting every failure.
    pub async fn try_schema_for_exchange(&self, name: &str) -> Result<Schema, AdminError> {
        let exchange = self
            .find_exchange(name)
            .await?
            .ok_or_else(|| AdminError::ExchangeNotFound(name.to_owned()))?;

        let descriptor = exchange
            .schema_descriptor()
            .ok_or_else(|| AdminError::SchemaMissing(name.to_owned()))?;

        schema_from_descriptor(descriptor, &self.cfg.timestamp_attribute)
    }
}

impl RabbitTopology<HttpBrokerAdmin> {
    /// Creates a topology manager talking to the management API described by `cfg`.
    pub fn from_configs(cfg: TopologyConfigs) -> Result<Self, AdminError> {
        let admin = HttpBrokerAdmin::new(&cfg)?;
        Ok(RabbitTopology::new(cfg, Arc::new(admin)))
    }
}

#[async_trait]
impl<A: BrokerAdmin> Topology for RabbitTopology<A> {
    async fn is_alive(&self) -> String {
        match self.admin.aliveness_test(&self.cfg.vhost).await {
            Ok(status) => status.status,
            Err(err) => {
                error!(
                    error = err.to_string(),
                    vhost = self.cfg.vhost.as_str(),
                    "aliveness test failed"
                );
                format!("{} {}", ALIVENESS_FAILURE_MARKER, err)
            }
        }
    }

    async fn create_queue_with_key(&self, name: &str, exchange: &str, routing_key: &str) -> bool {
        self.provision_queue(name, exchange, routing_key)
            .await
            .is_success()
    }

    async fn delete_queue(&self, name: &str) -> Result<AdminResponse, AdminError> {
        debug!("deleting queue: {}", name);
        self.admin.delete_queue(&self.cfg.vhost, name).await
    }

    async fn delete_all_queues(&self) -> Result<(), AdminError> {
        for name in self.list_queues().await? {
            self.delete_queue(&name).await?;
        }
        Ok(())
    }

    async fn list_queues_of(&self, exchange: &str) -> Result<Vec<String>, AdminError> {
        let (queues, bindings) = futures_util::try_join!(
            self.queue_names(),
            self.admin.list_bindings(&self.cfg.vhost)
        )?;

        let known: HashSet<String> = queues.into_iter().collect();
        let mut seen = HashSet::new();

        // a queue bound under several routing keys is reported once
        Ok(bindings
            .into_iter()
            .filter(|b| b.source == exchange)
            .filter(|b| known.contains(&b.destination))
            .map(|b| b.destination)
            .filter(|name| seen.insert(name.clone()))
            .collect())
    }

    async fn queue_names(&self) -> Result<Vec<String>, AdminError> {
        Ok(self
            .admin
            .list_queues()
            .await?
            .into_iter()
            .filter(|q| q.vhost == self.cfg.vhost)
            .map(|q| q.name)
            .collect())
    }

    async fn create_exchange_with(
        &self,
        name: &str,
        kind: ExchangeKind,
        routing_key: &str,
    ) -> bool {
        self.provision_exchange(name, kind, routing_key)
            .await
            .is_success()
    }

    async fn delete_exchange(&self, name: &str) -> Result<AdminResponse, AdminError> {
        debug!("deleting exchange: {}", name);
        self.admin.delete_exchange(&self.cfg.vhost, name).await
    }

    async fn delete_all_exchanges(&self) -> Result<(), AdminError> {
        for name in self.list_exchange_names().await? {
            self.delete_exchange(&name).await?;
        }
        Ok(())
    }

    async fn list_exchanges(&self) -> Result<Vec<Exchange>, AdminError> {
        let exchanges = self.admin.list_exchanges().await?;
        Ok(exchanges
            .into_iter()
            .filter(|e| e.vhost == self.cfg.vhost && self.is_managed(&e.name))
            .collect())
    }

    async fn list_exchange_names(&self) -> Result<Vec<String>, AdminError> {
        Ok(self
            .list_exchanges()
            .await?
            .into_iter()
            .map(|e| e.name)
            .collect())
    }

    async fn schema_for_exchange(&self, name: &str) -> Result<Schema, AdminError> {
        match self.try_schema_for_exchange(name).await {
            Ok(schema) => Ok(schema),
            Err(AdminError::SchemaMissing(_)) => {
                warn!(name = name, "exchange has no schema argument");
                Ok(Schema::new())
            }
            Err(AdminError::SchemaParse(err)) => {
                error!(error = err, name = name, "failure to parse exchange schema");
                Ok(Schema::new())
            }
            Err(err) => Err(err),
        }
    }

    fn exchange_name(&self) -> &str {
        &self.cfg.exchange_name
    }

    fn output_exchange_name(&self) -> &str {
        &self.cfg.output_exchange_name
    }
}
