//! Pack manager: the surface a host's command front-end talks to.
//!
//! Wires the registry, resolver and scheduler together. Target selection
//! (turning "@a" or a player name into client ids) and permission checks
//! stay with the front-end.

use std::sync::Arc;

use packcast_core::config::PackcastConfig;
use packcast_core::{ClientId, PackRecord};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::document::ConfigDocument;
use crate::host::Host;
use crate::registration::{register_pack, RegisterError, Registered};
use crate::registry::{PackRegistry, RegistryError};
use crate::resolver::{PackResolver, ResolveError};
use crate::scheduler::{ApplyHandle, DeliveryScheduler};
use crate::session::DeliveryState;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("no pack registered as {0}")]
    NotRegistered(String),
    #[error("no target clients")]
    NoTargets,
}

#[derive(Clone)]
pub struct PackManager {
    registry: PackRegistry,
    resolver: PackResolver,
    scheduler: DeliveryScheduler,
}

impl PackManager {
    pub fn new(registry: PackRegistry, resolver: PackResolver, scheduler: DeliveryScheduler) -> Self {
        Self {
            registry,
            resolver,
            scheduler,
        }
    }

    /// Build a manager from configuration, a host, and the document the
    /// registry lives in.
    pub fn from_config(
        config: &PackcastConfig,
        host: Arc<dyn Host>,
        doc: Arc<dyn ConfigDocument>,
    ) -> Result<Self, ResolveError> {
        let resolver = PackResolver::new(&config.resolver)?;
        let scheduler = DeliveryScheduler::new(host, DeliveryState::new());
        Ok(Self::new(PackRegistry::new(doc), resolver, scheduler))
    }

    pub fn registry(&self) -> &PackRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &DeliveryScheduler {
        &self.scheduler
    }

    /// Download, hash and store a pack in the background. The caller
    /// attaches to the returned handle instead of blocking on it.
    pub fn register_pack(
        &self,
        name: &str,
        url: &str,
    ) -> JoinHandle<Result<Registered, RegisterError>> {
        let resolver = self.resolver.clone();
        let registry = self.registry.clone();
        let name = name.to_string();
        let url = url.to_string();
        tokio::spawn(async move { register_pack(&resolver, &registry, &name, &url).await })
    }

    pub fn unregister_pack(&self, name: &str) -> Result<(), RegistryError> {
        self.registry.remove(name)
    }

    /// Point the default pack at `name`, or clear it.
    pub fn set_default_pack(&self, name: Option<&str>) -> Result<Option<PackRecord>, RegistryError> {
        let default = self.registry.set_default(name)?;
        match &default {
            Some(record) => tracing::info!(hash = %record.hash, source = ?name, "default pack set"),
            None => tracing::info!("default pack cleared"),
        }
        Ok(default)
    }

    pub fn list_packs(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn lookup(&self, name: &str) -> Option<PackRecord> {
        self.registry.lookup(name)
    }

    /// Apply the named pack to `targets`. `force` pushes even to clients
    /// already holding some pack.
    ///
    /// Returns as soon as the batch is scheduled; the handle carries the
    /// per-target outcome.
    pub fn apply_to(
        &self,
        targets: Vec<ClientId>,
        name: &str,
        force: bool,
    ) -> Result<ApplyHandle, ApplyError> {
        let record = self
            .registry
            .lookup(name)
            .ok_or_else(|| ApplyError::NotRegistered(name.to_string()))?;
        if targets.is_empty() {
            return Err(ApplyError::NoTargets);
        }
        Ok(self.scheduler.apply_to(targets, record, force))
    }

    /// The host saw `client` connect.
    pub fn on_client_connect(&self, client: ClientId) -> Option<ApplyHandle> {
        let default = self.registry.default_pack();
        self.scheduler.on_client_connect(client, default)
    }
}
