//! Pack registration: download and hash a url, then store the record.

use packcast_core::{PackMeta, PackRecord};
use thiserror::Error;

use crate::registry::{PackRegistry, RegistryError, DEFAULT_PACK_NAME};
use crate::resolver::{PackResolver, ResolveError};

/// A stored registration.
#[derive(Debug, Clone)]
pub struct Registered {
    pub record: PackRecord,
    pub meta: PackMeta,
    pub size: u64,
}

impl Registered {
    /// Human-readable pack description. Empty when the pack carried none.
    pub fn description(&self) -> &str {
        &self.meta.description
    }
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("{DEFAULT_PACK_NAME} is reserved for the default pack")]
    Reserved,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Resolve `url` and store it under `name`.
///
/// Nothing is written unless the download succeeds. A pack without
/// readable metadata still registers.
pub async fn register_pack(
    resolver: &PackResolver,
    registry: &PackRegistry,
    name: &str,
    url: &str,
) -> Result<Registered, RegisterError> {
    if name == DEFAULT_PACK_NAME {
        return Err(RegisterError::Reserved);
    }
    PackRegistry::check_name(name)?;

    let resolved = resolver.resolve(url).await?;
    let record = PackRecord::new(name, resolved.url, resolved.hash);
    registry.upsert(&record)?;

    tracing::info!(
        pack = name,
        hash = %record.hash,
        bytes = resolved.size,
        description = %resolved.meta.description,
        "pack registered"
    );
    Ok(Registered {
        record,
        meta: resolved.meta,
        size: resolved.size,
    })
}
