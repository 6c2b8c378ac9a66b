//! Pack registry: named pack records kept in the configuration document.
//!
//! Layout inside the document:
//!
//! ```toml
//! [packs.lobby]
//! url = "https://example/pack.zip"
//! hash = "a9993e364706816aba3e25717850c26c9cd0d89d"
//! ```
//!
//! The default pack offered on connect lives in the same table under
//! [`DEFAULT_PACK_NAME`]. A record missing its url or hash is never stored:
//! such writes become removals.

use std::sync::Arc;

use packcast_core::PackRecord;
use thiserror::Error;

use crate::document::{ConfigDocument, DocumentError};

/// Reserved record name holding the pack offered on connect.
pub const DEFAULT_PACK_NAME: &str = "server-resourcepack";

const PACKS_SECTION: &str = "packs";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid pack name {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Named pack records backed by a [`ConfigDocument`].
#[derive(Clone)]
pub struct PackRegistry {
    doc: Arc<dyn ConfigDocument>,
}

impl PackRegistry {
    pub fn new(doc: Arc<dyn ConfigDocument>) -> Self {
        Self { doc }
    }

    /// Reject names that cannot be stored.
    pub fn check_name(name: &str) -> Result<(), RegistryError> {
        validate_name(name)
    }

    /// Look up a record. Half-populated or malformed entries read as absent.
    pub fn lookup(&self, name: &str) -> Option<PackRecord> {
        if validate_name(name).is_err() {
            return None;
        }
        let url = self.doc.get(&field_path(name, "url"));
        let hash = self.doc.get(&field_path(name, "hash"));
        let record = PackRecord::assemble(name, url.as_deref(), hash.as_deref());
        if record.is_none() && (url.is_some() || hash.is_some()) {
            tracing::debug!(pack = name, "ignoring incomplete pack record");
        }
        record
    }

    /// Store a record, replacing any previous one under the same name.
    pub fn upsert(&self, record: &PackRecord) -> Result<(), RegistryError> {
        validate_name(&record.name)?;
        let url_path = field_path(&record.name, "url");
        let hash_path = field_path(&record.name, "hash");
        let hash = record.hash.to_hex();
        self.doc.update(&[
            (url_path.as_str(), Some(record.url.as_str())),
            (hash_path.as_str(), Some(hash.as_str())),
        ])?;
        tracing::info!(pack = %record.name, hash = %record.hash, "pack record stored");
        Ok(())
    }

    /// Store a record assembled from possibly-absent fields. Anything short
    /// of a complete record removes the name instead.
    pub fn upsert_parts(
        &self,
        name: &str,
        url: Option<&str>,
        hash: Option<&str>,
    ) -> Result<Option<PackRecord>, RegistryError> {
        validate_name(name)?;
        match PackRecord::assemble(name, url, hash) {
            Some(record) => {
                self.upsert(&record)?;
                Ok(Some(record))
            }
            None => {
                self.remove(name)?;
                Ok(None)
            }
        }
    }

    pub fn remove(&self, name: &str) -> Result<(), RegistryError> {
        validate_name(name)?;
        self.doc.update(&[(section_path(name).as_str(), None)])?;
        tracing::info!(pack = name, "pack record removed");
        Ok(())
    }

    /// Every name with an entry in the document, sorted. Includes the
    /// default slot when set.
    pub fn names(&self) -> Vec<String> {
        self.doc.keys(PACKS_SECTION)
    }

    pub fn default_pack(&self) -> Option<PackRecord> {
        self.lookup(DEFAULT_PACK_NAME)
    }

    /// Copy the named record into the default slot, or clear the slot when
    /// `name` is `None` or names no valid record.
    pub fn set_default(&self, name: Option<&str>) -> Result<Option<PackRecord>, RegistryError> {
        let source = name.and_then(|n| self.lookup(n));
        let url = source.as_ref().map(|r| r.url.clone());
        let hash = source.as_ref().map(|r| r.hash.to_hex());
        self.upsert_parts(DEFAULT_PACK_NAME, url.as_deref(), hash.as_deref())
    }
}

fn section_path(name: &str) -> String {
    format!("{PACKS_SECTION}.{name}")
}

fn field_path(name: &str, field: &str) -> String {
    format!("{PACKS_SECTION}.{name}.{field}")
}

/// Names become document path segments, so they cannot be empty or dotted.
fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() || name.contains('.') || name.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}
