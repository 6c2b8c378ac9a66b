//! Host trait: the process that owns client connections.
//!
//! packcast never talks to clients itself. The host tells a client to
//! fetch a pack and answers two questions about each client: does it
//! already hold a pack, and did it decline the last offer. Older hosts
//! lack some of this, which they report once through
//! [`Host::capabilities`].

use packcast_core::digest::DIGEST_LEN;
use packcast_core::ClientId;
use thiserror::Error;

/// What the host supports. Read once when the scheduler is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Push accepts the hex text form of the hash. When false, only the
    /// 20-byte binary form is sent.
    pub hex_hash_push: bool,
    /// [`Host::has_pack`] is answerable.
    pub has_pack_query: bool,
    /// [`Host::is_declined`] is answerable.
    pub status_query: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            hex_hash_push: true,
            has_pack_query: true,
            status_query: true,
        }
    }
}

/// Encoding of the pack hash handed to the push primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashForm<'a> {
    /// 40 lowercase hex characters.
    Hex(&'a str),
    /// Raw digest, for clients that predate the hex form.
    Binary([u8; DIGEST_LEN]),
}

#[derive(Debug, Error)]
pub enum HostError {
    /// The client rejected the hex hash form.
    #[error("client protocol does not accept a hex pack hash")]
    Incompatible,
    /// The host cannot answer this query.
    #[error("query not supported by this host")]
    Unsupported,
    #[error("client {0} is not connected")]
    Disconnected(ClientId),
    #[error("{0}")]
    Other(String),
}

/// Host primitives consumed by the delivery scheduler.
///
/// Called from worker threads, never from the host's own client thread,
/// so implementations must be thread-safe.
pub trait Host: Send + Sync {
    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::default()
    }

    /// Instruct a client to fetch the pack at `url` and verify it against
    /// `hash`.
    fn push_pack(&self, client: &ClientId, url: &str, hash: HashForm<'_>) -> Result<(), HostError>;

    /// Whether the client currently holds any server-sent pack.
    fn has_pack(&self, client: &ClientId) -> Result<bool, HostError>;

    /// Whether the client's answer to the last offer was a decline.
    fn is_declined(&self, client: &ClientId) -> Result<bool, HostError>;
}
