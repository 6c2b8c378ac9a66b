//! Delivery sessions: what each client was last told to fetch.
//!
//! Cached knowledge only, used to skip redundant pushes. Entries are keyed
//! by stable client identity and are never pruned on disconnect: a
//! returning client picks its entry back up, and the map is bounded by the
//! number of distinct clients seen since startup.

use std::sync::Arc;

use dashmap::DashMap;
use packcast_core::{ClientId, PackHash};

/// Snapshot of one client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySession {
    pub client: ClientId,
    /// `None`: nothing offered yet, or cleared because no default pack is
    /// configured.
    pub last_offered: Option<PackHash>,
}

/// The session table, shared across all delivery tasks.
///
/// Each write replaces the slot whole. Two tasks racing on one client end
/// with whichever wrote last.
#[derive(Clone, Default)]
pub struct DeliveryState {
    sessions: Arc<DashMap<ClientId, Option<PackHash>>>,
}

impl DeliveryState {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Current session for `client`, creating an empty one on first sight.
    pub fn get_session(&self, client: &ClientId) -> DeliverySession {
        let last_offered = *self.sessions.entry(*client).or_insert(None);
        DeliverySession {
            client: *client,
            last_offered,
        }
    }

    pub fn set_last_offered(&self, client: &ClientId, hash: Option<PackHash>) {
        self.sessions.insert(*client, hash);
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
