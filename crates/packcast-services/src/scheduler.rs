//! Delivery scheduler: decides whether to push a pack, and when.
//!
//! Every attempt runs [`DELIVERY_DELAY`] after it is requested, on the
//! blocking worker pool, never on the caller's thread. The host's own
//! connect negotiation has to settle before decline status or the push
//! primitive mean anything.
//!
//! Per (client, pack) the only state kept here is the hash last offered.
//! Accepted/declined is asked of the host live each time.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use packcast_core::{ClientId, PackRecord};
use tokio::task::JoinHandle;

use crate::host::{HashForm, Host, HostCapabilities, HostError};
use crate::session::DeliveryState;

/// Delay between a trigger and the delivery attempt (about four 50 ms host
/// ticks).
pub const DELIVERY_DELAY: Duration = Duration::from_millis(200);

/// Why a target was not pushed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not forced, and the client already holds some pack.
    HasPack,
    /// The same hash was already offered to this client.
    AlreadyOffered,
    /// The client declined; remembered as offered until it reconnects.
    Declined,
    /// Connect-time check: the client has not declined, nothing to redo.
    NotDeclined,
}

enum Delivered {
    Pushed,
    Skipped(SkipReason),
}

/// Per-target outcome of one delivery batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub pack: String,
    pub pushed: Vec<ClientId>,
    pub skipped: Vec<(ClientId, SkipReason)>,
    pub failed: Vec<(ClientId, String)>,
}

impl BatchReport {
    fn new(pack: &str) -> Self {
        Self {
            pack: pack.to_string(),
            ..Self::default()
        }
    }

    fn aborted(pack: &str, targets: &[ClientId], reason: &str) -> Self {
        Self {
            pack: pack.to_string(),
            failed: targets.iter().map(|c| (*c, reason.to_string())).collect(),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// One failure line for the invoker, if anything failed.
    pub fn summary(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        Some(format!(
            "Failed to apply pack {} to {} client(s)",
            self.pack,
            self.failed.len()
        ))
    }
}

/// A scheduled batch. Returned immediately; await [`ApplyHandle::outcome`]
/// for the per-target report.
pub struct ApplyHandle {
    pack: String,
    targets: Vec<ClientId>,
    task: JoinHandle<BatchReport>,
}

impl ApplyHandle {
    pub fn pack(&self) -> &str {
        &self.pack
    }

    pub fn targets(&self) -> &[ClientId] {
        &self.targets
    }

    pub async fn outcome(self) -> BatchReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => BatchReport::aborted(&self.pack, &self.targets, &e.to_string()),
        }
    }
}

/// Schedules pushes to clients and tracks what each was last offered.
#[derive(Clone)]
pub struct DeliveryScheduler {
    inner: Arc<Delivery>,
}

struct Delivery {
    host: Arc<dyn Host>,
    state: DeliveryState,
    caps: HostCapabilities,
}

impl DeliveryScheduler {
    /// Host capabilities are read here, once.
    pub fn new(host: Arc<dyn Host>, state: DeliveryState) -> Self {
        let caps = host.capabilities();
        tracing::info!(
            hex_hash_push = caps.hex_hash_push,
            has_pack_query = caps.has_pack_query,
            status_query = caps.status_query,
            "host capabilities resolved"
        );
        Self {
            inner: Arc::new(Delivery { host, state, caps }),
        }
    }

    pub fn state(&self) -> &DeliveryState {
        &self.inner.state
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.inner.caps
    }

    /// A client connected. `default` is the pack currently configured for
    /// everyone.
    ///
    /// The client's last offered hash is set to the default's hash (or
    /// cleared) right away. With a default configured, a delayed check
    /// re-pushes it if the client has declined by then.
    pub fn on_client_connect(
        &self,
        client: ClientId,
        default: Option<PackRecord>,
    ) -> Option<ApplyHandle> {
        let Some(record) = default else {
            self.inner.state.set_last_offered(&client, None);
            return None;
        };
        let hash = record.hash;
        let handle = self.schedule(vec![client], record, |d, client, record| {
            d.redeliver_if_declined(client, record)
        });
        self.inner.state.set_last_offered(&client, Some(hash));
        Some(handle)
    }

    /// Offer `record` to every target after the delivery delay.
    ///
    /// Targets are handled independently; one failing does not stop the
    /// rest.
    pub fn apply_to(&self, targets: Vec<ClientId>, record: PackRecord, force: bool) -> ApplyHandle {
        tracing::debug!(
            pack = %record.name,
            targets = targets.len(),
            force,
            "delivery batch scheduled"
        );
        self.schedule(targets, record, move |d, client, record| {
            d.offer(client, record, force)
        })
    }

    fn schedule<F>(&self, targets: Vec<ClientId>, record: PackRecord, step: F) -> ApplyHandle
    where
        F: Fn(&Delivery, &ClientId, &PackRecord) -> Result<Delivered, HostError> + Send + 'static,
    {
        let inner = self.inner.clone();
        let pack = record.name.clone();
        let batch_targets = targets.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(DELIVERY_DELAY).await;
            let name = record.name.clone();
            let all_targets = batch_targets.clone();
            let batch = tokio::task::spawn_blocking(move || {
                inner.run_batch(&batch_targets, &record, step)
            });
            match batch.await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(pack = %name, error = %e, "delivery batch aborted");
                    BatchReport::aborted(&name, &all_targets, &e.to_string())
                }
            }
        });

        ApplyHandle {
            pack,
            targets,
            task,
        }
    }
}

impl Delivery {
    fn run_batch<F>(&self, targets: &[ClientId], record: &PackRecord, step: F) -> BatchReport
    where
        F: Fn(&Delivery, &ClientId, &PackRecord) -> Result<Delivered, HostError>,
    {
        let mut report = BatchReport::new(&record.name);
        for client in targets {
            let result = panic::catch_unwind(AssertUnwindSafe(|| step(self, client, record)))
                .unwrap_or_else(|payload| Err(HostError::Other(panic_message(payload))));
            match result {
                Ok(Delivered::Pushed) => report.pushed.push(*client),
                Ok(Delivered::Skipped(reason)) => {
                    tracing::debug!(client = %client, pack = %record.name, ?reason, "push skipped");
                    report.skipped.push((*client, reason));
                }
                Err(e) => {
                    tracing::warn!(
                        client = %client,
                        pack = %record.name,
                        error = %e,
                        "failed to deliver pack"
                    );
                    report.failed.push((*client, e.to_string()));
                }
            }
        }
        report
    }

    /// Explicit apply. A decline or an existing pack still counts as
    /// offered, so repeated applies do not nag the client.
    fn offer(&self, client: &ClientId, record: &PackRecord, force: bool) -> Result<Delivered, HostError> {
        if !force && self.has_pack(client)? {
            self.state.set_last_offered(client, Some(record.hash));
            return Ok(Delivered::Skipped(SkipReason::HasPack));
        }

        let session = self.state.get_session(client);
        let delivered = if session.last_offered == Some(record.hash) {
            Delivered::Skipped(SkipReason::AlreadyOffered)
        } else if self.is_declined(client)? {
            Delivered::Skipped(SkipReason::Declined)
        } else {
            self.push(client, record)?;
            Delivered::Pushed
        };

        self.state.set_last_offered(client, Some(record.hash));
        Ok(delivered)
    }

    /// Connect-time check: only a client that declined gets the pack again.
    fn redeliver_if_declined(&self, client: &ClientId, record: &PackRecord) -> Result<Delivered, HostError> {
        if !self.is_declined(client)? {
            return Ok(Delivered::Skipped(SkipReason::NotDeclined));
        }
        self.push(client, record)?;
        Ok(Delivered::Pushed)
    }

    fn push(&self, client: &ClientId, record: &PackRecord) -> Result<(), HostError> {
        if self.caps.hex_hash_push {
            let hex = record.hash.to_hex();
            match self.host.push_pack(client, &record.url, HashForm::Hex(&hex)) {
                Err(HostError::Incompatible) => {
                    tracing::debug!(client = %client, "hex hash rejected, pushing binary form");
                }
                Err(e) => return Err(e),
                Ok(()) => {
                    tracing::info!(client = %client, pack = %record.name, "pack pushed");
                    return Ok(());
                }
            }
        }
        self.host
            .push_pack(client, &record.url, HashForm::Binary(*record.hash.as_bytes()))?;
        tracing::info!(client = %client, pack = %record.name, "pack pushed (binary hash)");
        Ok(())
    }

    fn has_pack(&self, client: &ClientId) -> Result<bool, HostError> {
        if !self.caps.has_pack_query {
            return Ok(false);
        }
        match self.host.has_pack(client) {
            Err(HostError::Unsupported) => Ok(false),
            other => other,
        }
    }

    fn is_declined(&self, client: &ClientId) -> Result<bool, HostError> {
        if !self.caps.status_query {
            return Ok(false);
        }
        match self.host.is_declined(client) {
            Err(HostError::Unsupported) => Ok(false),
            other => other,
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
