//! packcast-services — pack delivery and verification.
//!
//! The host (the process that owns client connections) drives this crate
//! through [`PackManager`]: it reports client connects, and its command
//! front-end registers packs and applies them to resolved client lists.

pub mod document;
pub mod host;
pub mod manager;
pub mod registration;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod session;

pub use document::{ConfigDocument, TomlDocument};
pub use host::{HashForm, Host, HostCapabilities, HostError};
pub use manager::{ApplyError, PackManager};
pub use registration::{register_pack, RegisterError, Registered};
pub use registry::{PackRegistry, RegistryError, DEFAULT_PACK_NAME};
pub use resolver::{DownloadResult, PackResolver, ResolveError, ResolvedPack};
pub use scheduler::{ApplyHandle, BatchReport, DeliveryScheduler, SkipReason, DELIVERY_DELAY};
pub use session::{DeliverySession, DeliveryState};
