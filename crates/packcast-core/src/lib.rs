//! packcast-core — shared pack types, digests, and configuration.
//! All other packcast crates depend on this one.

pub mod client;
pub mod config;
pub mod digest;
pub mod pack;

pub use client::ClientId;
pub use digest::PackHash;
pub use pack::{PackMeta, PackRecord};
