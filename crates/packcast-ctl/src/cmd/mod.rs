//! CLI command modules.

pub mod packs;
