//! Configuration system for packcast.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PACKCAST_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/packcast/config.toml
//!   3. ~/.config/packcast/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackcastConfig {
    pub resolver: ResolverSettings,
    pub registry: RegistrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Whole-request timeout for a pack download.
    pub timeout_secs: u64,
    /// Largest pack body accepted. 0 = unlimited.
    pub max_pack_bytes: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// TOML document holding the `packs` table.
    pub document_path: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_pack_bytes: 262_144_000, // 250 MiB, the client-side cap
            user_agent: concat!("packcast/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            document_path: config_dir().join("packs.toml"),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("packcast")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PackcastConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::file_path())
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            PackcastConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PACKCAST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&PackcastConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply PACKCAST_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PACKCAST_RESOLVER__TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.resolver.timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("PACKCAST_RESOLVER__MAX_PACK_BYTES") {
            if let Ok(bytes) = v.parse() {
                self.resolver.max_pack_bytes = bytes;
            }
        }
        if let Ok(v) = std::env::var("PACKCAST_REGISTRY__DOCUMENT_PATH") {
            self.registry.document_path = PathBuf::from(v);
        }
    }
}
