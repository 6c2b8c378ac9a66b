//! Pack records and pack metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::PackHash;

/// A named pack: where clients fetch it from and the digest they verify.
///
/// Records are replaced whole, never edited field by field. A record with a
/// missing url or hash does not exist; see [`PackRecord::assemble`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackRecord {
    pub name: String,
    pub url: String,
    pub hash: PackHash,
}

impl PackRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>, hash: PackHash) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            hash,
        }
    }

    /// Build a record from stored fields. Returns `None` unless both the url
    /// and a well-formed hash are present.
    pub fn assemble(name: &str, url: Option<&str>, hash: Option<&str>) -> Option<Self> {
        let url = url.map(str::trim).filter(|u| !u.is_empty())?;
        let hash = PackHash::from_hex(hash?).ok()?;
        Some(Self::new(name, url, hash))
    }
}

/// Metadata embedded in a pack archive (`pack.mcmeta`).
///
/// Informational only. A pack whose metadata cannot be read still
/// registers, with `PackMeta::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackMeta {
    pub pack_format: Option<u32>,
    /// Plain-text description. Text components are flattened.
    pub description: String,
}

#[derive(Deserialize)]
struct McMeta {
    pack: McMetaPack,
}

#[derive(Deserialize)]
struct McMetaPack {
    #[serde(default)]
    pack_format: Option<u32>,
    #[serde(default)]
    description: Value,
}

impl PackMeta {
    /// Name of the metadata entry at the archive root.
    pub const ENTRY_NAME: &'static str = "pack.mcmeta";

    /// Parse the JSON body of a `pack.mcmeta` entry.
    pub fn from_mcmeta(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
        let meta: McMeta = serde_json::from_slice(raw)?;
        let mut description = String::new();
        flatten_text(&meta.pack.description, &mut description);
        Ok(Self {
            pack_format: meta.pack.pack_format,
            description,
        })
    }
}

/// Flatten a JSON text component (string, `{"text", "extra"}` object, or
/// array of components) into plain text.
fn flatten_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(parts) => {
            for part in parts {
                flatten_text(part, out);
            }
        }
        Value::Object(map) => {
            if let Some(text) = map.get("text").or_else(|| map.get("translate")) {
                flatten_text(text, out);
            }
            if let Some(extra) = map.get("extra") {
                flatten_text(extra, out);
            }
        }
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => {}
    }
}
