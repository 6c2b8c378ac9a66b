//! Configuration document: the persisted key-value store behind the
//! pack registry.
//!
//! Values are addressed by dotted paths (`packs.lobby.url`). Writing `None`
//! removes the node at that path, subtree included, and prunes any parent
//! tables left empty. Nothing reaches disk until [`ConfigDocument::save`]
//! or [`ConfigDocument::update`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use toml::{Table, Value};

/// Distinguishes tmp files of concurrent saves.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    Write(PathBuf, std::io::Error),
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Read/write access to a persisted configuration document.
///
/// Implementations serialize writers: each [`ConfigDocument::update`] is
/// applied and persisted as one unit, so a reader never sees half of it
/// and an older snapshot never lands on disk after a newer one.
pub trait ConfigDocument: Send + Sync {
    /// String value at `path`, if present.
    fn get(&self, path: &str) -> Option<String>;

    /// Set the string at `path`, or remove the node when `value` is `None`.
    fn set(&self, path: &str, value: Option<&str>);

    /// Child keys of the table at `path` (`""` for the root), sorted.
    fn keys(&self, path: &str) -> Vec<String>;

    /// Persist pending changes.
    fn save(&self) -> Result<(), DocumentError>;

    /// Apply every `(path, value)` edit, in order, then persist.
    fn update(&self, edits: &[(&str, Option<&str>)]) -> Result<(), DocumentError>;
}

/// TOML-backed document. `in_memory()` documents never touch disk.
pub struct TomlDocument {
    root: Mutex<Table>,
    path: Option<PathBuf>,
}

impl TomlDocument {
    pub fn in_memory() -> Self {
        Self {
            root: Mutex::new(Table::new()),
            path: None,
        }
    }

    /// Open the document at `path`. A missing file is an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let path = path.into();
        let root = match std::fs::read_to_string(&path) {
            Ok(text) => text
                .parse::<Table>()
                .map_err(|e| DocumentError::Parse(path.clone(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::new(),
            Err(e) => return Err(DocumentError::Read(path, e)),
        };
        Ok(Self {
            root: Mutex::new(root),
            path: Some(path),
        })
    }
}

impl ConfigDocument for TomlDocument {
    fn get(&self, path: &str) -> Option<String> {
        let root = self.root.lock();
        let segments: Vec<&str> = path.split('.').collect();
        lookup(&root, &segments)?.as_str().map(str::to_string)
    }

    fn set(&self, path: &str, value: Option<&str>) {
        apply_edit(&mut self.root.lock(), path, value);
    }

    fn keys(&self, path: &str) -> Vec<String> {
        let root = self.root.lock();
        let table = if path.is_empty() {
            Some(&*root)
        } else {
            let segments: Vec<&str> = path.split('.').collect();
            lookup(&root, &segments).and_then(Value::as_table)
        };
        let mut keys: Vec<String> = table
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn save(&self) -> Result<(), DocumentError> {
        self.persist(&self.root.lock())
    }

    fn update(&self, edits: &[(&str, Option<&str>)]) -> Result<(), DocumentError> {
        let mut root = self.root.lock();
        for (path, value) in edits {
            apply_edit(&mut root, path, *value);
        }
        self.persist(&root)
    }
}

impl TomlDocument {
    /// Write `root` to disk. Callers hold the document lock, so saves land
    /// in the order their snapshots were taken.
    fn persist(&self, root: &Table) -> Result<(), DocumentError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let text = toml::to_string_pretty(root)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocumentError::Write(path.clone(), e))?;
        }

        // Atomic write: tmp file → rename
        let tmp_path = path.with_extension(format!(
            "tmp.{}.{}",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&tmp_path, text).map_err(|e| DocumentError::Write(tmp_path.clone(), e))?;
        std::fs::rename(&tmp_path, path).map_err(|e| DocumentError::Write(path.clone(), e))?;

        tracing::trace!(path = %path.display(), "document saved");
        Ok(())
    }
}

fn apply_edit(root: &mut Table, path: &str, value: Option<&str>) {
    let segments: Vec<&str> = path.split('.').collect();
    match value {
        Some(v) => insert_path(root, &segments, Value::String(v.to_string())),
        None => {
            remove_path(root, &segments);
        }
    }
}

fn lookup<'a>(table: &'a Table, segments: &[&str]) -> Option<&'a Value> {
    let (last, parents) = segments.split_last()?;
    let mut current = table;
    for segment in parents {
        current = current.get(*segment)?.as_table()?;
    }
    current.get(*last)
}

fn insert_path(table: &mut Table, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            table.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            if let Value::Table(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Remove the node at `segments`, pruning parents left empty.
fn remove_path(table: &mut Table, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [last] => table.remove(*last).is_some(),
        [head, rest @ ..] => {
            let Some(Value::Table(child)) = table.get_mut(*head) else {
                return false;
            };
            let removed = remove_path(child, rest);
            if child.is_empty() {
                table.remove(*head);
            }
            removed
        }
    }
}
