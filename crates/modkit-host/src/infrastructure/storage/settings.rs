//! The settings store: per-module settings with JSON persistence.
//!
//! The store owns the in-memory settings table (a mapping from module
//! identity to a key/value map) and mirrors it to an indented JSON file
//! after every mutation.
//!
//! # Persistence is best-effort by design
//!
//! An automation host must not crash because a disk write failed.  `save()`
//! logs failures and returns; `load_and_merge()` tolerates a missing or
//! corrupt file by leaving the in-memory defaults untouched.  The in-memory
//! table is always authoritative.
//!
//! # Merge rules
//!
//! Persisted values are merged exactly once, after discovery has populated
//! every module's declared defaults:
//!
//! - A persisted value for a known key of a known module overrides the
//!   default.
//! - Unknown module identities and unknown setting keys in the file are
//!   ignored; the file can never invent schema entries at runtime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

use modkit_core::{ModuleId, SettingValue, SettingsMap};

/// The whole in-memory settings table: module identity → settings map.
pub type SettingsTable = HashMap<ModuleId, SettingsMap>;

/// Error type for settings-file operations.  Internal only: the public
/// surface degrades to warnings instead of surfacing these.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON content could not be parsed.
    #[error("failed to parse settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Per-module settings with write-through JSON persistence.
pub struct SettingsStore {
    path: PathBuf,
    table: Mutex<SettingsTable>,
}

impl SettingsStore {
    /// Creates an empty store backed by the given file path.  Nothing is
    /// read until [`load_and_merge`](Self::load_and_merge).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: Mutex::new(SettingsTable::new()),
        }
    }

    /// Registers a module's declared defaults.  Called once per module
    /// during discovery, before the persisted merge.
    pub fn register_defaults(&self, identity: &str, defaults: SettingsMap) {
        self.lock().insert(identity.to_string(), defaults);
    }

    /// Merges the persisted file over the in-memory defaults.
    ///
    /// Missing file: quiet no-op.  Corrupt file or I/O failure: warning,
    /// defaults stay authoritative.
    pub fn load_and_merge(&self) {
        let saved = match self.read_file() {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                debug!(path = %self.path.display(), "no settings file yet; using defaults");
                return;
            }
            Err(e) => {
                warn!("could not load settings: {e}");
                return;
            }
        };

        let mut table = self.lock();
        for (identity, saved_map) in saved {
            let Some(known) = table.get_mut(&identity) else {
                continue; // module no longer installed; drop its entry
            };
            for (key, value) in saved_map {
                if let Some(slot) = known.get_mut(&key) {
                    *slot = value;
                }
            }
        }
        info!(path = %self.path.display(), "settings loaded");
    }

    /// Serializes the whole table to disk, overwriting previous contents.
    /// Failures are logged, never raised.
    pub fn save(&self) {
        let snapshot = self.lock().clone();
        if let Err(e) = self.write_file(&snapshot) {
            warn!("could not save settings: {e}");
        }
    }

    /// The file this store persists to.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Returns a copy of one module's current settings.
    pub fn get(&self, identity: &str) -> Option<SettingsMap> {
        self.lock().get(identity).cloned()
    }

    /// Whether `identity` is known and carries `key`.
    pub fn has_key(&self, identity: &str, key: &str) -> bool {
        self.lock()
            .get(identity)
            .is_some_and(|map| map.contains_key(key))
    }

    /// Sets one known key of one known module, without persisting.
    /// Returns whether the change was applied.
    pub fn set(&self, identity: &str, key: &str, value: SettingValue) -> bool {
        let mut table = self.lock();
        match table.get_mut(identity).and_then(|map| map.get_mut(key)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Sets one key and persists.  Unknown identity or key: no-op, `false`.
    pub fn update_one(&self, identity: &str, key: &str, value: SettingValue) -> bool {
        if !self.set(identity, key, value) {
            return false;
        }
        self.save();
        true
    }

    /// Applies a batch of changes to one module and persists.
    ///
    /// Returns `true` whenever the identity is known, even if every
    /// supplied key was unknown or unchanged, because the batch path is
    /// the uniform "apply configuration" trigger for the caller.
    pub fn update_many(&self, identity: &str, changes: SettingsMap) -> bool {
        {
            let mut table = self.lock();
            let Some(known) = table.get_mut(identity) else {
                return false;
            };
            for (key, value) in changes {
                if let Some(slot) = known.get_mut(&key) {
                    *slot = value;
                }
            }
        }
        self.save();
        true
    }

    /// Returns a copy of the full table (for the catalog DTO).
    pub fn snapshot(&self) -> SettingsTable {
        self.lock().clone()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn lock(&self) -> std::sync::MutexGuard<'_, SettingsTable> {
        // A panicking writer must not wedge every later settings access.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads and parses the settings file.  `Ok(None)` when absent.
    fn read_file(&self) -> Result<Option<SettingsTable>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn write_file(&self, table: &SettingsTable) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }
        let content = serde_json::to_string_pretty(table)?;
        std::fs::write(&self.path, content).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
