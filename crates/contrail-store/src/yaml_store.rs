//! `players.yml` preference persistence.
//!
//! The file maps each player UUID to their trail preference:
//!
//! ```yaml
//! 5c1f0a3e-8a4b-4d53-9b8e-2f7d6c1a0b94:
//!   enabled: true
//!   type: cloud
//! ```
//!
//! The whole file is loaded at startup and held in memory. Mutations only
//! touch memory; [`YamlPreferenceStore::save`] writes a sibling temporary
//! file and renames it into place.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use contrail_core::preferences::{PreferenceError, PreferenceStore};
use contrail_types::{PlayerId, Preference, Variant};
use serde::Deserialize;

use crate::error::StoreError;

/// One entry as it appears on disk.
///
/// `type` is read as free text so a name this build does not know degrades
/// to "unset" (the configured default) instead of failing the whole load.
#[derive(Debug, Deserialize)]
struct StoredPreference {
    #[serde(default)]
    enabled: bool,
    #[serde(default, rename = "type")]
    variant: Option<String>,
}

impl StoredPreference {
    fn into_preference(self, player: PlayerId) -> Preference {
        let variant = self.variant.and_then(|name| {
            let parsed = name.parse::<Variant>();
            if let Err(e) = &parsed {
                tracing::warn!(player = %player, error = %e, "Unknown stored variant, using default");
            }
            parsed.ok()
        });
        Preference {
            enabled: self.enabled,
            variant,
        }
    }
}

/// A [`PreferenceStore`] backed by a YAML file.
#[derive(Debug)]
pub struct YamlPreferenceStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<PlayerId, Preference>>,
    dirty: AtomicBool,
    /// Held across snapshot, write, and rename so flushes never share the
    /// temporary file.
    write_lock: Mutex<()>,
}

impl YamlPreferenceStore {
    /// Load preferences from `path`. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    /// Returns [`StoreError::Yaml`] if its contents are not a valid
    /// preference map.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => parse(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No preference file yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        tracing::info!(
            path = %path.display(),
            players = entries.len(),
            "Loaded player preferences"
        );
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        })
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of players with a stored preference.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no preference is stored.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether memory holds changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Write every preference to disk, replacing the file atomically.
    ///
    /// Skips the write when nothing changed since the last save. Concurrent
    /// saves run one after another; a change made during a save is picked
    /// up by the next one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Yaml`] if encoding fails, or
    /// [`StoreError::Io`] if the temporary file cannot be written or
    /// renamed into place. The in-memory state is kept either way.
    pub fn save(&self) -> Result<(), StoreError> {
        let _write = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let result = self.write_file();
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    fn write_file(&self) -> Result<(), StoreError> {
        let yaml = {
            let entries = self.read();
            serde_yml::to_string(&*entries)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let tmp = self.path.with_extension("yml.tmp");
        fs::write(&tmp, yaml).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), "Saved player preferences");
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<PlayerId, Preference>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PreferenceStore for YamlPreferenceStore {
    fn get(&self, player: PlayerId) -> Preference {
        self.read().get(&player).copied().unwrap_or_default()
    }

    fn set(&self, player: PlayerId, preference: Preference) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(player, preference);
        self.dirty.store(true, Ordering::Release);
    }

    fn flush(&self) -> Result<(), PreferenceError> {
        self.save().map_err(PreferenceError::from)
    }
}

fn parse(contents: &str) -> Result<BTreeMap<PlayerId, Preference>, StoreError> {
    if contents.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let stored: Option<BTreeMap<PlayerId, StoredPreference>> = serde_yml::from_str(contents)?;
    Ok(stored
        .unwrap_or_default()
        .into_iter()
        .map(|(player, entry)| (player, entry.into_preference(player)))
        .collect())
}
