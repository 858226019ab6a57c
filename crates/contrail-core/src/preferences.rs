//! Per-player preference storage seam.
//!
//! The core only needs key/value semantics over [`Preference`] records:
//! read with a default, overwrite, and flush to durable storage. Writes go
//! to memory immediately; [`PreferenceStore::flush`] is the only fallible
//! step, and callers log its failure instead of undoing the in-memory
//! change.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use contrail_types::{PlayerId, Preference};

/// Errors that can occur when persisting preferences.
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    /// Reading or writing the backing file failed.
    #[error("preference file {path} I/O error: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The backing file could not be encoded or decoded.
    #[error("preference YAML error: {source}")]
    Yaml {
        /// The underlying YAML error.
        #[from]
        source: serde_yml::Error,
    },

    /// The store refused the write for another reason.
    #[error("preference store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// Key/value store of per-player [`Preference`] records.
pub trait PreferenceStore: Send + Sync {
    /// The stored preference, or `{enabled: false, variant: None}` if the
    /// player has none.
    fn get(&self, player: PlayerId) -> Preference;

    /// Overwrite the player's preference in memory.
    fn set(&self, player: PlayerId, preference: Preference);

    /// Persist all in-memory changes.
    ///
    /// # Errors
    ///
    /// Returns [`PreferenceError`] if the backing storage rejects the write.
    fn flush(&self) -> Result<(), PreferenceError>;
}

/// A [`PreferenceStore`] that lives only in memory.
///
/// Counts flushes, and can be told to fail them, so tests can observe the
/// persistence protocol.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: RwLock<BTreeMap<PlayerId, Preference>>,
    flushes: AtomicU64,
    fail_flush: AtomicBool,
}

impl MemoryPreferenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful flushes so far.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Acquire)
    }

    /// Make subsequent flushes fail (or succeed again).
    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::Release);
    }

    /// Number of players with a stored preference.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no preference has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, player: PlayerId) -> Preference {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&player)
            .copied()
            .unwrap_or_default()
    }

    fn set(&self, player: PlayerId, preference: Preference) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(player, preference);
    }

    fn flush(&self) -> Result<(), PreferenceError> {
        if self.fail_flush.load(Ordering::Acquire) {
            return Err(PreferenceError::Unavailable {
                message: "flush disabled".to_owned(),
            });
        }
        self.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use contrail_types::Variant;

    use super::*;

    #[test]
    fn missing_player_reads_as_disabled() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(store.get(PlayerId::new()), Preference::default());
        assert!(store.is_empty());
    }

    #[test]
    fn set_overwrites() {
        let store = MemoryPreferenceStore::new();
        let player = PlayerId::new();
        store.set(player, Preference::enabled(Some(Variant::Rainbow)));
        store.set(player, Preference::enabled(Some(Variant::Cloud)));
        assert_eq!(store.get(player).variant, Some(Variant::Cloud));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn flush_can_be_failed() {
        let store = MemoryPreferenceStore::new();
        assert!(store.flush().is_ok());
        store.set_fail_flush(true);
        assert!(matches!(
            store.flush(),
            Err(PreferenceError::Unavailable { .. })
        ));
        assert_eq!(store.flush_count(), 1);
    }
}
