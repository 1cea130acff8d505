//! Typed key/value persistence for resume pointers and UI preferences.

use crate::model::{PieceId, WorkId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PrefError {
    #[error("preference store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference store encoding failed: {0}")]
    Encode(String),
}

/// Keys understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefKey {
    /// Resume pointer, one per work instance.
    ResumePosition(WorkId),
    /// Global auto-scroll toggle.
    AutoScroll,
}

impl PrefKey {
    pub fn as_key(&self) -> String {
        match self {
            PrefKey::ResumePosition(work) => format!("audiobook-{work}-position"),
            PrefKey::AutoScroll => "auto-scroll".to_string(),
        }
    }
}

/// String key/value persistence that outlives a session.
pub trait PreferenceStore {
    fn get(&self, key: PrefKey) -> Option<String>;
    fn set(&mut self, key: PrefKey, value: String) -> Result<(), PrefError>;
}

/// In-process store; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: PrefKey) -> Option<&str> {
        self.values.get(&key.as_key()).map(String::as_str)
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: PrefKey) -> Option<String> {
        self.values.get(&key.as_key()).cloned()
    }

    fn set(&mut self, key: PrefKey, value: String) -> Result<(), PrefError> {
        self.values.insert(key.as_key(), value);
        Ok(())
    }
}

/// The last PlayableUnit that started playing for a work instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePointer {
    pub piece_id: PieceId,
    pub sequence: usize,
}

/// Typed view over a [`PreferenceStore`].
#[derive(Debug, Clone, Default)]
pub struct Preferences<S> {
    store: S,
}

impl<S: PreferenceStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resume_pointer(&self, work: WorkId) -> Option<ResumePointer> {
        let raw = self.store.get(PrefKey::ResumePosition(work))?;
        match serde_json::from_str(&raw) {
            Ok(pointer) => Some(pointer),
            Err(err) => {
                warn!(%work, value = %raw, "Ignoring unreadable resume pointer: {err}");
                None
            }
        }
    }

    pub fn save_resume_pointer(
        &mut self,
        work: WorkId,
        pointer: ResumePointer,
    ) -> Result<(), PrefError> {
        let value =
            serde_json::to_string(&pointer).map_err(|err| PrefError::Encode(err.to_string()))?;
        debug!(%work, piece_id = pointer.piece_id, sequence = pointer.sequence, "Saving resume pointer");
        self.store.set(PrefKey::ResumePosition(work), value)
    }

    /// Defaults to off when never set or unreadable.
    pub fn auto_scroll(&self) -> bool {
        match self.store.get(PrefKey::AutoScroll).as_deref() {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                warn!(value = %other, "Ignoring unreadable auto-scroll preference");
                false
            }
        }
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) -> Result<(), PrefError> {
        self.store.set(PrefKey::AutoScroll, enabled.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_per_work_instance() {
        assert_eq!(
            PrefKey::ResumePosition(WorkId(12)).as_key(),
            "audiobook-12-position"
        );
        assert_ne!(
            PrefKey::ResumePosition(WorkId(1)).as_key(),
            PrefKey::ResumePosition(WorkId(11)).as_key()
        );
        assert_eq!(PrefKey::AutoScroll.as_key(), "auto-scroll");
    }

    #[test]
    fn resume_pointer_round_trips_per_work() {
        let mut prefs = Preferences::new(MemoryStore::new());
        let pointer = ResumePointer {
            piece_id: 42,
            sequence: 7,
        };
        prefs.save_resume_pointer(WorkId(3), pointer).unwrap();

        assert_eq!(prefs.resume_pointer(WorkId(3)), Some(pointer));
        assert_eq!(prefs.resume_pointer(WorkId(4)), None);
    }

    #[test]
    fn unreadable_resume_pointer_is_absent() {
        let mut store = MemoryStore::new();
        store
            .set(PrefKey::ResumePosition(WorkId(1)), "1234".to_string())
            .unwrap();
        let prefs = Preferences::new(store);
        assert_eq!(prefs.resume_pointer(WorkId(1)), None);
    }

    #[test]
    fn auto_scroll_defaults_off_and_persists() {
        let mut prefs = Preferences::new(MemoryStore::new());
        assert!(!prefs.auto_scroll());
        prefs.set_auto_scroll(true).unwrap();
        assert!(prefs.auto_scroll());
        assert_eq!(prefs.store().raw(PrefKey::AutoScroll), Some("true"));
    }
}
