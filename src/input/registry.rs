use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::key::{normalize, CanonicalKey};
use crate::config::Sound;

/// Canonical key → file path table
///
/// Lookups run on the listener thread while `rebuild` runs on the control
/// context. The table is never edited in place: `rebuild` builds a fresh map
/// and publishes it with a single pointer swap, so readers see either the old
/// or the new table, never a mix.
#[derive(Debug, Default)]
pub struct HotkeyRegistry {
    bindings: ArcSwap<HashMap<CanonicalKey, PathBuf>>,
}

impl HotkeyRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every binding with those derived from `sounds`
    ///
    /// Sounds with a blank hotkey, an empty file or an unparseable hotkey are
    /// skipped. When two sounds share a key the later one wins.
    pub fn rebuild(&self, sounds: &[Sound]) {
        let mut bindings = HashMap::new();
        for sound in sounds {
            let Some(hotkey) = sound.hotkey() else {
                continue;
            };
            if sound.file.as_os_str().is_empty() {
                continue;
            }
            match normalize(hotkey) {
                Some(key) => {
                    if let Some(previous) = bindings.insert(key, sound.file.clone()) {
                        debug!(
                            key = %key,
                            replaced = %previous.display(),
                            file = %sound.file.display(),
                            "hotkey claimed twice, later sound wins"
                        );
                    }
                }
                None => debug!(hotkey, "skipping unsupported hotkey"),
            }
        }

        info!(bindings = bindings.len(), "hotkey registry rebuilt");
        self.bindings.store(Arc::new(bindings));
    }

    /// File bound to `key`, if any
    #[must_use]
    pub fn lookup(&self, key: CanonicalKey) -> Option<PathBuf> {
        self.bindings.load().get(&key).cloned()
    }

    /// Number of active bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.load().len()
    }

    /// Whether no keys are bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
