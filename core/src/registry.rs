//! Hologram Registry
//!
//! Process-wide catalog of all hologram instances, keyed by id. The registry
//! owns every hologram: one is destroyed only through explicit registry
//! removal, which disassociates all viewers (sends their removal packets)
//! before the entry is dropped, so clients never retain ghost objects.
//!
//! # Thread Safety
//!
//! The map lives behind `Arc<RwLock<>>` and each hologram behind its own
//! `Arc<Mutex<>>`, so administration calls and the reconciliation tick
//! interleave at hologram granularity. Lock order is always registry first,
//! then hologram. Update rates are human-driven edits plus a low-frequency
//! tick, not a hot path.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::hologram::{Hologram, HologramId};
use crate::session::SessionProvider;
use crate::store::HologramRecord;

/// Shared handle to one registered hologram.
pub type HologramHandle = Arc<Mutex<Hologram>>;

/// Registry of all holograms, keyed by id.
#[derive(Clone, Default)]
pub struct HologramRegistry {
    inner: Arc<RwLock<HashMap<HologramId, HologramHandle>>>,
}

impl HologramRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hologram under its id.
    ///
    /// Returns the shared handle, or `None` when the id is already taken
    /// (the hologram is dropped unregistered in that case).
    pub fn insert(&self, hologram: Hologram) -> Option<HologramHandle> {
        let id = hologram.id().clone();
        let mut inner = self.inner.write();
        if inner.contains_key(&id) {
            tracing::warn!(hologram_id = %id, "Hologram id already registered");
            return None;
        }
        let handle = Arc::new(Mutex::new(hologram));
        inner.insert(id.clone(), handle.clone());
        tracing::info!(hologram_id = %id, "Hologram registered");
        Some(handle)
    }

    /// Get the handle for one hologram.
    #[must_use]
    pub fn get(&self, id: &HologramId) -> Option<HologramHandle> {
        self.inner.read().get(id).cloned()
    }

    /// Whether a hologram id is registered.
    #[must_use]
    pub fn contains(&self, id: &HologramId) -> bool {
        self.inner.read().contains_key(id)
    }

    /// Number of registered holograms.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.read().len()
    }

    /// All registered ids, sorted for deterministic listing.
    #[must_use]
    pub fn ids(&self) -> Vec<HologramId> {
        let mut ids: Vec<HologramId> = self.inner.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All registered holograms, sorted by id.
    #[must_use]
    pub fn all(&self) -> Vec<(HologramId, HologramHandle)> {
        let inner = self.inner.read();
        let mut entries: Vec<(HologramId, HologramHandle)> = inner
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Remove a hologram, tearing it down for every current viewer first.
    ///
    /// Removal packets go out (defensively re-deriving each viewer's
    /// connection) before the entry is dropped. Returns true if the id was
    /// registered.
    pub fn remove(&self, id: &HologramId, sessions: &dyn SessionProvider) -> bool {
        let mut inner = self.inner.write();
        let Some(handle) = inner.get(id).cloned() else {
            return false;
        };
        handle.lock().despawn_all(sessions);
        inner.remove(id);
        tracing::info!(hologram_id = %id, "Hologram removed from registry");
        true
    }

    /// Snapshot the persistent fields of every hologram, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HologramRecord> {
        self.all()
            .into_iter()
            .map(|(_, handle)| handle.lock().record())
            .collect()
    }
}

impl fmt::Debug for HologramRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("HologramRegistry")
            .field("count", &inner.len())
            .field("ids", &inner.keys().collect::<Vec<_>>())
            .finish()
    }
}
