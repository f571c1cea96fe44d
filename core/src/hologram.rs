//! Hologram Domain Entity
//!
//! A hologram is a positioned, multi-line, client-visible text display with
//! no server-authoritative presence: it exists only as packets sent to the
//! viewers that are currently entitled to see it. The entity here combines a
//! stable id, a world position, the ordered text lines, the set of current
//! viewers, and the exclusively-owned [`VirtualObject`] that carries the
//! client-side representation.
//!
//! # Contract
//!
//! - `show` is a no-op for disallowed or already-subscribed viewers
//! - `hide` is a no-op for non-viewers and never forgets the viewer for
//!   other holograms
//! - `update_lines` leaves every subscribed viewer's client matching the new
//!   line sequence exactly
//! - removal must re-derive connections defensively: a viewer may have
//!   disconnected since the last reconciliation, which is a no-op for that
//!   viewer, not an error

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::object::VirtualObject;
use crate::protocol::ProtocolAdapter;
use crate::session::{SessionProvider, ViewerConnection, ViewerId};
use crate::store::HologramRecord;
use crate::visibility::VisibilityCriteria;

/// Stable unique hologram identifier, assigned at creation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HologramId(String);

impl HologramId {
    /// Wrap a string key as a hologram id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HologramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the world/region a position belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(String);

impl WorldId {
    /// Wrap a world name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the world name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A world-qualified 3D coordinate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    world: WorldId,
    x: f64,
    y: f64,
    z: f64,
}

impl Position {
    /// Create a position.
    #[must_use]
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Self {
        Self { world, x, y, z }
    }

    /// The world this position is in.
    #[must_use]
    pub fn world(&self) -> &WorldId {
        &self.world
    }

    /// X coordinate.
    #[must_use]
    pub fn x(&self) -> f64 {
        self.x
    }

    /// Y coordinate.
    #[must_use]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Z coordinate.
    #[must_use]
    pub fn z(&self) -> f64 {
        self.z
    }

    /// This position shifted vertically by `dy`.
    #[must_use]
    pub fn offset_y(&self, dy: f64) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x,
            y: self.y + dy,
            z: self.z,
        }
    }

    /// Straight-line distance to another position in the same world.
    ///
    /// Positions in different worlds have no meaningful distance.
    #[must_use]
    pub fn distance_to(&self, other: &Position) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:.1}, {:.1}, {:.1})", self.world, self.x, self.y, self.z)
    }
}

/// A positioned, multi-line floating text object rendered per viewer.
pub struct Hologram {
    id: HologramId,
    position: Position,
    lines: Vec<String>,
    viewers: HashSet<ViewerId>,
    object: VirtualObject,
}

impl Hologram {
    /// Create a hologram and allocate its line proxies.
    ///
    /// Allocation is local: nothing is sent until a viewer is shown the
    /// hologram.
    #[must_use]
    pub fn new(
        id: HologramId,
        position: Position,
        lines: Vec<String>,
        adapter: Arc<dyn ProtocolAdapter>,
        config: &EngineConfig,
    ) -> Self {
        let mut object = VirtualObject::new(adapter, config.line_spacing, config.growth_policy);
        object.sync_lines(&lines, &position, &[]);
        Self {
            id,
            position,
            lines,
            viewers: HashSet::new(),
            object,
        }
    }

    /// Rebuild a hologram from its persisted record.
    #[must_use]
    pub fn from_record(
        record: HologramRecord,
        adapter: Arc<dyn ProtocolAdapter>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(record.id, record.position, record.lines, adapter, config)
    }

    /// The hologram's stable id.
    #[must_use]
    pub fn id(&self) -> &HologramId {
        &self.id
    }

    /// The hologram's base position (top line).
    #[must_use]
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// The text lines in top-to-bottom display order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The viewers currently subscribed to this hologram.
    #[must_use]
    pub fn viewers(&self) -> &HashSet<ViewerId> {
        &self.viewers
    }

    /// Whether the viewer currently receives this hologram.
    #[must_use]
    pub fn is_viewer(&self, viewer: &ViewerId) -> bool {
        self.viewers.contains(viewer)
    }

    /// The virtual object backing this hologram.
    #[must_use]
    pub fn object(&self) -> &VirtualObject {
        &self.object
    }

    /// Show the hologram to one viewer.
    ///
    /// No-op when the criteria disallow the viewer, when the viewer is
    /// already subscribed, or when the viewer has no live connection.
    /// Returns true if the viewer was newly shown the hologram.
    pub fn show(
        &mut self,
        viewer: &ViewerId,
        sessions: &dyn SessionProvider,
        criteria: &dyn VisibilityCriteria,
    ) -> bool {
        if self.is_viewer(viewer) || !criteria.should_show(self, viewer) {
            return false;
        }
        let Some(conn) = sessions.connection_for(viewer) else {
            return false;
        };

        self.object.spawn_all_to(&conn);
        self.viewers.insert(*viewer);
        tracing::debug!(
            hologram_id = %self.id,
            viewer = %viewer,
            lines = self.lines.len(),
            "Hologram shown to viewer"
        );
        true
    }

    /// Hide the hologram from one viewer.
    ///
    /// No-op when the viewer is not subscribed. A missing connection only
    /// skips the packets; the bookkeeping is updated regardless.
    /// Returns true if the viewer was unsubscribed.
    pub fn hide(&mut self, viewer: &ViewerId, sessions: &dyn SessionProvider) -> bool {
        if !self.is_viewer(viewer) {
            return false;
        }
        if let Some(conn) = sessions.connection_for(viewer) {
            self.object.remove_all_from(&conn);
        }
        self.object.forget_deferred_viewer(viewer);
        self.viewers.remove(viewer);
        tracing::debug!(
            hologram_id = %self.id,
            viewer = %viewer,
            "Hologram hidden from viewer"
        );
        true
    }

    /// Replace the text lines and converge every subscribed viewer's client
    /// to the new sequence.
    pub fn update_lines(&mut self, new_lines: Vec<String>, sessions: &dyn SessionProvider) {
        let subscribers = self.subscriber_connections(sessions);
        self.object
            .sync_lines(&new_lines, &self.position, &subscribers);
        tracing::debug!(
            hologram_id = %self.id,
            old_lines = self.lines.len(),
            new_lines = new_lines.len(),
            subscribers = subscribers.len(),
            "Hologram lines updated"
        );
        self.lines = new_lines;
    }

    /// Move the hologram, recomputing every line offset from the new base.
    pub fn relocate(&mut self, new_position: Position, sessions: &dyn SessionProvider) {
        let subscribers = self.subscriber_connections(sessions);
        self.object.relocate(&new_position, &subscribers);
        tracing::debug!(
            hologram_id = %self.id,
            position = %new_position,
            "Hologram relocated"
        );
        self.position = new_position;
    }

    /// Remove the hologram from every current viewer's client and forget all
    /// viewers.
    ///
    /// Connections are re-derived per viewer; viewers that disconnected
    /// since the last reconciliation are skipped silently.
    pub fn despawn_all(&mut self, sessions: &dyn SessionProvider) {
        for viewer in self.viewers.drain() {
            if let Some(conn) = sessions.connection_for(&viewer) {
                self.object.remove_all_from(&conn);
            }
        }
        tracing::debug!(hologram_id = %self.id, "Hologram despawned from all viewers");
    }

    /// Spawn any line proxies whose delivery was deferred at grow time to
    /// the subscribed viewers still owing one.
    ///
    /// Driven by the reconciliation tick; a no-op under
    /// [`crate::config::GrowthPolicy::SpawnImmediately`]. Returns the number
    /// of proxies flushed.
    pub fn flush_deferred(&mut self, sessions: &dyn SessionProvider) -> usize {
        self.object.flush_deferred(sessions, &self.viewers)
    }

    /// Drop bookkeeping entries for viewers no longer connected.
    ///
    /// No packets are sent; there is no connection left to address. Returns
    /// the number of entries pruned.
    pub fn prune_viewers(&mut self, connected: &HashSet<ViewerId>) -> usize {
        let before = self.viewers.len();
        self.viewers.retain(|viewer| connected.contains(viewer));
        let pruned = before - self.viewers.len();
        if pruned > 0 {
            tracing::debug!(
                hologram_id = %self.id,
                pruned = pruned,
                "Pruned stale hologram viewers"
            );
        }
        pruned
    }

    /// Snapshot the persistent fields of this hologram.
    #[must_use]
    pub fn record(&self) -> HologramRecord {
        HologramRecord {
            id: self.id.clone(),
            position: self.position.clone(),
            lines: self.lines.clone(),
        }
    }

    /// Live connections of the currently subscribed viewers.
    fn subscriber_connections(&self, sessions: &dyn SessionProvider) -> Vec<ViewerConnection> {
        self.viewers
            .iter()
            .filter_map(|viewer| sessions.connection_for(viewer))
            .collect()
    }
}

impl fmt::Debug for Hologram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hologram")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("lines", &self.lines.len())
            .field("viewers", &self.viewers.len())
            .finish()
    }
}
