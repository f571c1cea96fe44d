//! Virtual Object and Line Proxies
//!
//! A hologram's client-side representation is one backing object per text
//! line, stacked downward from the base position at a fixed spacing. The
//! [`VirtualObject`] owns that ordered proxy sequence and drives every
//! mutation through the protocol adapter.
//!
//! Reconciliation runs as three separate passes over disjoint index ranges
//! (update the overlap, drop the trailing excess, append the new tail), so
//! no pass ever indexes past the shorter of the old and new sequences and no
//! removal happens mid-iteration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::config::GrowthPolicy;
use crate::hologram::Position;
use crate::protocol::{ObjectKind, ProtocolAdapter, WireEntityId};
use crate::session::{SessionProvider, ViewerConnection, ViewerId};

/// The backing representation of one hologram text line.
#[derive(Clone, Debug, PartialEq)]
pub struct LineProxy {
    entity_id: WireEntityId,
    object_uuid: Uuid,
    kind: ObjectKind,
    position: Position,
    text: String,
}

impl LineProxy {
    /// Assemble a proxy from its wire identity, kind, position and label.
    ///
    /// Called by protocol adapters; the proxy is owned by the
    /// [`VirtualObject`] that requested it.
    #[must_use]
    pub fn new(
        entity_id: WireEntityId,
        object_uuid: Uuid,
        kind: ObjectKind,
        position: Position,
        text: String,
    ) -> Self {
        Self {
            entity_id,
            object_uuid,
            kind,
            position,
            text,
        }
    }

    /// The proxy's wire entity id.
    #[must_use]
    pub fn entity_id(&self) -> WireEntityId {
        self.entity_id
    }

    /// The proxy's wire object UUID.
    #[must_use]
    pub fn object_uuid(&self) -> Uuid {
        self.object_uuid
    }

    /// The backing object kind.
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Current world position of the proxy.
    #[must_use]
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Current displayed text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the displayed text.
    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }

    /// Move the proxy.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }
}

/// Ordered sequence of line proxies backing one hologram.
pub struct VirtualObject {
    adapter: Arc<dyn ProtocolAdapter>,
    proxies: Vec<LineProxy>,
    spacing: f64,
    growth: GrowthPolicy,
    /// Proxies allocated under [`GrowthPolicy::DeferToTick`], mapped to the
    /// viewers that were subscribed at allocation time and still owe a
    /// spawn. Viewers shown later receive everything via
    /// [`Self::spawn_all_to`] and are never listed here.
    deferred: HashMap<WireEntityId, HashSet<ViewerId>>,
}

impl VirtualObject {
    /// Create an empty virtual object bound to a protocol adapter.
    #[must_use]
    pub fn new(adapter: Arc<dyn ProtocolAdapter>, spacing: f64, growth: GrowthPolicy) -> Self {
        Self {
            adapter,
            proxies: Vec::new(),
            spacing,
            growth,
            deferred: HashMap::new(),
        }
    }

    /// Number of line proxies currently allocated.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.proxies.len()
    }

    /// The proxies in display order.
    #[must_use]
    pub fn proxies(&self) -> &[LineProxy] {
        &self.proxies
    }

    /// World position of the line at `index`, stacked downward from `base`.
    fn line_position(&self, base: &Position, index: usize) -> Position {
        base.offset_y(-(self.spacing * index as f64))
    }

    /// Reconcile the proxy sequence to match `new_lines`.
    ///
    /// Three passes, in order:
    /// 1. overlap: labels updated in place, changes propagated to
    ///    `subscribers`, positions untouched
    /// 2. shrink: trailing excess proxies removed from every subscriber,
    ///    then discarded
    /// 3. grow: new trailing proxies allocated at their index offset and,
    ///    under [`GrowthPolicy::SpawnImmediately`], spawned to every
    ///    subscriber right away
    pub fn sync_lines(
        &mut self,
        new_lines: &[String],
        base: &Position,
        subscribers: &[ViewerConnection],
    ) {
        let old_len = self.proxies.len();
        let new_len = new_lines.len();
        let overlap = old_len.min(new_len);

        for (proxy, line) in self.proxies[..overlap].iter_mut().zip(new_lines) {
            if proxy.text() != line {
                self.adapter.update_text(proxy, line);
                for conn in subscribers {
                    self.adapter.send_text(proxy, conn);
                }
            }
        }

        if new_len < old_len {
            for proxy in self.proxies.drain(new_len..) {
                self.deferred.remove(&proxy.entity_id());
                for conn in subscribers {
                    self.adapter.send_remove(&proxy, conn);
                }
            }
        }

        if new_len > old_len {
            for (index, line) in new_lines.iter().enumerate().skip(old_len) {
                let position = self.line_position(base, index);
                let proxy = self.adapter.create_proxy(position, line);
                match self.growth {
                    GrowthPolicy::SpawnImmediately => {
                        for conn in subscribers {
                            self.adapter.send_spawn(&proxy, conn);
                        }
                    }
                    GrowthPolicy::DeferToTick => {
                        if !subscribers.is_empty() {
                            self.deferred.insert(
                                proxy.entity_id(),
                                subscribers.iter().map(|conn| *conn.viewer()).collect(),
                            );
                        }
                    }
                }
                self.proxies.push(proxy);
            }
        }

        tracing::trace!(
            old_lines = old_len,
            new_lines = new_len,
            subscribers = subscribers.len(),
            "Virtual object reconciled"
        );
    }

    /// Recompute every proxy position from a new base and propagate the
    /// moves to `subscribers`. Line count and labels are untouched.
    pub fn relocate(&mut self, base: &Position, subscribers: &[ViewerConnection]) {
        let spacing = self.spacing;
        for (index, proxy) in self.proxies.iter_mut().enumerate() {
            proxy.set_position(base.offset_y(-(spacing * index as f64)));
            for conn in subscribers {
                self.adapter.send_position(proxy, conn);
            }
        }
    }

    /// Spawn deferred proxies to the viewers that still owe one.
    ///
    /// Only viewers that were subscribed when the proxy was allocated and
    /// are still in `subscribed` receive a spawn; everyone else either got
    /// it through [`Self::spawn_all_to`] or no longer sees the hologram.
    /// Returns the number of proxies flushed.
    pub fn flush_deferred(
        &mut self,
        sessions: &dyn SessionProvider,
        subscribed: &HashSet<ViewerId>,
    ) -> usize {
        if self.deferred.is_empty() {
            return 0;
        }
        let deferred = std::mem::take(&mut self.deferred);
        let mut flushed = 0;
        for proxy in &self.proxies {
            if let Some(waiting) = deferred.get(&proxy.entity_id()) {
                for viewer in waiting.intersection(subscribed) {
                    if let Some(conn) = sessions.connection_for(viewer) {
                        self.adapter.send_spawn(proxy, &conn);
                    }
                }
                flushed += 1;
            }
        }
        flushed
    }

    /// Whether any proxies still owe a deferred spawn.
    #[must_use]
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Drop a viewer from every pending deferred spawn.
    ///
    /// Called when a viewer is hidden, so a later re-show (which spawns the
    /// full sequence) cannot be followed by a duplicate deferred spawn.
    pub fn forget_deferred_viewer(&mut self, viewer: &ViewerId) {
        for waiting in self.deferred.values_mut() {
            waiting.remove(viewer);
        }
    }

    /// Spawn the full proxy sequence to one viewer.
    pub fn spawn_all_to(&self, conn: &ViewerConnection) {
        for proxy in &self.proxies {
            self.adapter.send_spawn(proxy, conn);
        }
    }

    /// Remove the full proxy sequence from one viewer's client.
    pub fn remove_all_from(&self, conn: &ViewerConnection) {
        for proxy in &self.proxies {
            self.adapter.send_remove(proxy, conn);
        }
    }
}

impl std::fmt::Debug for VirtualObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualObject")
            .field("lines", &self.proxies.len())
            .field("spacing", &self.spacing)
            .field("growth", &self.growth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LINE_SPACING;
    use crate::hologram::WorldId;
    use crate::protocol::{select_adapter, ProtocolVersion, WirePacket};
    use crate::session::ViewerId;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn lines(texts: &[&str]) -> Vec<String> {
        texts.iter().map(ToString::to_string).collect()
    }

    fn base() -> Position {
        Position::new(WorldId::new("world"), 0.0, 64.0, 0.0)
    }

    fn new_object(growth: GrowthPolicy) -> VirtualObject {
        let adapter = select_adapter(ProtocolVersion(758)).unwrap();
        VirtualObject::new(adapter, DEFAULT_LINE_SPACING, growth)
    }

    fn drain(rx: &mut mpsc::Receiver<WirePacket>) -> Vec<WirePacket> {
        let mut packets = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn test_lines_stack_downward_at_fixed_spacing() {
        let mut object = new_object(GrowthPolicy::SpawnImmediately);
        object.sync_lines(&lines(&["A", "B", "C"]), &base(), &[]);

        let offsets: Vec<f64> = object.proxies().iter().map(|p| p.position().y()).collect();
        assert_eq!(offsets, vec![64.0, 64.0 - 0.26, 64.0 - 0.52]);
    }

    #[test]
    fn test_shrink_removes_exactly_the_tail() {
        let mut object = new_object(GrowthPolicy::SpawnImmediately);
        object.sync_lines(&lines(&["1", "2", "3", "4", "5"]), &base(), &[]);
        let kept: Vec<u64> = object.proxies()[..2]
            .iter()
            .map(|p| p.entity_id().as_u64())
            .collect();
        let dropped: Vec<u64> = object.proxies()[2..]
            .iter()
            .map(|p| p.entity_id().as_u64())
            .collect();

        let (conn, mut rx) = ViewerConnection::channel(ViewerId::new());
        object.sync_lines(&lines(&["1", "2"]), &base(), &[conn]);

        assert_eq!(object.line_count(), 2);
        let surviving: Vec<&str> = object.proxies().iter().map(LineProxy::text).collect();
        assert_eq!(surviving, vec!["1", "2"]);
        assert_eq!(
            object
                .proxies()
                .iter()
                .map(|p| p.entity_id().as_u64())
                .collect::<Vec<_>>(),
            kept
        );

        // Exactly three removals, one per dropped proxy, nothing else.
        let packets = drain(&mut rx);
        assert_eq!(packets.len(), 3);
        let removed: Vec<u64> = packets
            .iter()
            .map(|p| match p {
                WirePacket::RemoveObjects { entity_ids } => entity_ids[0],
                other => panic!("expected removal, got {other:?}"),
            })
            .collect();
        assert_eq!(removed, dropped);
    }

    #[test]
    fn test_grow_spawns_only_the_new_tail() {
        let mut object = new_object(GrowthPolicy::SpawnImmediately);
        object.sync_lines(&lines(&["1", "2"]), &base(), &[]);

        let (conn, mut rx) = ViewerConnection::channel(ViewerId::new());
        object.sync_lines(&lines(&["1", "2", "3", "4", "5"]), &base(), &[conn]);

        assert_eq!(object.line_count(), 5);
        let packets = drain(&mut rx);
        // Add + display data per new line; no packets for the original two.
        assert_eq!(packets.len(), 6);
        let spawned: Vec<f64> = packets
            .iter()
            .filter_map(|p| match p {
                WirePacket::AddObject { y, .. } => Some(*y),
                _ => None,
            })
            .collect();
        assert_eq!(spawned, vec![64.0 - 0.52, 64.0 - 0.78, 64.0 - 1.04]);
    }

    #[test]
    fn test_grow_deferred_allocates_without_spawning() {
        let mut object = new_object(GrowthPolicy::DeferToTick);
        object.sync_lines(&lines(&["1"]), &base(), &[]);

        let (conn, mut rx) = ViewerConnection::channel(ViewerId::new());
        object.sync_lines(&lines(&["1", "2"]), &base(), &[conn]);

        assert_eq!(object.line_count(), 2);
        assert!(object.has_deferred());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_flush_deferred_spawns_to_waiting_viewers_only() {
        use crate::session::InMemorySessionProvider;

        let provider = InMemorySessionProvider::new();
        let waiting = ViewerId::new();
        let late = ViewerId::new();
        let mut waiting_rx = provider.connect(waiting);
        let mut late_rx = provider.connect(late);

        let mut object = new_object(GrowthPolicy::DeferToTick);
        object.sync_lines(&lines(&["1"]), &base(), &[]);

        // Grow while only `waiting` is subscribed.
        let conn = provider.connection_for(&waiting).unwrap();
        object.sync_lines(&lines(&["1", "2"]), &base(), &[conn]);

        // `late` is shown afterwards and receives the full sequence.
        object.spawn_all_to(&provider.connection_for(&late).unwrap());
        assert_eq!(drain(&mut late_rx).len(), 4);

        let subscribed: HashSet<ViewerId> = [waiting, late].into_iter().collect();
        assert_eq!(object.flush_deferred(&provider, &subscribed), 1);
        assert!(!object.has_deferred());

        // Only the waiting viewer got the deferred spawn.
        assert_eq!(drain(&mut waiting_rx).len(), 2);
        assert!(drain(&mut late_rx).is_empty());

        // Flushing again is a no-op.
        assert_eq!(object.flush_deferred(&provider, &subscribed), 0);
    }

    #[test]
    fn test_overlap_updates_changed_labels_only() {
        let mut object = new_object(GrowthPolicy::SpawnImmediately);
        object.sync_lines(&lines(&["A", "B", "C"]), &base(), &[]);

        let (conn, mut rx) = ViewerConnection::channel(ViewerId::new());
        object.sync_lines(&lines(&["A", "beta", "C"]), &base(), &[conn]);

        let packets = drain(&mut rx);
        assert_eq!(packets.len(), 1);
        match &packets[0] {
            WirePacket::SetDisplayData { text, .. } => assert_eq!(text, "beta"),
            other => panic!("expected display data, got {other:?}"),
        }
        assert_eq!(object.proxies()[1].text(), "beta");
        // Positions never move on a text update.
        assert_eq!(object.proxies()[1].position().y(), 64.0 - 0.26);
    }

    #[test]
    fn test_empty_line_is_valid_content() {
        let mut object = new_object(GrowthPolicy::SpawnImmediately);
        object.sync_lines(&lines(&["", "B"]), &base(), &[]);

        assert_eq!(object.line_count(), 2);
        assert_eq!(object.proxies()[0].text(), "");
    }

    #[test]
    fn test_relocate_teleports_every_line() {
        let mut object = new_object(GrowthPolicy::SpawnImmediately);
        object.sync_lines(&lines(&["A", "B"]), &base(), &[]);

        let (conn, mut rx) = ViewerConnection::channel(ViewerId::new());
        let moved = Position::new(WorldId::new("world"), 10.0, 80.0, 10.0);
        object.relocate(&moved, &[conn]);

        let packets = drain(&mut rx);
        assert_eq!(packets.len(), 2);
        let targets: Vec<(f64, f64, f64)> = packets
            .iter()
            .map(|p| match p {
                WirePacket::TeleportObject { x, y, z, .. } => (*x, *y, *z),
                other => panic!("expected teleport, got {other:?}"),
            })
            .collect();
        assert_eq!(targets, vec![(10.0, 80.0, 10.0), (10.0, 80.0 - 0.26, 10.0)]);
        assert_eq!(object.proxies()[1].position().y(), 80.0 - 0.26);
    }

    #[test]
    fn test_spawn_and_remove_all() {
        let mut object = new_object(GrowthPolicy::SpawnImmediately);
        object.sync_lines(&lines(&["A", "B"]), &base(), &[]);

        let (conn, mut rx) = ViewerConnection::channel(ViewerId::new());
        object.spawn_all_to(&conn);
        assert_eq!(drain(&mut rx).len(), 4);

        object.remove_all_from(&conn);
        let removals = drain(&mut rx);
        assert_eq!(removals.len(), 2);
        assert!(removals
            .iter()
            .all(|p| matches!(p, WirePacket::RemoveObjects { .. })));
    }
}
