//! Text Display Adapter
//!
//! Protocol v762 and newer ship a dedicated text display object, so the line
//! is carried directly as display text instead of an armor stand name tag.

use uuid::Uuid;

use crate::hologram::Position;
use crate::object::LineProxy;
use crate::session::ViewerConnection;

use super::packets::{DisplayFlags, ObjectKind, WirePacket};
use super::{ProtocolAdapter, ProtocolVersion, WireEntityId};

/// Display attributes of a hologram-line text display.
///
/// Text displays have no body to hide and no separate name tag; the text is
/// the object.
const DISPLAY_FLAGS: DisplayFlags = DisplayFlags {
    invisible: false,
    marker: false,
    no_gravity: true,
    name_visible: false,
};

/// Adapter for text-display-based protocol generations.
#[derive(Debug)]
pub struct TextDisplayAdapter {
    version: ProtocolVersion,
}

impl TextDisplayAdapter {
    /// Create an adapter speaking the given protocol version.
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    fn display_data(proxy: &LineProxy) -> WirePacket {
        WirePacket::SetDisplayData {
            entity_id: proxy.entity_id().as_u64(),
            text: proxy.text().to_string(),
            flags: DISPLAY_FLAGS,
        }
    }
}

impl ProtocolAdapter for TextDisplayAdapter {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    fn create_proxy(&self, position: Position, line: &str) -> LineProxy {
        LineProxy::new(
            WireEntityId::next(),
            Uuid::new_v4(),
            ObjectKind::TextDisplay,
            position,
            line.to_string(),
        )
    }

    fn send_spawn(&self, proxy: &LineProxy, conn: &ViewerConnection) {
        conn.send(WirePacket::AddObject {
            entity_id: proxy.entity_id().as_u64(),
            object_uuid: proxy.object_uuid(),
            kind: ObjectKind::TextDisplay,
            x: proxy.position().x(),
            y: proxy.position().y(),
            z: proxy.position().z(),
        });
        conn.send(Self::display_data(proxy));
    }

    fn send_remove(&self, proxy: &LineProxy, conn: &ViewerConnection) {
        conn.send(WirePacket::RemoveObjects {
            entity_ids: vec![proxy.entity_id().as_u64()],
        });
    }

    fn update_text(&self, proxy: &mut LineProxy, new_line: &str) {
        proxy.set_text(new_line.to_string());
    }

    fn send_text(&self, proxy: &LineProxy, conn: &ViewerConnection) {
        conn.send(Self::display_data(proxy));
    }

    fn send_position(&self, proxy: &LineProxy, conn: &ViewerConnection) {
        conn.send(WirePacket::TeleportObject {
            entity_id: proxy.entity_id().as_u64(),
            x: proxy.position().x(),
            y: proxy.position().y(),
            z: proxy.position().z(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hologram::WorldId;
    use crate::session::ViewerId;

    #[test]
    fn test_spawn_uses_text_display_objects() {
        let adapter = TextDisplayAdapter::new(ProtocolVersion(765));
        let (conn, mut rx) = ViewerConnection::channel(ViewerId::new());
        let position = Position::new(WorldId::new("world"), 1.0, 70.0, -3.0);
        let proxy = adapter.create_proxy(position, "scoreboard");

        adapter.send_spawn(&proxy, &conn);

        match rx.try_recv().unwrap() {
            WirePacket::AddObject { kind, x, y, z, .. } => {
                assert_eq!(kind, ObjectKind::TextDisplay);
                assert_eq!((x, y, z), (1.0, 70.0, -3.0));
            }
            other => panic!("expected add object, got {other:?}"),
        }
        match rx.try_recv().unwrap() {
            WirePacket::SetDisplayData { text, flags, .. } => {
                assert_eq!(text, "scoreboard");
                assert!(!flags.name_visible);
            }
            other => panic!("expected display data, got {other:?}"),
        }
    }
}
