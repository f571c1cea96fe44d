//! Armor Stand Adapter
//!
//! Protocol generations before text displays existed (< v762) render a
//! hologram line as an invisible, marker-sized armor stand whose custom name
//! carries the text. The stand itself never renders; only the name tag does.

use uuid::Uuid;

use crate::hologram::Position;
use crate::object::LineProxy;
use crate::session::ViewerConnection;

use super::packets::{DisplayFlags, ObjectKind, WirePacket};
use super::{ProtocolAdapter, ProtocolVersion, WireEntityId};

/// Display attributes of a hologram-line armor stand.
const STAND_FLAGS: DisplayFlags = DisplayFlags {
    invisible: true,
    marker: true,
    no_gravity: true,
    name_visible: true,
};

/// Adapter for armor-stand-based protocol generations.
#[derive(Debug)]
pub struct ArmorStandAdapter {
    version: ProtocolVersion,
}

impl ArmorStandAdapter {
    /// Create an adapter speaking the given protocol version.
    #[must_use]
    pub fn new(version: ProtocolVersion) -> Self {
        Self { version }
    }

    fn display_data(proxy: &LineProxy) -> WirePacket {
        WirePacket::SetDisplayData {
            entity_id: proxy.entity_id().as_u64(),
            text: proxy.text().to_string(),
            flags: STAND_FLAGS,
        }
    }
}

impl ProtocolAdapter for ArmorStandAdapter {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    fn create_proxy(&self, position: Position, line: &str) -> LineProxy {
        LineProxy::new(
            WireEntityId::next(),
            Uuid::new_v4(),
            ObjectKind::ArmorStand,
            position,
            line.to_string(),
        )
    }

    fn send_spawn(&self, proxy: &LineProxy, conn: &ViewerConnection) {
        conn.send(WirePacket::AddObject {
            entity_id: proxy.entity_id().as_u64(),
            object_uuid: proxy.object_uuid(),
            kind: ObjectKind::ArmorStand,
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
