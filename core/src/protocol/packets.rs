//! Wire Packet Intents
//!
//! Typed representations of the client-bound messages the engine emits.
//! These are *intents*, not byte layouts: the session protocol below this
//! layer owns the actual encoding per negotiated version. Keeping them typed
//! lets tests inject a recording connection and assert on exactly what a
//! viewer's client was told (add object, set display data, teleport, remove).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The backing object kind used to carry a text line on the client.
///
/// Older protocol generations only have invisible marker armor stands to
/// hang a name tag on; newer ones ship a dedicated text display object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Invisible, marker-sized armor stand with a visible custom name.
    ArmorStand,
    /// Dedicated client-side text display object.
    TextDisplay,
}

/// Display attributes sent alongside the text payload.
///
/// Not every flag is meaningful for every [`ObjectKind`]; adapters set the
/// combination their protocol generation expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFlags {
    /// Backing object renders no body, only its display data.
    pub invisible: bool,
    /// Marker objects have no hitbox and no client-side physics.
    pub marker: bool,
    /// The object never falls.
    pub no_gravity: bool,
    /// The display text is rendered above the object.
    pub name_visible: bool,
}

/// A single client-bound message addressed to one viewer's connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WirePacket {
    /// Materialize a new client-side object.
    AddObject {
        /// Wire-level entity id, unique per process.
        entity_id: u64,
        /// Wire-level object UUID.
        object_uuid: Uuid,
        /// What kind of backing object the client should create.
        kind: ObjectKind,
        /// World-space X coordinate.
        x: f64,
        /// World-space Y coordinate.
        y: f64,
        /// World-space Z coordinate.
        z: f64,
    },

    /// Set or replace the display data of an existing client-side object.
    SetDisplayData {
        /// Wire-level entity id the data applies to.
        entity_id: u64,
        /// The rendered text line. Empty text is a valid zero-width line.
        text: String,
        /// Display attributes for the backing object.
        flags: DisplayFlags,
    },

    /// Move an existing client-side object to an absolute position.
    TeleportObject {
        /// Wire-level entity id to move.
        entity_id: u64,
        /// World-space X coordinate.
        x: f64,
        /// World-space Y coordinate.
        y: f64,
        /// World-space Z coordinate.
        z: f64,
    },

    /// Remove client-side objects by id.
    ///
    /// Clients ignore unknown ids, so this is always safe to send.
    RemoveObjects {
        /// Wire-level entity ids to remove.
        entity_ids: Vec<u64>,
    },
}

impl WirePacket {
    /// The wire entity id this packet targets (first id for removals).
    #[must_use]
    pub fn entity_id(&self) -> Option<u64> {
        match self {
            Self::AddObject { entity_id, .. }
            | Self::SetDisplayData { entity_id, .. }
            | Self::TeleportObject { entity_id, .. } => Some(*entity_id),
            Self::RemoveObjects { entity_ids } => entity_ids.first().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_entity_id() {
        let packet = WirePacket::TeleportObject {
            entity_id: 7,
            x: 0.0,
            y: 64.0,
            z: 0.0,
        };
        assert_eq!(packet.entity_id(), Some(7));

        let removal = WirePacket::RemoveObjects { entity_ids: vec![] };
        assert_eq!(removal.entity_id(), None);
    }

    #[test]
    fn test_packet_serde_roundtrip() {
        let packet = WirePacket::SetDisplayData {
            entity_id: 3,
            text: "Welcome".to_string(),
            flags: DisplayFlags {
                invisible: true,
                marker: true,
                no_gravity: true,
                name_visible: true,
            },
        };

        let json = serde_json::to_string(&packet).unwrap();
        let back: WirePacket = serde_json::from_str(&json).unwrap();
        assert_eq!(back, packet);
    }
}
