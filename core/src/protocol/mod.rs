//! Protocol Adapter Layer
//!
//! Translates abstract hologram operations into wire packet intents for one
//! specific protocol generation. Everything above this module is
//! version-agnostic: the adapter is selected exactly once at startup from the
//! negotiated protocol version, and the rest of the engine only ever talks to
//! the [`ProtocolAdapter`] trait.
//!
//! Two generations are supported:
//! - [`ArmorStandAdapter`]: invisible marker armor stands carrying the line
//!   as a visible custom name (protocol versions below 762)
//! - [`TextDisplayAdapter`]: dedicated text display objects (762 and up)
//!
//! Adapters are stateless strategies. They mint wire identities and build
//! packets; targeting (which viewer gets what) belongs to the callers.

pub mod armor_stand;
pub mod packets;
pub mod text_display;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hologram::Position;
use crate::object::LineProxy;
use crate::session::ViewerConnection;

pub use armor_stand::ArmorStandAdapter;
pub use packets::{DisplayFlags, ObjectKind, WirePacket};
pub use text_display::TextDisplayAdapter;

/// Oldest wire protocol generation the engine can address.
pub const MIN_SUPPORTED_PROTOCOL: u32 = 754;

/// First protocol generation with dedicated text display objects.
pub const TEXT_DISPLAY_MIN_PROTOCOL: u32 = 762;

/// A negotiated wire protocol version number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion(pub u32);

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier for one client-side backing object.
///
/// Minted process-wide when a proxy's backing representation is constructed;
/// owned exclusively by the [`crate::object::VirtualObject`] that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireEntityId(u64);

impl WireEntityId {
    /// Mint the next unique wire entity id.
    #[must_use]
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw numeric value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WireEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire-{}", self.0)
    }
}

/// Errors raised while selecting a protocol adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The negotiated version has no adapter. Fatal at startup: nothing can
    /// be rendered without one.
    #[error("no protocol adapter for negotiated version {0} (minimum supported is v{MIN_SUPPORTED_PROTOCOL})")]
    UnsupportedVersion(ProtocolVersion),
}

/// Version-specific translation from abstract display operations to wire
/// packets.
///
/// All send methods are fire-and-forget: a dead connection swallows the
/// packet silently and the next reconciliation tick self-heals. None of them
/// return errors.
pub trait ProtocolAdapter: Send + Sync {
    /// The protocol generation this adapter speaks.
    fn version(&self) -> ProtocolVersion;

    /// Construct the backing representation for one text line.
    ///
    /// Pure allocation: mints the wire identity and records position and
    /// label, with no network I/O. Nobody sees the proxy until a spawn is
    /// sent for it.
    fn create_proxy(&self, position: Position, line: &str) -> LineProxy;

    /// Emit the packets that materialize `proxy` on one viewer's client:
    /// an add-object message followed by the display data carrying the text.
    fn send_spawn(&self, proxy: &LineProxy, conn: &ViewerConnection);

    /// Emit the packet removing `proxy` from one viewer's client view.
    ///
    /// Safe for viewers that never received a spawn; clients ignore unknown
    /// ids.
    fn send_remove(&self, proxy: &LineProxy, conn: &ViewerConnection);

    /// Replace the proxy's label in place. No packets are emitted; callers
    /// propagate the change to spawned viewers via [`Self::send_text`].
    fn update_text(&self, proxy: &mut LineProxy, new_line: &str);

    /// Emit only the display-data packet carrying the proxy's current label.
    fn send_text(&self, proxy: &LineProxy, conn: &ViewerConnection);

    /// Emit the packet moving `proxy` to its current position.
    fn send_position(&self, proxy: &LineProxy, conn: &ViewerConnection);
}

/// Select the adapter for a negotiated protocol version.
///
/// Happens once at startup; an unsupported version is a configuration error,
/// not a per-call condition.
pub fn select_adapter(version: ProtocolVersion) -> Result<Arc<dyn ProtocolAdapter>, ProtocolError> {
    if version.0 < MIN_SUPPORTED_PROTOCOL {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let adapter: Arc<dyn ProtocolAdapter> = if version.0 >= TEXT_DISPLAY_MIN_PROTOCOL {
        Arc::new(TextDisplayAdapter::new(version))
    } else {
        Arc::new(ArmorStandAdapter::new(version))
    };

    tracing::info!(
        protocol_version = %version,
        adapter = adapter.name(),
        "Protocol adapter selected"
    );
    Ok(adapter)
}

impl dyn ProtocolAdapter {
    /// Human-readable adapter name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        if self.version().0 >= TEXT_DISPLAY_MIN_PROTOCOL {
            "text-display"
        } else {
            "armor-stand"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_entity_id_unique() {
        let id1 = WireEntityId::next();
        let id2 = WireEntityId::next();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_protocol_version_display() {
        assert_eq!(format!("{}", ProtocolVersion(758)), "v758");
    }

    #[test]
    fn test_select_adapter_by_generation() {
        let legacy = select_adapter(ProtocolVersion(758)).unwrap();
        assert_eq!(legacy.name(), "armor-stand");
        assert_eq!(legacy.version(), ProtocolVersion(758));

        let modern = select_adapter(ProtocolVersion(762)).unwrap();
        assert_eq!(modern.name(), "text-display");
    }

    #[test]
    fn test_select_adapter_rejects_ancient_version() {
        let result = select_adapter(ProtocolVersion(340));
        assert!(matches!(
            result,
            Err(ProtocolError::UnsupportedVersion(ProtocolVersion(340)))
        ));
    }
}
