//! Viewer Session Plumbing
//!
//! Viewers are connected sessions entitled to receive display packets. The
//! engine never enumerates raw connections itself: it asks a
//! [`SessionProvider`] for the live viewer set and for the packet channel of
//! a specific viewer. Delivery is fire-and-forget over each viewer's
//! already-established connection; there is no per-message acknowledgment,
//! so a dead connection just swallows the packet and the next reconciliation
//! tick self-heals.
//!
//! [`InMemorySessionProvider`] is the in-process implementation used by the
//! engine and by tests. Tests get a recording connection from
//! [`ViewerConnection::channel`] and assert on the drained packets.

use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::hologram::Position;
use crate::protocol::WirePacket;

/// Packets buffered per viewer connection before sends are dropped.
const PACKET_CHANNEL_CAPACITY: usize = 256;

/// Stable identity of a connected viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewerId(Uuid);

impl ViewerId {
    /// Mint a fresh random viewer identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID as a viewer identity.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Opaque per-session token minted when a viewer connects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a new random session token.
    #[must_use]
    pub fn new() -> Self {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().gen();
        Self(format!("sess_{}", hex::encode(bytes)))
    }

    /// Get the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to one viewer's client-bound packet channel.
///
/// Cheap to clone; all clones feed the same connection.
#[derive(Clone, Debug)]
pub struct ViewerConnection {
    viewer: ViewerId,
    tx: mpsc::Sender<WirePacket>,
}

impl ViewerConnection {
    /// Create a connection plus the client-side receiving end.
    ///
    /// The receiver is what a transport (or a test) drains to observe exactly
    /// which packets the viewer's client was sent.
    #[must_use]
    pub fn channel(viewer: ViewerId) -> (Self, mpsc::Receiver<WirePacket>) {
        let (tx, rx) = mpsc::channel(PACKET_CHANNEL_CAPACITY);
        (Self { viewer, tx }, rx)
    }

    /// The viewer this connection belongs to.
    #[must_use]
    pub fn viewer(&self) -> &ViewerId {
        &self.viewer
    }

    /// Send a packet without blocking.
    ///
    /// Returns false if the connection is gone or its buffer is full. Either
    /// way the failure is local: callers never treat it as fatal.
    pub fn send(&self, packet: WirePacket) -> bool {
        let sent = self.tx.try_send(packet).is_ok();
        if !sent {
            tracing::trace!(
                viewer = %self.viewer,
                "Dropped packet for unreachable viewer connection"
            );
        }
        sent
    }

    /// Check whether the client side of the channel still exists.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Session lifecycle notifications fed into the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A viewer's session connected.
    ViewerJoined {
        /// The viewer that joined.
        viewer: ViewerId,
    },
    /// A viewer's session disconnected.
    ViewerLeft {
        /// The viewer that left.
        viewer: ViewerId,
    },
}

/// Yields the live set of connected viewers.
///
/// The engine only needs these two operations; everything else about session
/// management stays behind this seam.
pub trait SessionProvider: Send + Sync {
    /// The viewers currently connected.
    fn connected_viewers(&self) -> Vec<ViewerId>;

    /// The packet connection for one viewer, absent if disconnected.
    fn connection_for(&self, viewer: &ViewerId) -> Option<ViewerConnection>;
}

/// Source of viewer world positions, used by distance-based visibility.
///
/// Kept separate from [`SessionProvider`] so transports that do not track
/// positions can still provide sessions.
pub trait ViewerPositions: Send + Sync {
    /// Where the viewer currently is, absent if unknown or disconnected.
    fn position_of(&self, viewer: &ViewerId) -> Option<Position>;
}

/// One tracked viewer session.
#[derive(Debug)]
struct ViewerSession {
    conn: ViewerConnection,
    token: SessionToken,
    position: Option<Position>,
}

/// In-process session provider backed by a concurrent map.
///
/// The server side registers sessions as transports hand them over; the
/// returned packet receiver is the transport's (or test's) view of the
/// client.
#[derive(Debug, Default)]
pub struct InMemorySessionProvider {
    sessions: DashMap<ViewerId, ViewerSession>,
}

impl InMemorySessionProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer session and return its client-side packet receiver.
    ///
    /// Reconnecting an already-known viewer replaces the previous session.
    pub fn connect(&self, viewer: ViewerId) -> mpsc::Receiver<WirePacket> {
        let (conn, rx) = ViewerConnection::channel(viewer);
        let token = SessionToken::new();
        tracing::info!(
            viewer = %viewer,
            session = %token,
            "Viewer session connected"
        );
        self.sessions.insert(
            viewer,
            ViewerSession {
                conn,
                token,
                position: None,
            },
        );
        rx
    }

    /// Drop a viewer session. Returns true if it existed.
    pub fn disconnect(&self, viewer: &ViewerId) -> bool {
        let removed = self.sessions.remove(viewer).is_some();
        if removed {
            tracing::info!(viewer = %viewer, "Viewer session disconnected");
        }
        removed
    }

    /// The session token minted when the viewer connected.
    #[must_use]
    pub fn session_token(&self, viewer: &ViewerId) -> Option<SessionToken> {
        self.sessions.get(viewer).map(|session| session.token.clone())
    }

    /// Record the viewer's current world position.
    pub fn set_position(&self, viewer: &ViewerId, position: Position) {
        if let Some(mut session) = self.sessions.get_mut(viewer) {
            session.position = Some(position);
        }
    }

    /// Number of tracked sessions, including ones whose client side has
    /// already gone away.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions whose client-side channel is gone.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_disconnected(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|viewer, session| {
            let open = session.conn.is_open();
            if !open {
                tracing::info!(viewer = %viewer, "Removing dead viewer session");
            }
            open
        });
        before - self.sessions.len()
    }
}

impl SessionProvider for InMemorySessionProvider {
    fn connected_viewers(&self) -> Vec<ViewerId> {
        self.sessions
            .iter()
            .filter(|entry| entry.conn.is_open())
            .map(|entry| *entry.key())
            .collect()
    }

    fn connection_for(&self, viewer: &ViewerId) -> Option<ViewerConnection> {
        self.sessions
            .get(viewer)
            .filter(|session| session.conn.is_open())
            .map(|session| session.conn.clone())
    }
}

impl ViewerPositions for InMemorySessionProvider {
    fn position_of(&self, viewer: &ViewerId) -> Option<Position> {
        self.sessions
            .get(viewer)
            .and_then(|session| session.position.clone())
    }
}
