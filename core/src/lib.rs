//! Holo Core - Per-Viewer Hologram Rendering for Session Servers
//!
//! This crate renders persistent, multi-line floating text objects
//! ("holograms") to the connected clients of a stateful multiplayer session
//! server. The objects are pure client-visible facades: they never exist as
//! server-authoritative entities, only as display packets sent selectively
//! per viewer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       HOLOGRAM ENGINE                            │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │ VisibilityScheduler (periodic reconciliation tick)         │  │
//! │  │        │ reads                    │ reads                  │  │
//! │  │  HologramRegistry          SessionProvider                 │  │
//! │  │        │                          │                        │  │
//! │  │        ▼ show / hide per (hologram, viewer)                │  │
//! │  │    Hologram ── owns ──▶ VirtualObject ── 1 per line ──▶    │  │
//! │  │                              │              LineProxy      │  │
//! │  │                              ▼                             │  │
//! │  │                       ProtocolAdapter                      │  │
//! │  └──────────────────────────────┼─────────────────────────────┘  │
//! └─────────────────────────────────┼────────────────────────────────┘
//!                                   │ WirePacket (per viewer connection)
//!                                   ▼
//!                     viewer clients (fire-and-forget)
//! ```
//!
//! The scheduler tick is the sole convergence mechanism: for every
//! registered hologram and every connected viewer it computes the desired
//! visibility from the injected [`VisibilityCriteria`] and applies show/hide
//! transitions. Calls made outside the tick (administration edits, viewer
//! join handling) are additive latency optimizations; any dropped or missed
//! send self-heals on the next tick.
//!
//! # Key Types
//!
//! - [`HologramEngine`]: assembled core with start/shutdown lifecycle
//! - [`Hologram`]: the domain entity (show, hide, update, relocate)
//! - [`HologramRegistry`]: process-wide catalog, keyed by id
//! - [`VisibilityScheduler`]: the reconciliation task
//! - [`ProtocolAdapter`]: wire-protocol-version polymorphism seam
//! - [`SessionProvider`] / [`VisibilityCriteria`]: injected collaborators
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use holo_core::{
//!     EngineConfig, HologramEngine, HologramId, InMemorySessionProvider,
//!     Position, RangeCriteria, WorldId,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let sessions = Arc::new(InMemorySessionProvider::new());
//!     let criteria = Arc::new(RangeCriteria::new(sessions.clone(), 48.0));
//!
//!     let mut engine =
//!         HologramEngine::new(EngineConfig::from_env(), sessions.clone(), criteria).unwrap();
//!     engine.start().await.unwrap();
//!
//!     engine
//!         .create_hologram(
//!             HologramId::new("spawn-info"),
//!             Position::new(WorldId::new("world"), 0.0, 64.0, 0.0),
//!             vec!["Welcome!".to_string(), "Vote daily".to_string()],
//!         )
//!         .unwrap();
//!
//!     // ... feed viewer sessions in as they connect ...
//!
//!     engine.shutdown().await.unwrap();
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`protocol`]: adapter trait, wire packet intents, per-version adapters
//! - [`object`]: line proxies and the per-hologram virtual object
//! - [`hologram`]: the hologram domain entity and position types
//! - [`registry`]: process-wide hologram catalog
//! - [`scheduler`]: the periodic visibility reconciliation task
//! - [`session`]: viewer identities, connections, session provider
//! - [`visibility`]: visibility criteria and stock implementations
//! - [`store`]: durable persistence of hologram definitions
//! - [`config`]: engine configuration (defaults, env, TOML)
//! - [`engine`]: assembled engine with lifecycle and admin operations
//!
//! # No Transport Dependencies
//!
//! This crate never opens a socket. Packets are typed intents handed to each
//! viewer's connection channel; the embedding server owns the real
//! transport and the byte-level encoding.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod hologram;
pub mod object;
pub mod protocol;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod visibility;

// Re-exports for convenience
pub use config::{
    load_config_from_path, ConfigError, ConfigFile, EngineConfig, EngineToml, GrowthPolicy,
    DEFAULT_LINE_SPACING, DEFAULT_TICK_INTERVAL,
};
pub use engine::{EngineError, HologramEngine};
pub use hologram::{Hologram, HologramId, Position, WorldId};
pub use object::{LineProxy, VirtualObject};
pub use protocol::{
    select_adapter, ArmorStandAdapter, DisplayFlags, ObjectKind, ProtocolAdapter, ProtocolError,
    ProtocolVersion, TextDisplayAdapter, WireEntityId, WirePacket,
};
pub use registry::{HologramHandle, HologramRegistry};
pub use scheduler::{SchedulerHandle, TickSummary, VisibilityScheduler};
pub use session::{
    InMemorySessionProvider, SessionEvent, SessionProvider, SessionToken, ViewerConnection,
    ViewerId, ViewerPositions,
};
pub use store::{HologramRecord, HologramStore, JsonFileStore, StoreError};
pub use visibility::{
    AllOf, AlwaysVisible, PermissionCriteria, RangeCriteria, VisibilityCriteria,
};
