//! Hologram Engine
//!
//! Explicitly constructed wiring of the whole core: protocol adapter,
//! registry, session provider, visibility criteria, optional durable store,
//! and the visibility scheduler. Nothing here is a global; the embedding
//! server owns the engine value and shares what it hands in.
//!
//! # Lifecycle
//!
//! - [`HologramEngine::new`] selects the protocol adapter for the
//!   configured version (fatal if unsupported) and builds the scheduler
//! - [`HologramEngine::start`] loads persisted holograms and spawns the
//!   reconciliation task
//! - [`HologramEngine::shutdown`] stops the task, optionally tears every
//!   hologram down for every viewer (best-effort courtesy), and saves the
//!   registry snapshot
//!
//! The administration operations (`create_hologram`, `set_lines`,
//! `relocate`, `remove_hologram`) are the entry points an interactive edit
//! surface calls; each applies the hologram contract directly so edits are
//! visible before the next tick.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::hologram::{Hologram, HologramId, Position};
use crate::protocol::{select_adapter, ProtocolAdapter, ProtocolError};
use crate::registry::HologramRegistry;
use crate::scheduler::{TickSummary, VisibilityScheduler};
use crate::session::{SessionEvent, SessionProvider};
use crate::store::{HologramStore, StoreError};
use crate::visibility::VisibilityCriteria;

/// Errors raised by the hologram engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No adapter exists for the configured protocol version.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A hologram id is already registered.
    #[error("hologram '{0}' already exists")]
    DuplicateHologram(HologramId),

    /// No hologram is registered under the id.
    #[error("hologram '{0}' does not exist")]
    UnknownHologram(HologramId),

    /// The durable store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The engine was started twice.
    #[error("engine already started")]
    AlreadyStarted,
}

/// The assembled hologram core.
pub struct HologramEngine {
    config: EngineConfig,
    adapter: Arc<dyn ProtocolAdapter>,
    registry: HologramRegistry,
    sessions: Arc<dyn SessionProvider>,
    scheduler: VisibilityScheduler,
    store: Option<Arc<dyn HologramStore>>,
    scheduler_task: Option<JoinHandle<()>>,
}

impl HologramEngine {
    /// Assemble an engine from its collaborators.
    ///
    /// Selects the protocol adapter for the configured version; an
    /// unsupported version is a configuration error and nothing can render
    /// without an adapter, so this fails instead of degrading.
    pub fn new(
        config: EngineConfig,
        sessions: Arc<dyn SessionProvider>,
        criteria: Arc<dyn VisibilityCriteria>,
    ) -> Result<Self, EngineError> {
        let adapter = select_adapter(config.protocol_version)?;
        let registry = HologramRegistry::new();
        let scheduler = VisibilityScheduler::new(
            registry.clone(),
            sessions.clone(),
            criteria,
            config.tick_interval,
        );

        Ok(Self {
            config,
            adapter,
            registry,
            sessions,
            scheduler,
            store: None,
            scheduler_task: None,
        })
    }

    /// Attach a durable store for load-at-start / save-at-shutdown.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn HologramStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The hologram registry.
    #[must_use]
    pub fn registry(&self) -> &HologramRegistry {
        &self.registry
    }

    /// The selected protocol adapter.
    #[must_use]
    pub fn adapter(&self) -> Arc<dyn ProtocolAdapter> {
        self.adapter.clone()
    }

    /// Whether the reconciliation task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler_task.is_some()
    }

    /// Load persisted holograms and spawn the reconciliation task.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        if self.scheduler_task.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        if let Some(store) = &self.store {
            let records = store.load_all().await?;
            let loaded = records.len();
            for record in records {
                let hologram = Hologram::from_record(record, self.adapter.clone(), &self.config);
                if self.registry.insert(hologram).is_none() {
                    tracing::warn!("Skipped duplicate hologram id while loading store");
                }
            }
            tracing::info!(holograms = loaded, "Holograms loaded from store");
        }

        self.scheduler_task = Some(tokio::spawn(self.scheduler.clone().run()));
        tracing::info!(
            protocol_version = %self.config.protocol_version,
            tick_interval_ms = self.config.tick_interval.as_millis(),
            "Hologram engine started"
        );
        Ok(())
    }

    /// Stop the reconciliation task, optionally tear everything down for
    /// every viewer, and save the registry snapshot.
    ///
    /// The teardown is a best-effort courtesy: dead connections are skipped
    /// silently and failures never abort the shutdown.
    pub async fn shutdown(&mut self) -> Result<(), EngineError> {
        self.scheduler.handle().stop();
        if let Some(task) = self.scheduler_task.take() {
            task.abort();
            let _ = task.await;
        }

        if self.config.teardown_on_shutdown {
            for (_, handle) in self.registry.all() {
                handle.lock().despawn_all(&*self.sessions);
            }
        }

        if let Some(store) = &self.store {
            store.save_all(&self.registry.snapshot()).await?;
        }

        tracing::info!("Hologram engine shut down");
        Ok(())
    }

    /// Run one reconciliation pass immediately.
    ///
    /// The periodic task is the correctness backstop; this is for tests and
    /// for embedders that want a converged state right now.
    pub fn run_tick(&self) -> TickSummary {
        self.scheduler.run_tick()
    }

    /// React to a session lifecycle event.
    ///
    /// A joining viewer is converged immediately instead of waiting out the
    /// tick interval; a leaving viewer is pruned from every hologram's
    /// bookkeeping (no packets, the connection is gone).
    pub fn handle_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::ViewerJoined { viewer } => {
                tracing::debug!(viewer = %viewer, "Converging joined viewer");
                self.scheduler.converge_viewer(&viewer);
            }
            SessionEvent::ViewerLeft { viewer } => {
                tracing::debug!(viewer = %viewer, "Pruning departed viewer");
                let remaining = self.sessions.connected_viewers().into_iter().collect();
                for (_, handle) in self.registry.all() {
                    let mut hologram = handle.lock();
                    if hologram.is_viewer(&viewer) {
                        hologram.prune_viewers(&remaining);
                    }
                }
            }
        }
    }

    /// Create and register a hologram, showing it to eligible viewers
    /// immediately.
    pub fn create_hologram(
        &self,
        id: HologramId,
        position: Position,
        lines: Vec<String>,
    ) -> Result<(), EngineError> {
        let hologram = Hologram::new(
            id.clone(),
            position,
            lines,
            self.adapter.clone(),
            &self.config,
        );
        if self.registry.insert(hologram).is_none() {
            return Err(EngineError::DuplicateHologram(id));
        }
        for viewer in self.sessions.connected_viewers() {
            self.scheduler.converge_viewer(&viewer);
        }
        Ok(())
    }

    /// Replace a hologram's text lines.
    pub fn set_lines(&self, id: &HologramId, lines: Vec<String>) -> Result<(), EngineError> {
        let handle = self
            .registry
            .get(id)
            .ok_or_else(|| EngineError::UnknownHologram(id.clone()))?;
        handle.lock().update_lines(lines, &*self.sessions);
        Ok(())
    }

    /// Move a hologram to a new position.
    pub fn relocate(&self, id: &HologramId, position: Position) -> Result<(), EngineError> {
        let handle = self
            .registry
            .get(id)
            .ok_or_else(|| EngineError::UnknownHologram(id.clone()))?;
        handle.lock().relocate(position, &*self.sessions);
        Ok(())
    }

    /// Remove a hologram, tearing it down for every current viewer first.
    pub fn remove_hologram(&self, id: &HologramId) -> Result<(), EngineError> {
        if !self.registry.remove(id, &*self.sessions) {
            return Err(EngineError::UnknownHologram(id.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for HologramEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HologramEngine")
            .field("config", &self.config)
            .field("holograms", &self.registry.count())
            .field("running", &self.is_running())
            .finish()
    }
}
