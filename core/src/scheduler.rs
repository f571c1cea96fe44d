//! Visibility Scheduler
//!
//! The periodic reconciliation task. Every tick walks the full
//! (hologram, viewer) cross product, asks the injected criteria for the
//! desired visibility, and applies show/hide transitions until every online
//! viewer's client state matches server-side truth.
//!
//! The tick is the correctness backstop: show/hide/update calls made
//! elsewhere (administration edits, join handling) are additive
//! optimizations, and any missed or dropped send self-heals on the next
//! tick. A single task owns the loop, so ticks are serialized by
//! construction and can never overlap.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::registry::HologramRegistry;
use crate::session::{SessionProvider, ViewerId};
use crate::visibility::VisibilityCriteria;

/// Outcome of one reconciliation tick, for observability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Holograms examined.
    pub holograms: usize,
    /// Connected viewers examined.
    pub viewers: usize,
    /// Show transitions applied.
    pub shown: usize,
    /// Hide transitions applied.
    pub hidden: usize,
    /// Stale viewer entries pruned.
    pub pruned: usize,
    /// Deferred line spawns flushed to waiting viewers.
    pub flushed: usize,
}

/// Cloneable handle that stops a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    stopped: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Stop the scheduler after its current tick.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether the scheduler has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Periodic task converging viewer-perceived state toward registry truth.
#[derive(Clone)]
pub struct VisibilityScheduler {
    registry: HologramRegistry,
    sessions: Arc<dyn SessionProvider>,
    criteria: Arc<dyn VisibilityCriteria>,
    tick_interval: Duration,
    stopped: Arc<AtomicBool>,
    event_tx: Option<mpsc::UnboundedSender<TickSummary>>,
}

impl VisibilityScheduler {
    /// Create a scheduler over the given registry, sessions and criteria.
    #[must_use]
    pub fn new(
        registry: HologramRegistry,
        sessions: Arc<dyn SessionProvider>,
        criteria: Arc<dyn VisibilityCriteria>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            registry,
            sessions,
            criteria,
            tick_interval,
            stopped: Arc::new(AtomicBool::new(false)),
            event_tx: None,
        }
    }

    /// Create a scheduler that also reports each tick's summary on a channel.
    #[must_use]
    pub fn with_events(
        registry: HologramRegistry,
        sessions: Arc<dyn SessionProvider>,
        criteria: Arc<dyn VisibilityCriteria>,
        tick_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<TickSummary>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut scheduler = Self::new(registry, sessions, criteria, tick_interval);
        scheduler.event_tx = Some(tx);
        (scheduler, rx)
    }

    /// The configured tick interval.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Handle for stopping the scheduler from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            stopped: self.stopped.clone(),
        }
    }

    /// Run one reconciliation pass over every hologram and viewer.
    ///
    /// Exposed separately from [`Self::run`] so tests and embedders can
    /// drive ticks deterministically.
    pub fn run_tick(&self) -> TickSummary {
        let viewers = self.sessions.connected_viewers();
        let connected: HashSet<ViewerId> = viewers.iter().copied().collect();

        let mut summary = TickSummary {
            viewers: viewers.len(),
            ..TickSummary::default()
        };

        for (_, handle) in self.registry.all() {
            summary.holograms += 1;
            let mut hologram = handle.lock();
            summary.pruned += hologram.prune_viewers(&connected);
            summary.flushed += hologram.flush_deferred(&*self.sessions);

            for viewer in &viewers {
                let desired = self.criteria.should_show(&hologram, viewer);
                let currently_shown = hologram.is_viewer(viewer);

                if desired && !currently_shown {
                    if hologram.show(viewer, &*self.sessions, &*self.criteria) {
                        summary.shown += 1;
                    }
                } else if !desired && currently_shown && hologram.hide(viewer, &*self.sessions) {
                    summary.hidden += 1;
                }
            }
        }

        if summary.shown > 0 || summary.hidden > 0 || summary.pruned > 0 || summary.flushed > 0 {
            tracing::debug!(
                holograms = summary.holograms,
                viewers = summary.viewers,
                shown = summary.shown,
                hidden = summary.hidden,
                pruned = summary.pruned,
                flushed = summary.flushed,
                "Visibility tick applied transitions"
            );
        }
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(summary);
        }
        summary
    }

    /// Converge a single viewer across every hologram.
    ///
    /// Used when a session connects, so the viewer does not wait out a full
    /// tick interval for their first packets.
    pub fn converge_viewer(&self, viewer: &ViewerId) {
        for (_, handle) in self.registry.all() {
            let mut hologram = handle.lock();
            let desired = self.criteria.should_show(&hologram, viewer);
            if desired {
                hologram.show(viewer, &*self.sessions, &*self.criteria);
            } else {
                hologram.hide(viewer, &*self.sessions);
            }
        }
    }

    /// Run the reconciliation loop until stopped.
    pub async fn run(self) {
        tracing::info!(
            tick_interval_ms = self.tick_interval.as_millis(),
            "Starting visibility scheduler"
        );

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if self.stopped.load(Ordering::SeqCst) {
                tracing::info!("Visibility scheduler stopped");
                break;
            }

            self.run_tick();
        }
    }
}

impl std::fmt::Debug for VisibilityScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityScheduler")
            .field("tick_interval", &self.tick_interval)
            .field("holograms", &self.registry.count())
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}
