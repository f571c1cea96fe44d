//! Visibility Criteria
//!
//! The predicate deciding whether a viewer should currently see a hologram.
//! Criteria are injected into the engine; the reconciliation loop only ever
//! calls [`VisibilityCriteria::should_show`] and never embeds permission or
//! distance logic itself.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::hologram::Hologram;
use crate::session::{ViewerId, ViewerPositions};

/// Decides whether one viewer should currently see one hologram.
pub trait VisibilityCriteria: Send + Sync {
    /// True when `viewer` should be shown `hologram` right now.
    fn should_show(&self, hologram: &Hologram, viewer: &ViewerId) -> bool;
}

/// Criteria that shows every hologram to every viewer.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysVisible;

impl VisibilityCriteria for AlwaysVisible {
    fn should_show(&self, _hologram: &Hologram, _viewer: &ViewerId) -> bool {
        true
    }
}

/// Criteria gated on an explicit per-viewer grant set.
#[derive(Debug, Default)]
pub struct PermissionCriteria {
    granted: RwLock<HashSet<ViewerId>>,
}

impl PermissionCriteria {
    /// Create with no grants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant hologram visibility to a viewer.
    pub fn grant(&self, viewer: ViewerId) {
        self.granted.write().insert(viewer);
    }

    /// Revoke a viewer's grant. Returns true if one existed.
    pub fn revoke(&self, viewer: &ViewerId) -> bool {
        self.granted.write().remove(viewer)
    }

    /// Whether the viewer holds a grant.
    #[must_use]
    pub fn is_granted(&self, viewer: &ViewerId) -> bool {
        self.granted.read().contains(viewer)
    }
}

impl VisibilityCriteria for PermissionCriteria {
    fn should_show(&self, _hologram: &Hologram, viewer: &ViewerId) -> bool {
        self.is_granted(viewer)
    }
}

/// Criteria limiting visibility to viewers within range in the same world.
///
/// A viewer with no known position is never in range.
pub struct RangeCriteria {
    positions: Arc<dyn ViewerPositions>,
    max_distance: f64,
}

impl RangeCriteria {
    /// Create a range check against a viewer position source.
    #[must_use]
    pub fn new(positions: Arc<dyn ViewerPositions>, max_distance: f64) -> Self {
        Self {
            positions,
            max_distance,
        }
    }

    /// The configured maximum distance.
    #[must_use]
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }
}

impl VisibilityCriteria for RangeCriteria {
    fn should_show(&self, hologram: &Hologram, viewer: &ViewerId) -> bool {
        self.positions
            .position_of(viewer)
            .and_then(|position| hologram.position().distance_to(&position))
            .is_some_and(|distance| distance <= self.max_distance)
    }
}

impl std::fmt::Debug for RangeCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeCriteria")
            .field("max_distance", &self.max_distance)
            .finish()
    }
}

/// Composite requiring every inner criteria to pass.
///
/// An empty composite passes everything.
#[derive(Clone, Default)]
pub struct AllOf {
    criteria: Vec<Arc<dyn VisibilityCriteria>>,
}

impl AllOf {
    /// Create an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criteria to the conjunction.
    #[must_use]
    pub fn with(mut self, criteria: Arc<dyn VisibilityCriteria>) -> Self {
        self.criteria.push(criteria);
        self
    }
}

impl VisibilityCriteria for AllOf {
    fn should_show(&self, hologram: &Hologram, viewer: &ViewerId) -> bool {
        self.criteria
            .iter()
            .all(|criteria| criteria.should_show(hologram, viewer))
    }
}

impl std::fmt::Debug for AllOf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllOf")
            .field("criteria", &self.criteria.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::hologram::{HologramId, Position, WorldId};
    use crate::protocol::{select_adapter, ProtocolVersion};
    use crate::session::InMemorySessionProvider;

    fn hologram_at(position: Position) -> Hologram {
        let adapter = select_adapter(ProtocolVersion(762)).unwrap();
        Hologram::new(
            HologramId::new("h"),
            position,
            vec!["line".to_string()],
            adapter,
            &EngineConfig::default(),
        )
    }

    #[test]
    fn test_permission_grant_revoke() {
        let criteria = PermissionCriteria::new();
        let viewer = ViewerId::new();
        let hologram = hologram_at(Position::new(WorldId::new("world"), 0.0, 64.0, 0.0));

        assert!(!criteria.should_show(&hologram, &viewer));
        criteria.grant(viewer);
        assert!(criteria.should_show(&hologram, &viewer));
        assert!(criteria.revoke(&viewer));
        assert!(!criteria.should_show(&hologram, &viewer));
    }

    #[test]
    fn test_range_requires_same_world_and_distance() {
        let provider = Arc::new(InMemorySessionProvider::new());
        let near = ViewerId::new();
        let far = ViewerId::new();
        let elsewhere = ViewerId::new();
        let _rx1 = provider.connect(near);
        let _rx2 = provider.connect(far);
        let _rx3 = provider.connect(elsewhere);

        provider.set_position(&near, Position::new(WorldId::new("world"), 8.0, 64.0, 0.0));
        provider.set_position(&far, Position::new(WorldId::new("world"), 100.0, 64.0, 0.0));
        provider.set_position(
            &elsewhere,
            Position::new(WorldId::new("nether"), 0.0, 64.0, 0.0),
        );

        let criteria = RangeCriteria::new(provider, 48.0);
        let hologram = hologram_at(Position::new(WorldId::new("world"), 0.0, 64.0, 0.0));

        assert!(criteria.should_show(&hologram, &near));
        assert!(!criteria.should_show(&hologram, &far));
        assert!(!criteria.should_show(&hologram, &elsewhere));
        // Unknown position is never in range.
        assert!(!criteria.should_show(&hologram, &ViewerId::new()));
    }

    #[test]
    fn test_all_of_conjunction() {
        let viewer = ViewerId::new();
        let hologram = hologram_at(Position::new(WorldId::new("world"), 0.0, 64.0, 0.0));

        let permission = Arc::new(PermissionCriteria::new());
        let composite = AllOf::new()
            .with(Arc::new(AlwaysVisible))
            .with(permission.clone());

        assert!(!composite.should_show(&hologram, &viewer));
        permission.grant(viewer);
        assert!(composite.should_show(&hologram, &viewer));

        assert!(AllOf::new().should_show(&hologram, &viewer));
    }
}
