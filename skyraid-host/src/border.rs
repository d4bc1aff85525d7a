//! Read-only territory views for host presentation: the world border shown to
//! an actor standing in a territory, and status summaries.

use serde::Serialize;
use skyraid_core::config::BorderConfig;
use skyraid_core::protection::ProtectionStateMachine;
use skyraid_core::registry::TerritoryRegistry;
use skyraid_core::territory::Territory;
use skyraid_core::types::{ActorId, Anchor, ColumnPos, DisplayColor, TerritoryId};

/// Border to draw around the territory containing a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BorderView {
    /// Border center, on the block center of the territory center column.
    pub center: (f64, f64),
    /// Side length.
    pub size: f64,
    /// Territory colour.
    pub color: DisplayColor,
}

/// Border for whoever stands at `pos`. `None` in unclaimed space or when the
/// territory has its border turned off.
#[must_use]
pub fn border_for(registry: &TerritoryRegistry, pos: ColumnPos, config: &BorderConfig) -> Option<BorderView> {
    let territory = registry.by_position(pos)?;
    if territory.color == DisplayColor::Off {
        return None;
    }
    Some(BorderView {
        center: (
            f64::from(territory.center.x) + 0.5,
            f64::from(territory.center.z) + 0.5,
        ),
        size: config.size,
        color: territory.color,
    })
}

/// Status snapshot of one territory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerritorySummary {
    /// Identity.
    pub id: TerritoryId,
    /// Display name.
    pub name: String,
    /// Owner.
    pub owner: ActorId,
    /// Members, sorted, owner included.
    pub members: Vec<ActorId>,
    /// Leaders other than the owner, sorted.
    pub leaders: Vec<ActorId>,
    /// Pending invites.
    pub invites: usize,
    /// Center column.
    pub center: ColumnPos,
    /// Home anchor as stored.
    pub home: Anchor,
    /// Colour.
    pub color: DisplayColor,
    /// Milliseconds of protection left; 0 when unprotected.
    pub protection_remaining_ms: i64,
    /// Creation time.
    pub created_at_ms: i64,
}

impl TerritorySummary {
    /// Whether the territory was shielded when the summary was taken.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.protection_remaining_ms > 0
    }
}

/// Summarise `territory` as of `now_ms`.
#[must_use]
pub fn summary_of(territory: &Territory, now_ms: i64) -> TerritorySummary {
    let mut leaders: Vec<_> = territory
        .leaders
        .iter()
        .copied()
        .filter(|l| *l != territory.owner)
        .collect();
    leaders.sort();
    let remaining = ProtectionStateMachine::remaining(territory, now_ms);
    TerritorySummary {
        id: territory.id,
        name: territory.name.clone(),
        owner: territory.owner,
        members: territory.sorted_members(),
        leaders,
        invites: territory.invites.len(),
        center: territory.center,
        home: territory.anchor,
        color: territory.color,
        protection_remaining_ms: i64::try_from(remaining.as_millis()).unwrap_or(i64::MAX),
        created_at_ms: territory.created_at_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyraid_core::config::TerritoryConfig;

    fn registry_with(color: DisplayColor) -> (TerritoryRegistry, TerritoryId) {
        let mut registry = TerritoryRegistry::new(&TerritoryConfig::default());
        let mut t = Territory::new(ActorId::new(), "Keep", ColumnPos::new(1000, 0), 69.0, 0);
        t.color = color;
        let id = t.id;
        registry.register(t).expect("register");
        (registry, id)
    }

    #[test]
    fn border_follows_the_territory_under_the_actor() {
        let (registry, _) = registry_with(DisplayColor::Red);
        let config = BorderConfig::default();
        let view = border_for(&registry, ColumnPos::new(1020, -30), &config).expect("inside");
        assert_eq!(view.center, (1000.5, 0.5));
        assert_eq!(view.color, DisplayColor::Red);
        assert!((view.size - 500.0).abs() < f64::EPSILON);
        assert!(border_for(&registry, ColumnPos::new(500, 0), &config).is_none());
    }

    #[test]
    fn disabled_border_is_hidden() {
        let (registry, _) = registry_with(DisplayColor::Off);
        assert!(border_for(&registry, ColumnPos::new(1000, 0), &BorderConfig::default()).is_none());
    }

    #[test]
    fn summary_reports_remaining_protection() {
        let (registry, id) = registry_with(DisplayColor::Blue);
        let mut t = registry.by_id(id).expect("territory").clone();
        t.protection_expiry_ms = 10_000;
        let s = summary_of(&t, 4_000);
        assert_eq!(s.protection_remaining_ms, 6_000);
        assert!(s.is_protected());
        assert_eq!(s.members, vec![t.owner]);
        assert!(s.leaders.is_empty());
        assert!(!summary_of(&t, 10_000).is_protected());
    }
}
