//! The territory record and its footprint geometry.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::{FootprintShape, TerritoryConfig};
use crate::types::{ActorId, Anchor, ColumnPos, DisplayColor, TerritoryId};

// ---------------------------------------------------------------------------
// Footprint
// ---------------------------------------------------------------------------

/// The horizontal region owned by a territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    /// Center column.
    pub center: ColumnPos,
    /// Distance from the center to the edge, inclusive.
    pub half_width: i32,
    /// Square or circle.
    pub shape: FootprintShape,
}

impl Footprint {
    /// Build a footprint around `center`.
    #[must_use]
    pub const fn new(center: ColumnPos, half_width: i32, shape: FootprintShape) -> Self {
        Self {
            center,
            half_width,
            shape,
        }
    }

    /// Footprint for `center` using the configured geometry.
    #[must_use]
    pub fn from_config(center: ColumnPos, config: &TerritoryConfig) -> Self {
        Self::new(center, config.half_width, config.shape)
    }

    /// Whether the column lies inside. Edges are inclusive.
    #[must_use]
    pub fn contains(&self, pos: ColumnPos) -> bool {
        let dx = i128::from(pos.x) - i128::from(self.center.x);
        let dz = i128::from(pos.z) - i128::from(self.center.z);
        let r = i128::from(self.half_width);
        match self.shape {
            FootprintShape::Square => dx.abs() <= r && dz.abs() <= r,
            FootprintShape::Circle => dx * dx + dz * dz <= r * r,
        }
    }

    /// Whether an anchor's column lies inside.
    #[must_use]
    pub fn contains_anchor(&self, anchor: &Anchor) -> bool {
        self.contains(anchor.column())
    }
}

// ---------------------------------------------------------------------------
// Territory
// ---------------------------------------------------------------------------

/// A unit of ownership: one group, one footprint.
///
/// Membership fields must only be changed through the registry or the
/// membership operations so that the actor → territory index stays in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    /// Stable identifier.
    pub id: TerritoryId,
    /// Founding actor. Always a member, implicitly a leader.
    pub owner: ActorId,
    /// Display name.
    pub name: String,
    /// All members, owner included.
    pub members: HashSet<ActorId>,
    /// Members with elevated permissions. The owner need not be listed.
    pub leaders: HashSet<ActorId>,
    /// Actors invited but not yet joined.
    #[serde(default)]
    pub invites: HashSet<ActorId>,
    /// Spiral node this territory sits on.
    pub center: ColumnPos,
    /// Home / return point.
    pub anchor: Anchor,
    /// Epoch ms until which the territory is protected; 0 means never.
    #[serde(default)]
    pub protection_expiry_ms: i64,
    /// Border colour.
    #[serde(default)]
    pub color: DisplayColor,
    /// Epoch ms of creation.
    #[serde(default)]
    pub created_at_ms: i64,
}

impl Territory {
    /// A new single-member territory with the anchor placed `anchor_height`
    /// above the center.
    #[must_use]
    pub fn new(
        owner: ActorId,
        name: impl Into<String>,
        center: ColumnPos,
        anchor_height: f64,
        created_at_ms: i64,
    ) -> Self {
        let mut members = HashSet::new();
        members.insert(owner);
        Self {
            id: TerritoryId::new(),
            owner,
            name: name.into(),
            members,
            leaders: HashSet::new(),
            invites: HashSet::new(),
            center,
            anchor: default_anchor(center, anchor_height),
            protection_expiry_ms: 0,
            color: DisplayColor::default(),
            created_at_ms,
        }
    }

    /// Whether `actor` belongs here.
    #[must_use]
    pub fn is_member(&self, actor: ActorId) -> bool {
        self.members.contains(&actor)
    }

    /// Whether `actor` is the owner or a promoted leader.
    #[must_use]
    pub fn is_leader(&self, actor: ActorId) -> bool {
        actor == self.owner || (self.leaders.contains(&actor) && self.is_member(actor))
    }

    /// Whether `actor` is the owner.
    #[must_use]
    pub fn is_owner(&self, actor: ActorId) -> bool {
        actor == self.owner
    }

    /// Whether `actor` holds a pending invite.
    #[must_use]
    pub fn is_invited(&self, actor: ActorId) -> bool {
        self.invites.contains(&actor)
    }

    /// Member count.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Footprint under the given geometry.
    #[must_use]
    pub fn footprint(&self, config: &TerritoryConfig) -> Footprint {
        Footprint::from_config(self.center, config)
    }

    /// Members sorted for stable presentation.
    #[must_use]
    pub fn sorted_members(&self) -> Vec<ActorId> {
        let mut members: Vec<_> = self.members.iter().copied().collect();
        members.sort();
        members
    }

    /// Check the structural invariants: non-empty members, owner present,
    /// leaders a subset of members.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        !self.members.is_empty()
            && self.members.contains(&self.owner)
            && self.leaders.is_subset(&self.members)
    }
}

/// The home point a fresh territory starts with: block-centred above `center`.
#[must_use]
pub fn default_anchor(center: ColumnPos, anchor_height: f64) -> Anchor {
    Anchor::at(
        f64::from(center.x) + 0.5,
        anchor_height,
        f64::from(center.z) + 0.5,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(half: i32) -> Footprint {
        Footprint::new(ColumnPos::new(0, 0), half, FootprintShape::Square)
    }

    #[test]
    fn square_containment_is_inclusive() {
        let fp = square(50);
        assert!(fp.contains(ColumnPos::new(25, 25)));
        assert!(fp.contains(ColumnPos::new(50, -50)));
        assert!(!fp.contains(ColumnPos::new(51, 0)));
        assert!(!fp.contains(ColumnPos::new(0, -51)));
    }

    #[test]
    fn circle_cuts_corners() {
        let fp = Footprint::new(ColumnPos::new(1000, 0), 50, FootprintShape::Circle);
        assert!(fp.contains(ColumnPos::new(1050, 0)));
        assert!(fp.contains(ColumnPos::new(1030, 40)));
        assert!(!fp.contains(ColumnPos::new(1040, 40)));
    }

    #[test]
    fn containment_does_not_overflow_at_extremes() {
        let fp = Footprint::new(ColumnPos::new(i32::MAX, i32::MIN), 50, FootprintShape::Circle);
        assert!(!fp.contains(ColumnPos::new(i32::MIN, i32::MAX)));
    }

    #[test]
    fn new_territory_is_consistent() {
        let owner = ActorId::new();
        let t = Territory::new(owner, "Keep", ColumnPos::new(1000, -1000), 69.0, 42);
        assert!(t.is_consistent());
        assert!(t.is_leader(owner));
        assert!(t.is_owner(owner));
        assert_eq!(t.anchor, Anchor::at(1000.5, 69.0, -999.5));
        assert_eq!(t.protection_expiry_ms, 0);
    }

    #[test]
    fn stale_leader_entry_does_not_grant_rights() {
        let owner = ActorId::new();
        let ghost = ActorId::new();
        let mut t = Territory::new(owner, "Keep", ColumnPos::new(0, 0), 69.0, 0);
        t.leaders.insert(ghost);
        assert!(!t.is_leader(ghost));
        assert!(!t.is_consistent());
    }
}
