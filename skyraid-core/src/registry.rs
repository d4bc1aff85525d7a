//! Authoritative in-memory collection of territories.
//!
//! Three views are kept in lock-step:
//! - `territories`: id → record
//! - `memberships`: actor → id (an actor belongs to at most one territory)
//! - a spatial index answering "who owns column (x, z)?"
//!
//! All mutation that touches membership or geometry goes through this type.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::config::{SpatialIndexKind, TerritoryConfig};
use crate::error::{Result, SkyraidError};
use crate::territory::{Footprint, Territory};
use crate::types::{ActorId, ColumnPos, TerritoryId};

// ---------------------------------------------------------------------------
// Spatial index seam
// ---------------------------------------------------------------------------

/// Position → territory lookup structure.
///
/// Implementations only narrow the candidate set; the registry performs the
/// exact footprint test through `contains`.
pub trait SpatialIndex: fmt::Debug + Send + Sync {
    /// Record a territory centred on `center`.
    fn insert(&mut self, id: TerritoryId, center: ColumnPos);

    /// Forget a territory.
    fn remove(&mut self, id: TerritoryId, center: ColumnPos);

    /// First candidate for which `contains` holds.
    fn find(&self, pos: ColumnPos, contains: &dyn Fn(TerritoryId) -> bool) -> Option<TerritoryId>;
}

/// Scan every territory. O(n) per lookup, zero bookkeeping.
#[derive(Debug, Default)]
pub struct LinearIndex {
    ids: Vec<TerritoryId>,
}

impl SpatialIndex for LinearIndex {
    fn insert(&mut self, id: TerritoryId, _center: ColumnPos) {
        self.ids.push(id);
    }

    fn remove(&mut self, id: TerritoryId, _center: ColumnPos) {
        self.ids.retain(|other| *other != id);
    }

    fn find(&self, _pos: ColumnPos, contains: &dyn Fn(TerritoryId) -> bool) -> Option<TerritoryId> {
        self.ids.iter().copied().find(|id| contains(*id))
    }
}

/// Buckets keyed by the nearest spiral lattice node.
///
/// With `half_width < stride / 2`, any column inside a footprint rounds to a
/// node at most one step away from the footprint's own node, so a 3×3 probe
/// is exhaustive even for centers that do not sit exactly on the lattice.
#[derive(Debug)]
pub struct GridIndex {
    stride: i64,
    buckets: HashMap<(i64, i64), Vec<TerritoryId>>,
}

impl GridIndex {
    /// Empty grid for the given stride.
    #[must_use]
    pub fn new(stride: i32) -> Self {
        Self {
            stride: i64::from(stride.max(1)),
            buckets: HashMap::new(),
        }
    }

    fn node(&self, pos: ColumnPos) -> (i64, i64) {
        let half = self.stride / 2;
        (
            (i64::from(pos.x) + half).div_euclid(self.stride),
            (i64::from(pos.z) + half).div_euclid(self.stride),
        )
    }
}

impl SpatialIndex for GridIndex {
    fn insert(&mut self, id: TerritoryId, center: ColumnPos) {
        let node = self.node(center);
        self.buckets.entry(node).or_default().push(id);
    }

    fn remove(&mut self, id: TerritoryId, center: ColumnPos) {
        let node = self.node(center);
        if let Some(bucket) = self.buckets.get_mut(&node) {
            bucket.retain(|other| *other != id);
            if bucket.is_empty() {
                self.buckets.remove(&node);
            }
        }
    }

    fn find(&self, pos: ColumnPos, contains: &dyn Fn(TerritoryId) -> bool) -> Option<TerritoryId> {
        let (nx, nz) = self.node(pos);
        for dx in -1..=1 {
            for dz in -1..=1 {
                if let Some(bucket) = self.buckets.get(&(nx + dx, nz + dz)) {
                    if let Some(id) = bucket.iter().copied().find(|id| contains(*id)) {
                        return Some(id);
                    }
                }
            }
        }
        None
    }
}

/// Build the index selected by configuration.
#[must_use]
pub fn build_index(config: &TerritoryConfig) -> Box<dyn SpatialIndex> {
    match config.spatial_index {
        SpatialIndexKind::Linear => Box::new(LinearIndex::default()),
        SpatialIndexKind::Grid => Box::new(GridIndex::new(config.stride)),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Result of removing a member.
#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    /// The actor left; the territory lives on.
    Left,
    /// The territory was dissolved and unregistered. Carries the final record.
    Dissolved(Territory),
}

/// Counts from [`TerritoryRegistry::rehydrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RehydrateReport {
    /// Territories registered.
    pub loaded: usize,
    /// Territories skipped (duplicate ids, empty, or conflicting members).
    pub skipped: usize,
    /// Membership rows that disagreed with the territory records.
    pub stale_memberships: usize,
}

/// The territory registry.
pub struct TerritoryRegistry {
    geometry: TerritoryConfig,
    territories: HashMap<TerritoryId, Territory>,
    memberships: HashMap<ActorId, TerritoryId>,
    index: Box<dyn SpatialIndex>,
}

impl fmt::Debug for TerritoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerritoryRegistry")
            .field("territories", &self.territories.len())
            .field("memberships", &self.memberships.len())
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl TerritoryRegistry {
    /// Empty registry using the configured geometry and index.
    #[must_use]
    pub fn new(config: &TerritoryConfig) -> Self {
        Self::with_index(config, build_index(config))
    }

    /// Empty registry with an explicit index implementation.
    #[must_use]
    pub fn with_index(config: &TerritoryConfig, index: Box<dyn SpatialIndex>) -> Self {
        Self {
            geometry: config.clone(),
            territories: HashMap::new(),
            memberships: HashMap::new(),
            index,
        }
    }

    /// Geometry used for containment.
    #[must_use]
    pub fn geometry(&self) -> &TerritoryConfig {
        &self.geometry
    }

    /// Footprint of a registered territory.
    #[must_use]
    pub fn footprint_of(&self, territory: &Territory) -> Footprint {
        territory.footprint(&self.geometry)
    }

    /// Insert a territory.
    ///
    /// The owner is forced into `members` and `leaders` is trimmed to
    /// `members` before insertion.
    ///
    /// # Errors
    /// `DuplicateId` if the id is taken; `AlreadyInTerritory` if any member
    /// belongs to another territory.
    pub fn register(&mut self, mut territory: Territory) -> Result<()> {
        if self.territories.contains_key(&territory.id) {
            return Err(SkyraidError::DuplicateId(territory.id));
        }
        territory.members.insert(territory.owner);
        let members = &territory.members;
        territory.leaders.retain(|l| members.contains(l));

        if let Some((actor, other)) = territory
            .members
            .iter()
            .find_map(|a| self.memberships.get(a).map(|t| (*a, *t)))
        {
            return Err(SkyraidError::AlreadyInTerritory {
                actor,
                territory: other,
            });
        }

        for actor in &territory.members {
            self.memberships.insert(*actor, territory.id);
        }
        self.index.insert(territory.id, territory.center);
        debug!(
            territory = %territory.id,
            center = %territory.center,
            members = territory.members.len(),
            "Territory registered"
        );
        self.territories.insert(territory.id, territory);
        Ok(())
    }

    /// Remove a territory and release its members. No-op when absent.
    pub fn unregister(&mut self, id: TerritoryId) -> Option<Territory> {
        let territory = self.territories.remove(&id)?;
        for actor in &territory.members {
            if self.memberships.get(actor) == Some(&id) {
                self.memberships.remove(actor);
            }
        }
        self.index.remove(id, territory.center);
        debug!(territory = %id, "Territory unregistered");
        Some(territory)
    }

    /// Look up by id.
    #[must_use]
    pub fn by_id(&self, id: TerritoryId) -> Option<&Territory> {
        self.territories.get(&id)
    }

    /// The territory whose footprint contains the column, if any.
    #[must_use]
    pub fn by_position(&self, pos: ColumnPos) -> Option<&Territory> {
        let contains = |id: TerritoryId| {
            self.territories
                .get(&id)
                .is_some_and(|t| self.footprint_of(t).contains(pos))
        };
        self.index
            .find(pos, &contains)
            .and_then(|id| self.territories.get(&id))
    }

    /// The territory `actor` belongs to, if any.
    #[must_use]
    pub fn membership_of(&self, actor: ActorId) -> Option<&Territory> {
        self.memberships
            .get(&actor)
            .and_then(|id| self.territories.get(id))
    }

    /// Add `actor` to a territory, clearing any pending invite.
    ///
    /// # Errors
    /// `TerritoryNotFound`, or `AlreadyInTerritory` if the actor belongs
    /// anywhere (including this territory).
    pub fn add_member(&mut self, id: TerritoryId, actor: ActorId) -> Result<()> {
        if let Some(current) = self.memberships.get(&actor) {
            return Err(SkyraidError::AlreadyInTerritory {
                actor,
                territory: *current,
            });
        }
        let territory = self
            .territories
            .get_mut(&id)
            .ok_or(SkyraidError::TerritoryNotFound(id))?;
        territory.members.insert(actor);
        territory.invites.remove(&actor);
        self.memberships.insert(actor, id);
        Ok(())
    }

    /// Remove `actor` from a territory. The territory dissolves when the
    /// owner leaves or nobody is left.
    ///
    /// # Errors
    /// `TerritoryNotFound` or `NotAMember`.
    pub fn remove_member(&mut self, id: TerritoryId, actor: ActorId) -> Result<Removal> {
        let territory = self
            .territories
            .get_mut(&id)
            .ok_or(SkyraidError::TerritoryNotFound(id))?;
        if !territory.members.contains(&actor) {
            return Err(SkyraidError::NotAMember {
                actor,
                territory: id,
            });
        }

        if actor == territory.owner || territory.members.len() == 1 {
            let dissolved = self
                .unregister(id)
                .ok_or(SkyraidError::TerritoryNotFound(id))?;
            info!(territory = %id, last_actor = %actor, "Territory dissolved");
            return Ok(Removal::Dissolved(dissolved));
        }

        territory.members.remove(&actor);
        territory.leaders.remove(&actor);
        self.memberships.remove(&actor);
        Ok(Removal::Left)
    }

    /// Mutate fields that do not affect the indices (anchor, colour,
    /// protection, leaders, invites, name).
    ///
    /// # Errors
    /// `TerritoryNotFound`.
    pub fn update<R>(&mut self, id: TerritoryId, f: impl FnOnce(&mut Territory) -> R) -> Result<R> {
        let territory = self
            .territories
            .get_mut(&id)
            .ok_or(SkyraidError::TerritoryNotFound(id))?;
        let (center, owner, members) = (territory.center, territory.owner, territory.members.len());
        let out = f(territory);
        debug_assert_eq!(territory.center, center, "update must not move a territory");
        debug_assert_eq!(territory.owner, owner, "update must not change the owner");
        debug_assert_eq!(territory.members.len(), members, "use add_member/remove_member");
        Ok(out)
    }

    /// Rebuild from persisted state.
    ///
    /// `memberships` are the stored actor → territory rows; they are checked
    /// against the records and mismatches are logged and ignored. Records
    /// are authoritative.
    pub fn rehydrate(
        &mut self,
        territories: Vec<Territory>,
        memberships: &[(ActorId, TerritoryId)],
    ) -> RehydrateReport {
        let mut report = RehydrateReport::default();
        for territory in territories {
            let id = territory.id;
            if territory.members.is_empty() {
                warn!(territory = %id, "Skipping stored territory with no members");
                report.skipped += 1;
                continue;
            }
            if !territory.is_consistent() {
                warn!(territory = %id, "Repairing inconsistent stored territory");
            }
            match self.register(territory) {
                Ok(()) => report.loaded += 1,
                Err(e) => {
                    warn!(territory = %id, error = %e, "Skipping stored territory");
                    report.skipped += 1;
                }
            }
        }
        for (actor, id) in memberships {
            if self.memberships.get(actor) != Some(id) {
                warn!(actor = %actor, territory = %id, "Stale membership row ignored");
                report.stale_memberships += 1;
            }
        }
        info!(
            loaded = report.loaded,
            skipped = report.skipped,
            stale_memberships = report.stale_memberships,
            "Registry rehydrated"
        );
        report
    }

    /// All territories, unordered.
    pub fn iter(&self) -> impl Iterator<Item = &Territory> {
        self.territories.values()
    }

    /// All actor → territory pairs, unordered.
    pub fn memberships(&self) -> impl Iterator<Item = (ActorId, TerritoryId)> + '_ {
        self.memberships.iter().map(|(a, t)| (*a, *t))
    }

    /// Number of territories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.territories.len()
    }

    /// Whether no territories are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::CoordinateAllocator;

    fn geometry(kind: SpatialIndexKind) -> TerritoryConfig {
        TerritoryConfig {
            spatial_index: kind,
            ..TerritoryConfig::default()
        }
    }

    fn territory_at(center: ColumnPos) -> Territory {
        Territory::new(ActorId::new(), "t", center, 69.0, 0)
    }

    #[test]
    fn by_position_respects_half_width() {
        for kind in [SpatialIndexKind::Linear, SpatialIndexKind::Grid] {
            let mut reg = TerritoryRegistry::new(&geometry(kind));
            let t = territory_at(ColumnPos::new(0, 0));
            let id = t.id;
            reg.register(t).expect("register");
            assert_eq!(reg.by_position(ColumnPos::new(25, 25)).map(|t| t.id), Some(id));
            assert!(reg.by_position(ColumnPos::new(51, 0)).is_none());
            assert!(reg.by_position(ColumnPos::new(-50, 50)).is_some());
        }
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut reg = TerritoryRegistry::new(&TerritoryConfig::default());
        let t = territory_at(ColumnPos::new(0, 0));
        let mut copy = territory_at(ColumnPos::new(1000, 0));
        copy.id = t.id;
        reg.register(t).expect("first");
        assert!(matches!(reg.register(copy), Err(SkyraidError::DuplicateId(_))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn actor_cannot_belong_to_two_territories() {
        let mut reg = TerritoryRegistry::new(&TerritoryConfig::default());
        let a = territory_at(ColumnPos::new(0, 0));
        let mut b = territory_at(ColumnPos::new(1000, 0));
        b.members.insert(a.owner);
        reg.register(a).expect("a");
        assert!(matches!(
            reg.register(b),
            Err(SkyraidError::AlreadyInTerritory { .. })
        ));
    }

    #[test]
    fn unregister_releases_everything() {
        let mut reg = TerritoryRegistry::new(&TerritoryConfig::default());
        let t = territory_at(ColumnPos::new(1000, 1000));
        let (id, owner) = (t.id, t.owner);
        reg.register(t).expect("register");
        assert!(reg.unregister(id).is_some());
        assert!(reg.unregister(id).is_none(), "second unregister is a no-op");
        assert!(reg.membership_of(owner).is_none());
        assert!(reg.by_position(ColumnPos::new(1000, 1000)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn grid_finds_every_spiral_node() {
        let config = geometry(SpatialIndexKind::Grid);
        let mut reg = TerritoryRegistry::new(&config);
        let mut alloc = CoordinateAllocator::new(config.stride);
        let mut placed = Vec::new();
        for _ in 0..30 {
            let t = territory_at(alloc.next());
            placed.push((t.id, t.center));
            reg.register(t).expect("register");
        }
        for (id, c) in placed {
            let corner = ColumnPos::new(c.x - 50, c.z + 50);
            assert_eq!(reg.by_position(corner).map(|t| t.id), Some(id));
        }
        assert!(reg.by_position(ColumnPos::new(500, 500)).is_none());
    }

    #[test]
    fn grid_handles_off_lattice_centers() {
        let mut reg = TerritoryRegistry::new(&geometry(SpatialIndexKind::Grid));
        let t = territory_at(ColumnPos::new(470, -530));
        let id = t.id;
        reg.register(t).expect("register");
        assert_eq!(reg.by_position(ColumnPos::new(519, -579)).map(|t| t.id), Some(id));
        assert_eq!(reg.by_position(ColumnPos::new(421, -481)).map(|t| t.id), Some(id));
    }

    #[test]
    fn member_lifecycle_and_dissolution() {
        let mut reg = TerritoryRegistry::new(&TerritoryConfig::default());
        let t = territory_at(ColumnPos::new(0, 0));
        let (id, owner) = (t.id, t.owner);
        reg.register(t).expect("register");

        let friend = ActorId::new();
        reg.add_member(id, friend).expect("join");
        assert_eq!(reg.membership_of(friend).map(|t| t.id), Some(id));
        assert!(matches!(
            reg.add_member(id, friend),
            Err(SkyraidError::AlreadyInTerritory { .. })
        ));

        assert_eq!(reg.remove_member(id, friend).expect("leave"), Removal::Left);
        assert!(reg.membership_of(friend).is_none());

        match reg.remove_member(id, owner).expect("owner leaves") {
            Removal::Dissolved(t) => assert_eq!(t.id, id),
            Removal::Left => panic!("owner leaving must dissolve"),
        }
        assert!(reg.by_id(id).is_none());
    }

    #[test]
    fn rehydrate_skips_conflicts_and_flags_stale_rows() {
        let a = territory_at(ColumnPos::new(0, 0));
        let mut b = territory_at(ColumnPos::new(1000, 0));
        b.members.insert(a.owner);
        let mut empty = territory_at(ColumnPos::new(0, 1000));
        empty.members.clear();
        let ghost = ActorId::new();
        let rows = vec![(a.owner, a.id), (ghost, a.id)];

        let mut reg = TerritoryRegistry::new(&TerritoryConfig::default());
        let report = reg.rehydrate(vec![a, b, empty], &rows);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.stale_memberships, 1);
    }
}
