//! Property-Based Tests for SkyRaid Core
//!
//! Uses `proptest` to check placement, containment and search invariants
//! under random inputs.

use std::collections::HashSet;

use proptest::prelude::*;

use skyraid_core::access::{AccessDecisionEngine, ActionKind};
use skyraid_core::allocator::{center_for_index, lattice_cell};
use skyraid_core::anchor::{BlockState, Outcome, SafeAnchorResolver, SparseWorld};
use skyraid_core::config::{FootprintShape, SpatialIndexKind, TerritoryConfig};
use skyraid_core::registry::TerritoryRegistry;
use skyraid_core::territory::Territory;
use skyraid_core::types::{ActorId, Anchor, BlockPos, ColumnPos};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_shape() -> impl Strategy<Value = FootprintShape> {
    prop_oneof![Just(FootprintShape::Square), Just(FootprintShape::Circle)]
}

fn arb_block() -> impl Strategy<Value = BlockState> {
    prop_oneof![
        3 => Just(BlockState::AIR),
        3 => Just(BlockState::SOLID),
        1 => Just(BlockState::LAVA),
        1 => Just(BlockState::MAGMA),
    ]
}

// ---------------------------------------------------------------------------
// Property: the spiral never revisits a cell and walks ring by ring
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn spiral_cells_are_unique_within_a_window(start in 1u64..1_000_000, len in 1usize..500) {
        let cells: HashSet<_> = (start..start + len as u64).map(lattice_cell).collect();
        prop_assert_eq!(cells.len(), len);
    }

    #[test]
    fn spiral_ring_never_shrinks(n in 1u64..10_000_000) {
        let ring = |(x, z): (i64, i64)| x.abs().max(z.abs());
        prop_assert!(ring(lattice_cell(n + 1)) >= ring(lattice_cell(n)));
        prop_assert!(ring(lattice_cell(n + 1)) - ring(lattice_cell(n)) <= 1);
    }

    #[test]
    fn centers_are_stride_multiples(n in 1u64..1_000_000, stride in 101i32..5_000) {
        let c = center_for_index(n, stride);
        prop_assert_eq!(c.x % stride, 0);
        prop_assert_eq!(c.z % stride, 0);
    }
}

// ---------------------------------------------------------------------------
// Property: grid and linear indices agree everywhere
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn grid_and_linear_agree(
        count in 1usize..40,
        shape in arb_shape(),
        half_width in 1i32..200,
        probes in prop::collection::vec((-4_000i32..4_000, -4_000i32..4_000), 1..60),
    ) {
        let base = TerritoryConfig { half_width, shape, ..TerritoryConfig::default() };
        let linear_cfg = TerritoryConfig { spatial_index: SpatialIndexKind::Linear, ..base.clone() };
        let grid_cfg = TerritoryConfig { spatial_index: SpatialIndexKind::Grid, ..base };
        let mut linear = TerritoryRegistry::new(&linear_cfg);
        let mut grid = TerritoryRegistry::new(&grid_cfg);
        for n in 1..=count as u64 {
            let t = Territory::new(ActorId::new(), "t", center_for_index(n, 1000), 69.0, 0);
            linear.register(t.clone()).expect("linear");
            grid.register(t).expect("grid");
        }
        for (x, z) in probes {
            let pos = ColumnPos::new(x, z);
            prop_assert_eq!(
                linear.by_position(pos).map(|t| t.id),
                grid.by_position(pos).map(|t| t.id)
            );
        }
    }

    #[test]
    fn at_most_one_owner_per_column(x in -3_000i32..3_000, z in -3_000i32..3_000) {
        let config = TerritoryConfig::default();
        let mut registry = TerritoryRegistry::new(&config);
        let mut owners = 0;
        for n in 1..=25u64 {
            let t = Territory::new(ActorId::new(), "t", center_for_index(n, config.stride), 69.0, 0);
            if t.footprint(&config).contains(ColumnPos::new(x, z)) {
                owners += 1;
            }
            registry.register(t).expect("register");
        }
        prop_assert!(owners <= 1);
        prop_assert_eq!(owners == 1, registry.by_position(ColumnPos::new(x, z)).is_some());
    }
}

// ---------------------------------------------------------------------------
// Property: access is always allowed at home and in unclaimed space
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn home_and_wilderness_always_allow(
        dx in -50i32..=50,
        dz in -50i32..=50,
        expiry in 0i64..10_000,
        now in 0i64..10_000,
    ) {
        let config = TerritoryConfig::default();
        let mut registry = TerritoryRegistry::new(&config);
        let mut t = Territory::new(ActorId::new(), "t", ColumnPos::new(0, 0), 69.0, 0);
        t.protection_expiry_ms = expiry;
        let owner = t.owner;
        registry.register(t).expect("register");
        let engine = AccessDecisionEngine::default();
        for kind in [ActionKind::Enter, ActionKind::BreakOrPlace, ActionKind::Combat, ActionKind::OpenContainer] {
            prop_assert!(engine.decide(&registry, owner, ColumnPos::new(dx, dz), kind, now).is_allowed());
            prop_assert!(engine.decide(&registry, owner, ColumnPos::new(dx + 500, dz), kind, now).is_allowed());
        }
    }
}

// ---------------------------------------------------------------------------
// Property: the resolver terminates and only returns safe cells or the input
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn resolver_returns_safe_cell_or_candidate(
        blocks in prop::collection::vec(((-3i32..=3, 58i32..=72, -3i32..=3), arb_block()), 0..120),
        cx in -1i32..=1,
        cy in 60i32..=70,
        cz in -1i32..=1,
    ) {
        let mut world = SparseWorld::new(-64, 320);
        for ((x, y, z), state) in blocks {
            world.set(BlockPos::new(x, y, z), state);
        }
        let candidate = Anchor::at(f64::from(cx) + 0.25, f64::from(cy), f64::from(cz) + 0.75);
        let res = SafeAnchorResolver::default().resolve(&world, candidate);
        match res.outcome {
            Outcome::Fallback | Outcome::Exact => prop_assert_eq!(res.anchor, candidate),
            Outcome::Vertical | Outcome::Nearby => {
                prop_assert!(SafeAnchorResolver::is_safe(&world, res.anchor.block()));
            }
        }
        if SafeAnchorResolver::is_safe(&world, candidate.block()) {
            prop_assert_eq!(res.outcome, Outcome::Exact);
        }
    }
}
