//! Safe placement search around a candidate anchor.
//!
//! A cell `(x, y, z)` is safe when the block below is solid and not a
//! hazard, and the feet and head blocks are not solid. The search visits,
//! in order:
//!
//! 1. the candidate itself
//! 2. the candidate column, alternating up then down
//! 3. a square ring of neighbouring columns over a vertical band
//!
//! and falls back to the candidate when nothing qualifies. Resolution never
//! fails.

use std::collections::HashMap;

use tracing::debug;

use crate::config::{AnchorConfig, WorldConfig};
use crate::types::{Anchor, BlockPos};

// ---------------------------------------------------------------------------
// World view
// ---------------------------------------------------------------------------

/// The two block properties the search cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockState {
    /// Blocks movement; can be stood on.
    pub solid: bool,
    /// Hurts whoever stands on or in it.
    pub hazard: bool,
}

impl BlockState {
    /// Empty space.
    pub const AIR: Self = Self { solid: false, hazard: false };
    /// Plain solid ground.
    pub const SOLID: Self = Self { solid: true, hazard: false };
    /// Lava, fire: passable but dangerous.
    pub const LAVA: Self = Self { solid: false, hazard: true };
    /// Magma, cactus: solid but dangerous to stand on.
    pub const MAGMA: Self = Self { solid: true, hazard: true };
}

/// Read-only access to blocks and vertical bounds.
pub trait WorldView {
    /// Block at `pos`. Unknown positions are air.
    fn block(&self, pos: BlockPos) -> BlockState;

    /// Lowest valid Y.
    fn min_height(&self) -> i32;

    /// One above the highest valid Y.
    fn max_height(&self) -> i32;
}

/// In-memory block map. Everything not set is air.
#[derive(Debug, Clone)]
pub struct SparseWorld {
    blocks: HashMap<BlockPos, BlockState>,
    min_height: i32,
    max_height: i32,
}

impl SparseWorld {
    /// Empty world with the given height bounds.
    #[must_use]
    pub fn new(min_height: i32, max_height: i32) -> Self {
        Self {
            blocks: HashMap::new(),
            min_height,
            max_height,
        }
    }

    /// Empty world sized from configuration.
    #[must_use]
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.min_height, config.max_height)
    }

    /// Set a single block. Setting air removes the entry.
    pub fn set(&mut self, pos: BlockPos, state: BlockState) {
        if state == BlockState::AIR {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, state);
        }
    }

    /// Fill the inclusive box spanned by `a` and `b`.
    pub fn fill(&mut self, a: BlockPos, b: BlockPos, state: BlockState) {
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                for z in a.z.min(b.z)..=a.z.max(b.z) {
                    self.set(BlockPos::new(x, y, z), state);
                }
            }
        }
    }

    /// Number of non-air blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether every block is air.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl WorldView for SparseWorld {
    fn block(&self, pos: BlockPos) -> BlockState {
        self.blocks.get(&pos).copied().unwrap_or_default()
    }

    fn min_height(&self) -> i32 {
        self.min_height
    }

    fn max_height(&self) -> i32 {
        self.max_height
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Which search phase produced the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The candidate was already safe.
    Exact,
    /// Found in the candidate's own column.
    Vertical,
    /// Found in a neighbouring column.
    Nearby,
    /// Nothing safe; the candidate is returned unchanged.
    Fallback,
}

/// A resolved anchor and how it was found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Where to place the actor.
    pub anchor: Anchor,
    /// Search phase that produced it.
    pub outcome: Outcome,
}

impl Resolution {
    /// Whether the anchor is known to be safe.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.outcome != Outcome::Fallback
    }
}

/// Bounded safe-spot search.
#[derive(Debug, Clone)]
pub struct SafeAnchorResolver {
    vertical_radius: i32,
    horizontal_radius: i32,
    vertical_band: i32,
}

impl Default for SafeAnchorResolver {
    fn default() -> Self {
        Self::new(&AnchorConfig::default())
    }
}

impl SafeAnchorResolver {
    /// Resolver with configured search bounds. Negative radii count as 0.
    #[must_use]
    pub fn new(config: &AnchorConfig) -> Self {
        Self {
            vertical_radius: config.vertical_radius.max(0),
            horizontal_radius: config.horizontal_radius.max(0),
            vertical_band: config.vertical_band.max(0),
        }
    }

    /// Whether an actor can stand with feet at `pos`.
    pub fn is_safe<W: WorldView + ?Sized>(world: &W, pos: BlockPos) -> bool {
        let (Some(below), Some(head)) = (pos.y.checked_sub(1), pos.y.checked_add(1)) else {
            return false;
        };
        if below < world.min_height() || head >= world.max_height() {
            return false;
        }
        let ground = world.block(BlockPos::new(pos.x, below, pos.z));
        ground.solid
            && !ground.hazard
            && !world.block(pos).solid
            && !world.block(BlockPos::new(pos.x, head, pos.z)).solid
    }

    /// Find the nearest safe placement for `candidate`.
    pub fn resolve<W: WorldView + ?Sized>(&self, world: &W, candidate: Anchor) -> Resolution {
        let base = candidate.block();
        if Self::is_safe(world, base) {
            return Resolution {
                anchor: candidate,
                outcome: Outcome::Exact,
            };
        }

        for dy in 1..=self.vertical_radius {
            for y in [base.y.checked_add(dy), base.y.checked_sub(dy)].into_iter().flatten() {
                let pos = BlockPos::new(base.x, y, base.z);
                if Self::is_safe(world, pos) {
                    return centred(pos, candidate, Outcome::Vertical);
                }
            }
        }

        let h = self.horizontal_radius;
        let band = self.vertical_band;
        for dx in -h..=h {
            for dz in -h..=h {
                if dx == 0 && dz == 0 {
                    continue;
                }
                let (Some(x), Some(z)) = (base.x.checked_add(dx), base.z.checked_add(dz)) else {
                    continue;
                };
                for dy in -band..=band {
                    let Some(y) = base.y.checked_add(dy) else {
                        continue;
                    };
                    let pos = BlockPos::new(x, y, z);
                    if Self::is_safe(world, pos) {
                        return centred(pos, candidate, Outcome::Nearby);
                    }
                }
            }
        }

        debug!(candidate = %candidate, "No safe anchor nearby, using candidate as-is");
        Resolution {
            anchor: candidate,
            outcome: Outcome::Fallback,
        }
    }
}

fn centred(pos: BlockPos, facing: Anchor, outcome: Outcome) -> Resolution {
    Resolution {
        anchor: Anchor {
            x: f64::from(pos.x) + 0.5,
            y: f64::from(pos.y),
            z: f64::from(pos.z) + 0.5,
            yaw: facing.yaw,
            pitch: facing.pitch,
        },
        outcome,
    }
}
