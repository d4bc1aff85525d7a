//! Terrain providers run by the creation pipeline.
//!
//! A painter prepares the ground at a freshly allocated center before the
//! territory is registered. Painters run on the blocking pool and must not
//! touch the registry.

use std::sync::Arc;

use parking_lot::RwLock;
use skyraid_core::anchor::{BlockState, SparseWorld, WorldView};
use skyraid_core::types::{BlockPos, ColumnPos};
use tracing::debug;

use crate::config::{HostConfig, TerrainCapability};
use crate::error::TerrainError;

/// Shared, host-owned world.
pub type SharedWorld = Arc<RwLock<SparseWorld>>;

/// Prepares terrain for a new territory.
pub trait TerrainPainter: Send + Sync {
    /// Paint around `center`.
    ///
    /// # Errors
    /// `Occupied` if the area is already built on, `Failed` otherwise.
    fn paint(&self, center: ColumnPos) -> Result<(), TerrainError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Platform painter
// ---------------------------------------------------------------------------

/// Paints a square starter platform with a small tree on one corner.
#[derive(Debug, Clone)]
pub struct PlatformPainter {
    world: SharedWorld,
    radius: i32,
    height: i32,
}

impl PlatformPainter {
    /// Painter writing into `world`.
    #[must_use]
    pub fn new(world: SharedWorld, radius: i32, height: i32) -> Self {
        Self {
            world,
            radius: radius.max(1),
            height,
        }
    }
}

impl TerrainPainter for PlatformPainter {
    fn paint(&self, center: ColumnPos) -> Result<(), TerrainError> {
        let mut world = self.world.write();
        let h = self.height;
        if h <= world.min_height() || h + 6 >= world.max_height() {
            return Err(TerrainError::Failed(format!(
                "platform height {h} outside world bounds"
            )));
        }
        if world.block(BlockPos::new(center.x, h, center.z)).solid {
            return Err(TerrainError::Occupied(center));
        }

        let r = self.radius;
        world.fill(
            BlockPos::new(center.x - r, h, center.z - r),
            BlockPos::new(center.x + r, h, center.z + r),
            BlockState::SOLID,
        );

        // tree, kept off the center column so the default home stays clear
        let (tx, tz) = (center.x + r - 1, center.z + r - 1);
        world.fill(
            BlockPos::new(tx - 1, h + 4, tz - 1),
            BlockPos::new(tx + 1, h + 5, tz + 1),
            BlockState::SOLID,
        );
        world.fill(BlockPos::new(tx, h + 1, tz), BlockPos::new(tx, h + 4, tz), BlockState::SOLID);

        debug!(center = %center, radius = r, height = h, "Starter platform painted");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "platform"
    }
}

// ---------------------------------------------------------------------------
// No-op painter
// ---------------------------------------------------------------------------

/// Leaves the world untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPainter;

impl TerrainPainter for NoopPainter {
    fn paint(&self, _center: ColumnPos) -> Result<(), TerrainError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Painter for the detected capability.
#[must_use]
pub fn painter_for(config: &HostConfig, world: SharedWorld) -> Arc<dyn TerrainPainter> {
    match config.terrain {
        TerrainCapability::Full => Arc::new(PlatformPainter::new(
            world,
            config.platform_radius,
            config.platform_height,
        )),
        TerrainCapability::None => Arc::new(NoopPainter),
    }
}
