//! Core type definitions for the SkyRaid territory system.
//!
//! All types are serializable so the persistence layer can store them as-is.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for an actor (player or any participant that can own,
/// join, move, fight or build).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub Uuid);

impl ActorId {
    /// Create a new random actor ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a territory. Assigned at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerritoryId(pub Uuid);

impl TerritoryId {
    /// Create a new random territory ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TerritoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A horizontal world column. Territory containment only ever looks at
/// `(x, z)`; height is irrelevant for ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ColumnPos {
    /// X coordinate (east-west).
    pub x: i32,
    /// Z coordinate (north-south).
    pub z: i32,
}

impl ColumnPos {
    /// Create a column position.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for ColumnPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// An integer block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate (height).
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The column this block sits in.
    #[must_use]
    pub const fn column(self) -> ColumnPos {
        ColumnPos { x: self.x, z: self.z }
    }
}

impl From<BlockPos> for ColumnPos {
    fn from(pos: BlockPos) -> Self {
        pos.column()
    }
}

/// A precise position with facing, used for territory homes, respawn
/// points and teleport targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate (feet height).
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Horizontal facing in degrees.
    pub yaw: f32,
    /// Vertical facing in degrees.
    pub pitch: f32,
}

impl Anchor {
    /// Create an anchor with zero yaw and pitch.
    #[must_use]
    pub const fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// The block containing this anchor's feet.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn block(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }

    /// The column containing this anchor.
    #[must_use]
    pub fn column(&self) -> ColumnPos {
        self.block().column()
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::at(0.0, 0.0, 0.0)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Cosmetics
// ---------------------------------------------------------------------------

/// Border colour shown to actors standing inside a territory.
/// Purely cosmetic; never consulted by access logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayColor {
    /// Bright blue (default).
    #[default]
    Blue,
    /// Red.
    Red,
    /// Green.
    Green,
    /// Purple.
    Purple,
    /// Gold yellow.
    Yellow,
    /// No border shown.
    Off,
}

impl DisplayColor {
    /// Every selectable colour, in menu order.
    pub const ALL: [Self; 6] = [
        Self::Blue,
        Self::Red,
        Self::Green,
        Self::Purple,
        Self::Yellow,
        Self::Off,
    ];

    /// RGB value, or `None` for [`DisplayColor::Off`].
    #[must_use]
    pub fn rgb(self) -> Option<u32> {
        match self {
            Self::Blue => Some(0x003F_76E4),
            Self::Red => Some(0x00FF_0000),
            Self::Green => Some(0x0000_FF00),
            Self::Purple => Some(0x009B_59B6),
            Self::Yellow => Some(0x00FF_D700),
            Self::Off => None,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Blue => "Blue",
            Self::Red => "Red",
            Self::Green => "Green",
            Self::Purple => "Purple",
            Self::Yellow => "Yellow",
            Self::Off => "Off",
        }
    }

    /// Lenient, case-insensitive parse. Unknown names fall back to blue.
    #[must_use]
    pub fn parse_lenient(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.display_name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

impl fmt::Display for DisplayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
