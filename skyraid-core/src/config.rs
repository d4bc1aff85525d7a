//! Configuration for the SkyRaid territory system.
//!
//! Maps directly to `skyraid.toml`. Every field has a serde default so a
//! partial (or empty) file is valid.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyraidError};
use crate::types::Anchor;

/// Top-level SkyRaid configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(Default)]
pub struct SkyraidConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Territory geometry and membership limits.
    #[serde(default)]
    pub territory: TerritoryConfig,
    /// Protection (forcefield) grants.
    #[serde(default)]
    pub protection: ProtectionConfig,
    /// Access policy knobs.
    #[serde(default)]
    pub access: AccessConfig,
    /// Safe-anchor search bounds.
    #[serde(default)]
    pub anchor: AnchorConfig,
    /// World height bounds and spawn.
    #[serde(default)]
    pub world: WorldConfig,
    /// Falling-out-of-the-world handling.
    #[serde(default)]
    pub void: VoidConfig,
    /// Border presentation.
    #[serde(default)]
    pub border: BorderConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl SkyraidConfig {
    /// Load configuration from a TOML string and validate it.
    ///
    /// # Errors
    /// Returns `SkyraidError::Config` if the TOML is invalid or fails
    /// [`SkyraidConfig::validate`].
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| SkyraidError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field invariants that serde cannot express.
    ///
    /// # Errors
    /// Returns `SkyraidError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        let t = &self.territory;
        if t.half_width <= 0 {
            return Err(SkyraidError::Config(format!(
                "territory.half_width must be positive, got {}",
                t.half_width
            )));
        }
        // Footprints are inclusive squares of width 2*half_width + 1.
        if i64::from(t.stride) <= 2 * i64::from(t.half_width) {
            return Err(SkyraidError::Config(format!(
                "territory.stride ({}) must exceed the footprint width (2 * {})",
                t.stride, t.half_width
            )));
        }
        if t.max_members == 0 {
            return Err(SkyraidError::Config(
                "territory.max_members must be at least 1".to_string(),
            ));
        }
        if let Some(bad) = self.protection.durations_hours.iter().find(|h| **h <= 0) {
            return Err(SkyraidError::Config(format!(
                "protection.durations_hours contains a non-positive tier: {bad}"
            )));
        }
        if self.protection.grant_on_creation && self.protection.initial_grant_hours <= 0 {
            return Err(SkyraidError::Config(
                "protection.initial_grant_hours must be positive when grant_on_creation is set"
                    .to_string(),
            ));
        }
        if self.world.min_height >= self.world.max_height {
            return Err(SkyraidError::Config(format!(
                "world.min_height ({}) must be below world.max_height ({})",
                self.world.min_height, self.world.max_height
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable text.
    #[serde(default)]
    pub log_json: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// Shape of a territory footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootprintShape {
    /// Axis-aligned square: `|dx| <= r && |dz| <= r`.
    #[default]
    Square,
    /// Disc: `dx² + dz² <= r²`.
    Circle,
}

/// Which spatial index backs `by_position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialIndexKind {
    /// Scan every territory.
    Linear,
    /// Bucket by nearest spiral lattice node.
    #[default]
    Grid,
}

/// Territory geometry and membership configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritoryConfig {
    /// Center-to-center spacing between spiral nodes.
    #[serde(default = "default_stride")]
    pub stride: i32,
    /// Footprint half-width around the center.
    #[serde(default = "default_half_width")]
    pub half_width: i32,
    /// Footprint shape.
    #[serde(default)]
    pub shape: FootprintShape,
    /// Height of the default home anchor above the center.
    #[serde(default = "default_anchor_height")]
    pub anchor_height: f64,
    /// Member cap per territory.
    #[serde(default = "default_max_members")]
    pub max_members: usize,
    /// Spatial index used for position lookups.
    #[serde(default)]
    pub spatial_index: SpatialIndexKind,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            stride: 1000,
            half_width: 50,
            shape: FootprintShape::Square,
            anchor_height: 69.0,
            max_members: 8,
            spatial_index: SpatialIndexKind::Grid,
        }
    }
}

/// Protection (forcefield) grant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Grant tiers, in hours, that hosts may hand out.
    #[serde(default = "default_durations")]
    pub durations_hours: Vec<i64>,
    /// Whether a newly created territory starts protected.
    #[serde(default)]
    pub grant_on_creation: bool,
    /// Duration of the creation grant in hours.
    #[serde(default = "default_initial_grant")]
    pub initial_grant_hours: i64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            durations_hours: vec![6, 12, 24],
            grant_on_creation: false,
            initial_grant_hours: 6,
        }
    }
}

/// Access policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Let actors whose own territory is protected still *walk into*
    /// unprotected foreign territories. Raiding actions stay blocked.
    #[serde(default)]
    pub shielded_may_enter: bool,
    /// Block kinds whose interaction counts as opening a container.
    #[serde(default = "default_protected_blocks")]
    pub protected_blocks: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            shielded_may_enter: false,
            protected_blocks: default_protected_blocks(),
        }
    }
}

/// Safe-anchor search bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// How far up and down the candidate column is searched.
    #[serde(default = "default_vertical_radius")]
    pub vertical_radius: i32,
    /// Horizontal ring radius for the neighbourhood search.
    #[serde(default = "default_horizontal_radius")]
    pub horizontal_radius: i32,
    /// Vertical band searched at every neighbouring column.
    #[serde(default = "default_vertical_band")]
    pub vertical_band: i32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            vertical_radius: 10,
            horizontal_radius: 2,
            vertical_band: 5,
        }
    }
}

/// World bounds and fallback spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Lowest buildable Y.
    #[serde(default = "default_min_height")]
    pub min_height: i32,
    /// One above the highest buildable Y.
    #[serde(default = "default_max_height")]
    pub max_height: i32,
    /// Where actors without a territory respawn.
    #[serde(default = "default_spawn")]
    pub spawn: Anchor,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            min_height: -64,
            max_height: 320,
            spawn: default_spawn(),
        }
    }
}

/// Handling of actors who fall below the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoidConfig {
    /// Y below which an actor counts as fallen.
    #[serde(default)]
    pub threshold_y: f64,
    /// Teleport fallen actors back instead of damaging them.
    #[serde(default = "default_true")]
    pub teleport_back: bool,
    /// Teleport to the territory home rather than its center.
    #[serde(default = "default_true")]
    pub to_home: bool,
    /// Apply damage when `teleport_back` is off.
    #[serde(default)]
    pub damage_enabled: bool,
    /// Damage per check when damage is enabled.
    #[serde(default = "default_damage")]
    pub damage_amount: f32,
}

impl Default for VoidConfig {
    fn default() -> Self {
        Self {
            threshold_y: 0.0,
            teleport_back: true,
            to_home: true,
            damage_enabled: false,
            damage_amount: 2.0,
        }
    }
}

/// Border presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderConfig {
    /// Visual border size (larger than the footprint so it never limits building).
    #[serde(default = "default_border_size")]
    pub size: f64,
}

impl Default for BorderConfig {
    fn default() -> Self {
        Self { size: 500.0 }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Number of save backups to keep.
    #[serde(default = "default_3")]
    pub backup_count: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            checksum_enabled: true,
            backup_count: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_stride() -> i32 { 1000 }
fn default_half_width() -> i32 { 50 }
fn default_anchor_height() -> f64 { 69.0 }
fn default_max_members() -> usize { 8 }
fn default_durations() -> Vec<i64> { vec![6, 12, 24] }
fn default_initial_grant() -> i64 { 6 }
fn default_vertical_radius() -> i32 { 10 }
fn default_horizontal_radius() -> i32 { 2 }
fn default_vertical_band() -> i32 { 5 }
fn default_min_height() -> i32 { -64 }
fn default_max_height() -> i32 { 320 }
fn default_spawn() -> Anchor { Anchor::at(0.5, 100.0, 0.5) }
fn default_damage() -> f32 { 2.0 }
fn default_border_size() -> f64 { 500.0 }
fn default_3() -> u32 { 3 }
fn default_protected_blocks() -> Vec<String> {
    [
        "CHEST",
        "TRAPPED_CHEST",
        "BARREL",
        "SHULKER_BOX",
        "FURNACE",
        "BLAST_FURNACE",
        "SMOKER",
        "HOPPER",
        "DISPENSER",
        "DROPPER",
        "BREWING_STAND",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = SkyraidConfig::from_toml("").expect("parse");
        assert_eq!(config.territory.stride, 1000);
        assert_eq!(config.territory.half_width, 50);
        assert_eq!(config.territory.shape, FootprintShape::Square);
        assert_eq!(config.territory.spatial_index, SpatialIndexKind::Grid);
        assert!(!config.access.shielded_may_enter);
        assert!(config.access.protected_blocks.iter().any(|b| b == "CHEST"));
    }

    #[test]
    fn partial_sections_override() {
        let config = SkyraidConfig::from_toml(
            r#"
            [territory]
            stride = 400
            half_width = 120
            shape = "circle"
            spatial_index = "linear"

            [protection]
            durations_hours = [1, 2]
            "#,
        )
        .expect("parse");
        assert_eq!(config.territory.stride, 400);
        assert_eq!(config.territory.shape, FootprintShape::Circle);
        assert_eq!(config.territory.spatial_index, SpatialIndexKind::Linear);
        assert_eq!(config.protection.durations_hours, vec![1, 2]);
        assert_eq!(config.territory.max_members, 8, "untouched fields keep defaults");
    }

    #[test]
    fn overlapping_footprints_are_rejected() {
        let err = SkyraidConfig::from_toml("[territory]\nstride = 100\nhalf_width = 50\n")
            .expect_err("stride == 2 * half_width overlaps at the seam");
        assert!(matches!(err, SkyraidError::Config(_)));
    }

    #[test]
    fn non_positive_tiers_are_rejected() {
        let err = SkyraidConfig::from_toml("[protection]\ndurations_hours = [6, 0]\n")
            .expect_err("zero tier");
        assert!(err.to_string().contains("non-positive"));
    }

    #[test]
    fn inverted_world_bounds_are_rejected() {
        let mut config = SkyraidConfig::default();
        config.world.min_height = 100;
        config.world.max_height = 50;
        assert!(config.validate().is_err());
    }
}
