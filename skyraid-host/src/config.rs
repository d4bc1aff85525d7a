//! Host-side configuration: which terrain provider is available and how the
//! starter platform is sized, on top of the core `SkyraidConfig`.

use std::path::Path;

use skyraid_core::config::SkyraidConfig;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Terrain capability
// ---------------------------------------------------------------------------

/// What the host can do to the world when a territory is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainCapability {
    /// The host exposes a writable world: build a starter platform.
    Full,
    /// No world editing available: territories are created on empty space.
    None,
}

impl TerrainCapability {
    /// Human-readable description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Full => "Full: starter platforms are painted on creation",
            Self::None => "None: territories are claimed without terrain",
        }
    }

    /// Pick a capability once at startup.
    ///
    /// `SKYRAID_TERRAIN=none` forces the no-op provider; otherwise the
    /// platform painter is used whenever the host has a world to write to.
    #[must_use]
    pub fn detect(world_writable: bool) -> Self {
        let forced_off = std::env::var("SKYRAID_TERRAIN")
            .map(|v| v.eq_ignore_ascii_case("none"))
            .unwrap_or(false);
        if world_writable && !forced_off {
            Self::Full
        } else {
            Self::None
        }
    }
}

// ---------------------------------------------------------------------------
// Host configuration
// ---------------------------------------------------------------------------

/// Full configuration for a host integration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Core territory settings.
    pub core: SkyraidConfig,
    /// Terrain provider selection.
    pub terrain: TerrainCapability,
    /// Radius of the starter platform painted by the full provider.
    pub platform_radius: i32,
    /// Height of the starter platform surface.
    pub platform_height: i32,
}

impl HostConfig {
    /// Host config around a core config, detecting terrain support.
    #[must_use]
    pub fn new(core: SkyraidConfig, world_writable: bool) -> Self {
        Self {
            core,
            terrain: TerrainCapability::detect(world_writable),
            ..Self::default()
        }
    }

    /// Load the core config from a TOML file.
    ///
    /// # Errors
    /// Propagates read, parse and validation failures.
    pub fn load(path: &Path, world_writable: bool) -> Result<Self> {
        Ok(Self::new(SkyraidConfig::from_file(path)?, world_writable))
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            core: SkyraidConfig::default(),
            terrain: TerrainCapability::Full,
            platform_radius: 4,
            platform_height: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_hosts_get_no_terrain() {
        assert_eq!(TerrainCapability::detect(false), TerrainCapability::None);
    }

    #[test]
    fn load_reads_core_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("skyraid.toml");
        std::fs::write(&path, "[territory]\nmax_members = 4\n").expect("write");
        let config = HostConfig::load(&path, false).expect("load");
        assert_eq!(config.core.territory.max_members, 4);
        assert_eq!(config.terrain, TerrainCapability::None);
    }

    #[test]
    fn invalid_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("skyraid.toml");
        std::fs::write(&path, "[territory]\nstride = 10\n").expect("write");
        assert!(HostConfig::load(&path, true).is_err());
    }
}
