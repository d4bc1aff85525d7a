//! Host-side error types.

use skyraid_core::error::SkyraidError;
use skyraid_core::types::{ActorId, ColumnPos};
use thiserror::Error;

/// Failure while painting a new territory's terrain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerrainError {
    /// The target area is already built on.
    #[error("Area around {0} is not empty")]
    Occupied(ColumnPos),
    /// The painter refused or crashed.
    #[error("Terrain painter failed: {0}")]
    Failed(String),
}

/// Errors surfaced by the host integration layer.
#[derive(Error, Debug)]
pub enum HostError {
    /// Core rule violation or storage failure.
    #[error(transparent)]
    Core(#[from] SkyraidError),

    /// The actor already has a territory being created.
    #[error("A territory is already being created for {0}")]
    CreationInProgress(ActorId),

    /// Terrain painting failed; nothing was registered.
    #[error(transparent)]
    Terrain(#[from] TerrainError),

    /// The actor does not belong to any territory.
    #[error("{0} does not belong to a territory")]
    NoTerritory(ActorId),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, HostError>;
