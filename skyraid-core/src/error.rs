//! Error types for the SkyRaid core library.

use thiserror::Error;

use crate::types::{ActorId, TerritoryId};

/// Top-level error type for all SkyRaid core operations.
#[derive(Error, Debug)]
pub enum SkyraidError {
    /// A territory with this ID is already registered. Ids are freshly
    /// generated, so this indicates a programming error.
    #[error("Duplicate territory id: {0}")]
    DuplicateId(TerritoryId),

    /// Protection was requested for a non-positive duration.
    #[error("Invalid protection duration: {hours}h (must be > 0)")]
    InvalidDuration {
        /// The rejected duration in hours.
        hours: i64,
    },

    /// No territory with the given ID is registered.
    #[error("Territory not found: {0}")]
    TerritoryNotFound(TerritoryId),

    /// The actor already belongs to a territory.
    #[error("Actor {actor} already belongs to territory {territory}")]
    AlreadyInTerritory {
        /// The actor.
        actor: ActorId,
        /// The territory the actor currently belongs to.
        territory: TerritoryId,
    },

    /// The actor is not a member of the territory.
    #[error("Actor {actor} is not a member of territory {territory}")]
    NotAMember {
        /// The actor.
        actor: ActorId,
        /// The territory.
        territory: TerritoryId,
    },

    /// The actor tried to accept an invitation that does not exist.
    #[error("Actor {actor} has no pending invite to territory {territory}")]
    NotInvited {
        /// The actor.
        actor: ActorId,
        /// The territory.
        territory: TerritoryId,
    },

    /// The territory has reached its member cap.
    #[error("Territory {territory} is full (limit: {limit})")]
    TerritoryFull {
        /// The territory.
        territory: TerritoryId,
        /// Configured member limit.
        limit: usize,
    },

    /// The actor lacks the role required for the operation.
    #[error("Actor {actor} may not {action}")]
    PermissionDenied {
        /// The acting actor.
        actor: ActorId,
        /// What was attempted.
        action: &'static str,
    },

    /// The operation would remove the owner or strip its leadership.
    #[error("The owner of territory {0} cannot be removed or demoted")]
    OwnerImmutable(TerritoryId),

    /// A home anchor was placed outside the territory footprint.
    #[error("Anchor {anchor} lies outside territory {territory}")]
    OutsideFootprint {
        /// The territory.
        territory: TerritoryId,
        /// Rendered anchor position.
        anchor: String,
    },

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, SkyraidError>;
