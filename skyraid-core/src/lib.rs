//! # SkyRaid Core Library
//!
//! Game-agnostic territory ownership for shared open worlds.
//!
//! The world is partitioned into non-overlapping footprints laid out on a
//! square spiral. Each footprint belongs to one group of actors, and every
//! movement, block edit, attack or container access is arbitrated against
//! that ownership:
//!
//! - [`allocator`]: deterministic spiral placement of territory centers
//! - [`registry`]: id, membership and position lookups
//! - [`protection`]: time-boxed shields, evaluated lazily
//! - [`access`]: the allow/deny decision run on every action
//! - [`anchor`]: safe placement search for teleports and respawns
//! - [`membership`]: invites, kicks, roles, home and colour
//! - [`persistence`]: SQLite-backed storage
//!
//! ## Performance Contract
//!
//! `decide` and `by_position` are in-memory and allocation-free; with the
//! grid index a lookup probes at most nine buckets regardless of the number
//! of territories.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod allocator;
pub mod anchor;
pub mod clock;
pub mod config;
pub mod creation;
pub mod error;
pub mod membership;
pub mod metrics;
pub mod persistence;
pub mod protection;
pub mod registry;
pub mod territory;
pub mod types;

pub use access::{AccessDecisionEngine, AccessPolicy, ActionKind, Decision, DenyReason};
pub use allocator::CoordinateAllocator;
pub use anchor::{Resolution, SafeAnchorResolver, SparseWorld, WorldView};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SkyraidConfig;
pub use error::SkyraidError;
pub use persistence::{SqliteStore, TerritoryStore};
pub use protection::{ProtectionState, ProtectionStateMachine};
pub use registry::{Removal, TerritoryRegistry};
pub use territory::{Footprint, Territory};
pub use types::*;
