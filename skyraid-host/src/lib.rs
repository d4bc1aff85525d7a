//! # skyraid-host: Host Integration for SkyRaid
//!
//! This crate connects the game-agnostic `skyraid-core` library to a game
//! server: it turns host events into access checks, runs territory creation
//! off the main loop, and answers respawn and border queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Game server                   │
//! │  ┌────────────────────────────────────────┐  │
//! │  │            skyraid-host                │  │
//! │  │  ┌────────────┐   ┌─────────────────┐  │  │
//! │  │  │ ActionGate │   │ CreationPipeline│  │  │
//! │  │  └─────┬──────┘   └───────┬─────────┘  │  │
//! │  │        ▼                  ▼            │  │
//! │  │   ┌──────────────────────────────┐     │  │
//! │  │   │       TerritoryService       │     │  │
//! │  │   └──────────────┬───────────────┘     │  │
//! │  │                  ▼                     │  │
//! │  │   ┌──────────────────────────────┐     │  │
//! │  │   │         skyraid-core         │     │  │
//! │  │   └──────────────────────────────┘     │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `service`: `TerritoryService`, the single owner of registry and store
//! - `events`: host actions that are checked before they take effect
//! - `hooks`: the action gate that turns decisions into cancel messages
//! - `pipeline`: background creation on the blocking pool
//! - `terrain`: platform and no-op terrain painters
//! - `respawn`: respawn points and void falls
//! - `border`: border views and territory summaries
//! - `config`: host configuration and terrain capability detection
//! - `logging`: tracing subscriber setup

pub mod border;
pub mod config;
pub mod error;
pub mod events;
pub mod hooks;
pub mod logging;
pub mod pipeline;
pub mod respawn;
pub mod service;
pub mod terrain;

pub use error::{HostError, Result, TerrainError};
pub use hooks::{ActionGate, Verdict};
pub use service::{CreationReport, Created, TerritoryService};
