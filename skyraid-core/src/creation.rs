//! Territory drafts: everything about a new territory except where it goes.
//!
//! The center is only known once the allocator hands one out, which may
//! happen on a worker thread. The draft carries the rest.

use std::collections::HashSet;

use crate::config::{ProtectionConfig, TerritoryConfig};
use crate::error::Result;
use crate::protection::ProtectionStateMachine;
use crate::territory::Territory;
use crate::types::{ActorId, ColumnPos};

/// A pending territory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerritoryDraft {
    /// Founding actor.
    pub owner: ActorId,
    /// Display name.
    pub name: String,
    /// Additional founding members (the owner need not be listed).
    pub members: Vec<ActorId>,
}

impl TerritoryDraft {
    /// Draft with the owner as the only founding member.
    #[must_use]
    pub fn solo(owner: ActorId, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Add founding members. Duplicates and the owner are ignored.
    #[must_use]
    pub fn with_members(mut self, members: impl IntoIterator<Item = ActorId>) -> Self {
        for actor in members {
            if actor != self.owner && !self.members.contains(&actor) {
                self.members.push(actor);
            }
        }
        self
    }

    /// Owner followed by the founding members.
    pub fn actors(&self) -> impl Iterator<Item = ActorId> + '_ {
        std::iter::once(self.owner).chain(self.members.iter().copied())
    }

    /// Materialise at `center` with the default anchor, optionally granting
    /// the creation protection.
    ///
    /// # Errors
    /// `InvalidDuration` if a creation grant is configured with a
    /// non-positive duration.
    pub fn build(
        &self,
        center: ColumnPos,
        territory: &TerritoryConfig,
        protection: &ProtectionConfig,
        now_ms: i64,
    ) -> Result<Territory> {
        let mut built = Territory::new(
            self.owner,
            self.name.clone(),
            center,
            territory.anchor_height,
            now_ms,
        );
        built.members = self.actors().collect::<HashSet<_>>();
        if protection.grant_on_creation {
            ProtectionStateMachine::activate(&mut built, protection.initial_grant_hours, now_ms)?;
        }
        Ok(built)
    }
}
