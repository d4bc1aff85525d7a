//! The territory service: the single authoritative owner of the registry.
//!
//! Hosts construct one [`TerritoryService`] at startup and route every
//! territory command, action check and respawn query through it. Mutations
//! are written through to the store before the call returns, and rolled
//! back in memory if the write fails.

use std::sync::Arc;

use skyraid_core::access::{ActionKind, Decision};
use skyraid_core::allocator::CoordinateAllocator;
use skyraid_core::anchor::{Outcome, SafeAnchorResolver};
use skyraid_core::clock::Clock;
use skyraid_core::creation::TerritoryDraft;
use skyraid_core::membership;
use skyraid_core::metrics::{CounterSnapshot, SkyraidCounters};
use skyraid_core::persistence::TerritoryStore;
use skyraid_core::protection::ProtectionStateMachine;
use skyraid_core::registry::{RehydrateReport, Removal, TerritoryRegistry};
use skyraid_core::territory::Territory;
use skyraid_core::types::{ActorId, Anchor, ColumnPos, DisplayColor, TerritoryId};
use skyraid_core::SkyraidError;
use tracing::{debug, info, warn};

use crate::border::{self, BorderView, TerritorySummary};
use crate::config::HostConfig;
use crate::error::{HostError, Result, TerrainError};
use crate::events::ActionEvent;
use crate::hooks::{ActionGate, Verdict};
use crate::pipeline::{Completed, CreationPipeline};
use crate::respawn::{self, VoidAction};
use crate::terrain::{self, SharedWorld};

/// A territory that finished creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    /// New territory.
    pub id: TerritoryId,
    /// Its center.
    pub center: ColumnPos,
    /// Where every actor of the draft should be moved, owner first.
    pub placements: Vec<(ActorId, Anchor)>,
}

/// Result of one creation request, reported to its owner.
#[derive(Debug)]
pub struct CreationReport {
    /// Who asked.
    pub owner: ActorId,
    /// What happened.
    pub result: Result<Created>,
}

/// Owns the registry, store, gate and creation pipeline.
pub struct TerritoryService {
    config: HostConfig,
    registry: TerritoryRegistry,
    gate: ActionGate,
    resolver: SafeAnchorResolver,
    store: Box<dyn TerritoryStore>,
    clock: Arc<dyn Clock>,
    world: SharedWorld,
    allocator: CoordinateAllocator,
    pipeline: CreationPipeline,
}

impl std::fmt::Debug for TerritoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerritoryService")
            .field("territories", &self.registry.len())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl TerritoryService {
    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Load everything from `store` and get ready to serve.
    ///
    /// The allocator resumes from the stored counter and then skips any
    /// center that is already claimed.
    ///
    /// # Errors
    /// Storage failures while loading.
    pub fn bootstrap(
        config: HostConfig,
        store: Box<dyn TerritoryStore>,
        clock: Arc<dyn Clock>,
        world: SharedWorld,
    ) -> Result<Self> {
        let mut registry = TerritoryRegistry::new(&config.core.territory);
        let territories = store.load_all_territories()?;
        let memberships = store.load_all_memberships()?;
        let report = registry.rehydrate(territories, &memberships);

        let stored = store.load_placement_counter()?;
        let mut allocator =
            CoordinateAllocator::with_counter(stored.unwrap_or(1), config.core.territory.stride);
        while registry.by_position(allocator.peek()).is_some() {
            allocator.next();
        }
        if stored != Some(allocator.counter()) {
            store.save_placement_counter(allocator.counter())?;
        }

        let painter = terrain::painter_for(&config, Arc::clone(&world));
        info!(
            territories = registry.len(),
            counter = allocator.counter(),
            terrain = config.terrain.description(),
            "Territory service ready"
        );
        log_report(report);

        Ok(Self {
            gate: ActionGate::new(&config.core.access),
            resolver: SafeAnchorResolver::new(&config.core.anchor),
            pipeline: CreationPipeline::new(painter),
            registry,
            store,
            clock,
            world,
            allocator,
            config,
        })
    }

    /// Read access to the registry.
    #[must_use]
    pub fn registry(&self) -> &TerritoryRegistry {
        &self.registry
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Event counters.
    #[must_use]
    pub fn counters(&self) -> &SkyraidCounters {
        self.gate.engine().counters()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> CounterSnapshot {
        self.counters().snapshot()
    }

    /// Next placement index.
    #[must_use]
    pub fn placement_counter(&self) -> u64 {
        self.allocator.counter()
    }

    /// The actor's territory.
    #[must_use]
    pub fn territory_of(&self, actor: ActorId) -> Option<&Territory> {
        self.registry.membership_of(actor)
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Queue creation of a territory for `draft` and return its center.
    ///
    /// The center is allocated here and the advanced counter is stored
    /// before any painting starts, so a crash mid-paint never hands the
    /// same center out twice.
    ///
    /// # Errors
    /// `AlreadyInTerritory` if any actor of the draft already belongs to a
    /// territory, `CreationInProgress` if one already has a request queued,
    /// or a storage failure writing the counter.
    pub fn request_territory(&mut self, draft: TerritoryDraft) -> Result<ColumnPos> {
        for actor in draft.actors() {
            if let Some(t) = self.registry.membership_of(actor) {
                return Err(SkyraidError::AlreadyInTerritory {
                    actor,
                    territory: t.id,
                }
                .into());
            }
        }
        if let Some(busy) = self.pipeline.busy_actor(&draft) {
            return Err(HostError::CreationInProgress(busy));
        }

        let mut next = self.allocator.clone();
        let center = next.next();
        self.store.save_placement_counter(next.counter())?;
        self.allocator = next;
        debug!(owner = %draft.owner, center = %center, counter = self.allocator.counter(), "Center allocated");
        self.pipeline.submit(draft, center)?;
        Ok(center)
    }

    /// Drop `owner`'s queued request.
    pub fn abandon_request(&mut self, owner: ActorId) -> bool {
        self.pipeline.abandon(owner)
    }

    /// Whether `actor` has a creation queued.
    #[must_use]
    pub fn is_creating(&self, actor: ActorId) -> bool {
        self.pipeline.is_in_flight(actor)
    }

    /// Register every creation that has finished painting. Never blocks.
    pub fn poll_creations(&mut self) -> Vec<CreationReport> {
        let done = self.pipeline.drain();
        done.into_iter().map(|c| self.finish_creation(c)).collect()
    }

    /// Wait for the next creation to finish and register it. `None` when
    /// nothing is queued.
    pub async fn next_creation(&mut self) -> Option<CreationReport> {
        let completed = self.pipeline.next_completed().await?;
        Some(self.finish_creation(completed))
    }

    fn finish_creation(&mut self, completed: Completed) -> CreationReport {
        let owner = completed.draft.owner;
        let result = self.register_completed(completed);
        match &result {
            Ok(created) => info!(
                owner = %owner,
                territory = %created.id,
                center = %created.center,
                members = created.placements.len(),
                "Territory created"
            ),
            Err(e) => warn!(owner = %owner, error = %e, "Territory creation failed"),
        }
        CreationReport { owner, result }
    }

    fn register_completed(&mut self, completed: Completed) -> Result<Created> {
        let Completed {
            draft,
            center,
            painted,
        } = completed;
        painted?;
        if self.registry.by_position(center).is_some() {
            return Err(TerrainError::Occupied(center).into());
        }

        let territory = draft.build(
            center,
            &self.config.core.territory,
            &self.config.core.protection,
            self.clock.now_ms(),
        )?;
        let id = territory.id;
        let home = territory.anchor;
        let granted = ProtectionStateMachine::is_protected(&territory, self.clock.now_ms());
        self.registry.register(territory)?;
        if let Err(e) = self.persist(id) {
            self.registry.unregister(id);
            return Err(e);
        }
        SkyraidCounters::bump(&self.counters().territories_created);
        if granted {
            SkyraidCounters::bump(&self.counters().protection_activations);
        }

        let spot = self.safe_spot(home);
        let placements = draft.actors().map(|a| (a, spot)).collect();
        Ok(Created {
            id,
            center,
            placements,
        })
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    /// Raw decision for `actor` doing `kind` at `target`.
    #[must_use]
    pub fn decide(&self, actor: ActorId, target: ColumnPos, kind: ActionKind) -> Decision {
        self.gate
            .engine()
            .decide(&self.registry, actor, target, kind, self.clock.now_ms())
    }

    /// Judge a host event.
    #[must_use]
    pub fn check_action(&self, event: &ActionEvent) -> Verdict {
        self.gate.check(&self.registry, event, self.clock.now_ms())
    }

    // -----------------------------------------------------------------------
    // Protection
    // -----------------------------------------------------------------------

    /// Shield `actor`'s territory for one of the configured tiers. Returns
    /// the new expiry.
    ///
    /// # Errors
    /// `NoTerritory`, `InvalidDuration` for a tier that is not configured,
    /// or a storage failure (the shield is not applied).
    pub fn activate_protection(&mut self, actor: ActorId, hours: i64) -> Result<i64> {
        if !self.config.core.protection.durations_hours.contains(&hours) {
            return Err(SkyraidError::InvalidDuration { hours }.into());
        }
        let id = self.own_territory(actor)?;
        let now = self.clock.now_ms();
        let expiry = self.commit(id, |reg| {
            reg.update(id, |t| ProtectionStateMachine::activate(t, hours, now))?
        })?;
        SkyraidCounters::bump(&self.counters().protection_activations);
        Ok(expiry)
    }

    /// Drop `actor`'s shield. Idempotent.
    ///
    /// # Errors
    /// `NoTerritory`, or a storage failure.
    pub fn deactivate_protection(&mut self, actor: ActorId) -> Result<()> {
        let id = self.own_territory(actor)?;
        let shielded = self
            .registry
            .by_id(id)
            .is_some_and(|t| t.protection_expiry_ms != 0);
        if shielded {
            self.commit(id, |reg| reg.update(id, ProtectionStateMachine::deactivate))?;
            info!(territory = %id, actor = %actor, "Protection dropped");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// `by` invites `target` into their territory.
    ///
    /// # Errors
    /// See [`membership::invite`].
    pub fn invite(&mut self, by: ActorId, target: ActorId) -> Result<TerritoryId> {
        let id = self.own_territory(by)?;
        let max = self.config.core.territory.max_members;
        self.commit(id, |reg| membership::invite(reg, id, by, target, max))?;
        Ok(id)
    }

    /// `actor` accepts the invite from territory `id`.
    ///
    /// # Errors
    /// `AlreadyInTerritory` if the actor belongs elsewhere, plus see
    /// [`membership::accept_invite`].
    pub fn accept_invite(&mut self, actor: ActorId, id: TerritoryId) -> Result<()> {
        if self.pipeline.is_in_flight(actor) {
            return Err(HostError::CreationInProgress(actor));
        }
        let max = self.config.core.territory.max_members;
        self.commit(id, |reg| membership::accept_invite(reg, id, actor, max))
    }

    /// `actor` declines the invite from territory `id`.
    ///
    /// # Errors
    /// `NotInvited` or `TerritoryNotFound`.
    pub fn decline_invite(&mut self, actor: ActorId, id: TerritoryId) -> Result<()> {
        self.commit(id, |reg| membership::decline_invite(reg, id, actor))
    }

    /// Territories that invited `actor`.
    #[must_use]
    pub fn pending_invites(&self, actor: ActorId) -> Vec<TerritoryId> {
        membership::pending_invites(&self.registry, actor)
    }

    /// `by` removes `target` from their territory.
    ///
    /// # Errors
    /// See [`membership::kick`].
    pub fn kick(&mut self, by: ActorId, target: ActorId) -> Result<Removal> {
        let id = self.own_territory(by)?;
        let removal = self.commit(id, |reg| membership::kick(reg, id, by, target))?;
        self.note_removal(&removal);
        Ok(removal)
    }

    /// `actor` leaves their territory. The owner leaving dissolves it.
    ///
    /// # Errors
    /// `NoTerritory`, or a storage failure.
    pub fn leave(&mut self, actor: ActorId) -> Result<Removal> {
        let id = self.own_territory(actor)?;
        let removal = self.commit(id, |reg| membership::leave(reg, id, actor))?;
        self.note_removal(&removal);
        Ok(removal)
    }

    /// Owner makes `target` a leader.
    ///
    /// # Errors
    /// See [`membership::promote`].
    pub fn promote(&mut self, by: ActorId, target: ActorId) -> Result<()> {
        let id = self.own_territory(by)?;
        self.commit(id, |reg| membership::promote(reg, id, by, target))
    }

    /// Owner takes leadership from `target`.
    ///
    /// # Errors
    /// See [`membership::demote`].
    pub fn demote(&mut self, by: ActorId, target: ActorId) -> Result<()> {
        let id = self.own_territory(by)?;
        self.commit(id, |reg| membership::demote(reg, id, by, target))
    }

    /// Move the territory home to `anchor`.
    ///
    /// # Errors
    /// See [`membership::set_home`].
    pub fn set_home(&mut self, by: ActorId, anchor: Anchor) -> Result<()> {
        let id = self.own_territory(by)?;
        self.commit(id, |reg| membership::set_home(reg, id, by, anchor))
    }

    /// Change the border colour.
    ///
    /// # Errors
    /// See [`membership::set_color`].
    pub fn set_color(&mut self, by: ActorId, color: DisplayColor) -> Result<()> {
        let id = self.own_territory(by)?;
        self.commit(id, |reg| membership::set_color(reg, id, by, color))
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Remove territory `id` outright. Every member is released and the row
    /// is deleted. The placement counter is left alone, so the center is
    /// never handed out again.
    ///
    /// # Errors
    /// `TerritoryNotFound`, or a storage failure (the territory stays).
    pub fn delete_territory(&mut self, id: TerritoryId) -> Result<Territory> {
        let territory = self
            .registry
            .unregister(id)
            .ok_or(SkyraidError::TerritoryNotFound(id))?;
        if let Err(e) = self.store.delete(id) {
            warn!(territory = %id, error = %e, "Delete failed, restoring territory");
            self.restore(territory);
            return Err(e.into());
        }
        SkyraidCounters::bump(&self.counters().territories_dissolved);
        info!(
            territory = %id,
            owner = %territory.owner,
            center = %territory.center,
            "Territory deleted"
        );
        Ok(territory)
    }

    /// Owner deletes their own territory.
    ///
    /// # Errors
    /// `NoTerritory`, `PermissionDenied` for anyone but the owner, or a
    /// storage failure.
    pub fn delete_own(&mut self, actor: ActorId) -> Result<Territory> {
        let id = self.own_territory(actor)?;
        if self.registry.by_id(id).is_some_and(|t| t.owner != actor) {
            return Err(SkyraidError::PermissionDenied {
                actor,
                action: "delete the territory",
            }
            .into());
        }
        self.delete_territory(id)
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Periodic store upkeep: integrity check and rotating backup. Hosts
    /// call it from a low-frequency timer or on shutdown.
    ///
    /// # Errors
    /// Storage failures.
    pub fn checkpoint(&self) -> Result<()> {
        self.store.checkpoint()?;
        debug!(territories = self.registry.len(), "Store checkpoint complete");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Presentation, respawn, void
    // -----------------------------------------------------------------------

    /// Status of `actor`'s territory.
    #[must_use]
    pub fn summary(&self, actor: ActorId) -> Option<TerritorySummary> {
        self.registry
            .membership_of(actor)
            .map(|t| border::summary_of(t, self.clock.now_ms()))
    }

    /// Border for an actor standing at `pos`.
    #[must_use]
    pub fn border_at(&self, pos: ColumnPos) -> Option<BorderView> {
        border::border_for(&self.registry, pos, &self.config.core.border)
    }

    /// Where `actor` respawns. `None` means the world spawn.
    #[must_use]
    pub fn respawn_point(&self, actor: ActorId) -> Option<Anchor> {
        let world = self.world.read();
        respawn::respawn_point(&self.registry, &self.resolver, &*world, actor)
    }

    /// Respawn location for `actor`: their home, or the world spawn.
    #[must_use]
    pub fn respawn_or_spawn(&self, actor: ActorId) -> Anchor {
        let world = self.world.read();
        respawn::respawn_point(&self.registry, &self.resolver, &*world, actor)
            .unwrap_or_else(|| respawn::world_spawn(&self.resolver, &*world, &self.config.core.world))
    }

    /// How to handle `actor` at height `y`.
    #[must_use]
    pub fn check_void(&self, actor: ActorId, y: f64) -> VoidAction {
        let world = self.world.read();
        respawn::check_void(
            &self.registry,
            &self.resolver,
            &*world,
            &self.config.core.void,
            &self.config.core.world,
            actor,
            y,
        )
    }

    /// Resolved home of `actor`'s territory, for teleport commands.
    ///
    /// # Errors
    /// `NoTerritory`.
    pub fn home_of(&self, actor: ActorId) -> Result<Anchor> {
        self.respawn_point(actor)
            .ok_or(HostError::NoTerritory(actor))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn own_territory(&self, actor: ActorId) -> Result<TerritoryId> {
        self.registry
            .membership_of(actor)
            .map(|t| t.id)
            .ok_or(HostError::NoTerritory(actor))
    }

    /// Run `op` against the registry and write territory `id` through to the
    /// store. If the write fails the registry is put back the way it was.
    fn commit<R>(
        &mut self,
        id: TerritoryId,
        op: impl FnOnce(&mut TerritoryRegistry) -> skyraid_core::error::Result<R>,
    ) -> Result<R> {
        let before = self
            .registry
            .by_id(id)
            .cloned()
            .ok_or(SkyraidError::TerritoryNotFound(id))?;
        let out = op(&mut self.registry)?;
        let written = match self.registry.by_id(id) {
            Some(t) => self.store.save(t).map(|()| true),
            None => self.store.delete(id).map(|_| false),
        };
        match written {
            Ok(saved) => {
                if saved {
                    SkyraidCounters::bump(&self.counters().saves_completed);
                    debug!(territory = %id, "Territory saved");
                }
                Ok(out)
            }
            Err(e) => {
                warn!(territory = %id, error = %e, "Write failed, rolling back");
                self.registry.unregister(id);
                self.restore(before);
                Err(e.into())
            }
        }
    }

    fn restore(&mut self, territory: Territory) {
        let id = territory.id;
        if let Err(e) = self.registry.register(territory) {
            warn!(territory = %id, error = %e, "Could not restore territory");
        }
    }

    fn persist(&self, id: TerritoryId) -> Result<()> {
        let territory = self
            .registry
            .by_id(id)
            .ok_or(SkyraidError::TerritoryNotFound(id))?;
        self.store.save(territory)?;
        SkyraidCounters::bump(&self.counters().saves_completed);
        debug!(territory = %id, "Territory saved");
        Ok(())
    }

    fn note_removal(&self, removal: &Removal) {
        if let Removal::Dissolved(t) = removal {
            SkyraidCounters::bump(&self.counters().territories_dissolved);
            info!(territory = %t.id, owner = %t.owner, "Territory dissolved");
        }
    }

    fn safe_spot(&self, candidate: Anchor) -> Anchor {
        let res = self.resolver.resolve(&*self.world.read(), candidate);
        if res.outcome == Outcome::Fallback {
            SkyraidCounters::bump(&self.counters().anchor_fallbacks);
        }
        res.anchor
    }
}

fn log_report(report: RehydrateReport) {
    if report.skipped > 0 || report.stale_memberships > 0 {
        warn!(
            skipped = report.skipped,
            stale_memberships = report.stale_memberships,
            "Stored territory data needed repair"
        );
    }
}

