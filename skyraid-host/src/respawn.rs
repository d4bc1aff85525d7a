//! Respawn and void-fall handling.

use skyraid_core::anchor::{Outcome, SafeAnchorResolver, WorldView};
use skyraid_core::config::{TerritoryConfig, VoidConfig, WorldConfig};
use skyraid_core::registry::TerritoryRegistry;
use skyraid_core::territory::default_anchor;
use skyraid_core::types::{ActorId, Anchor};
use tracing::debug;

/// What to do with an actor below the void threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoidAction {
    /// Above the threshold, or void handling is off.
    None,
    /// Move the actor to this anchor.
    Teleport(Anchor),
    /// No territory: send the actor to the world spawn.
    Spawn(Anchor),
    /// Damage the actor.
    Damage(f32),
}

/// Resolved home of `actor`'s territory, or `None` for the world spawn.
pub fn respawn_point<W: WorldView + ?Sized>(
    registry: &TerritoryRegistry,
    resolver: &SafeAnchorResolver,
    world: &W,
    actor: ActorId,
) -> Option<Anchor> {
    let territory = registry.membership_of(actor)?;
    let res = resolver.resolve(world, territory.anchor);
    if res.outcome == Outcome::Fallback {
        debug!(actor = %actor, territory = %territory.id, "No safe cell near home, using it as is");
    }
    Some(res.anchor)
}

/// The configured world spawn, nudged onto safe ground when possible.
pub fn world_spawn<W: WorldView + ?Sized>(
    resolver: &SafeAnchorResolver,
    world: &W,
    config: &WorldConfig,
) -> Anchor {
    resolver.resolve(world, config.spawn).anchor
}

/// Decide how to handle `actor` at height `y`.
pub fn check_void<W: WorldView + ?Sized>(
    registry: &TerritoryRegistry,
    resolver: &SafeAnchorResolver,
    world: &W,
    config: &VoidConfig,
    bounds: &WorldConfig,
    actor: ActorId,
    y: f64,
) -> VoidAction {
    if y >= config.threshold_y {
        return VoidAction::None;
    }
    if config.teleport_back {
        let Some(territory) = registry.membership_of(actor) else {
            return VoidAction::Spawn(world_spawn(resolver, world, bounds));
        };
        let target = if config.to_home {
            territory.anchor
        } else {
            center_anchor(registry.geometry(), territory.center)
        };
        return VoidAction::Teleport(resolver.resolve(world, target).anchor);
    }
    if config.damage_enabled {
        return VoidAction::Damage(config.damage_amount);
    }
    VoidAction::None
}

fn center_anchor(geometry: &TerritoryConfig, center: skyraid_core::types::ColumnPos) -> Anchor {
    default_anchor(center, geometry.anchor_height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyraid_core::anchor::{BlockState, SparseWorld};
    use skyraid_core::territory::Territory;
    use skyraid_core::types::{BlockPos, ColumnPos};

    struct Fixture {
        registry: TerritoryRegistry,
        world: SparseWorld,
        owner: ActorId,
    }

    fn fixture() -> Fixture {
        let mut registry = TerritoryRegistry::new(&TerritoryConfig::default());
        let mut t = Territory::new(ActorId::new(), "Keep", ColumnPos::new(0, 0), 69.0, 0);
        t.anchor = Anchor::at(10.5, 70.0, 10.5);
        let owner = t.owner;
        registry.register(t).expect("register");
        let mut world = SparseWorld::new(-64, 320);
        world.set(BlockPos::new(10, 64, 10), BlockState::SOLID);
        world.set(BlockPos::new(0, 64, 0), BlockState::SOLID);
        Fixture { registry, world, owner }
    }

    #[test]
    fn members_respawn_at_a_safe_home() {
        let f = fixture();
        let resolver = SafeAnchorResolver::default();
        let at = respawn_point(&f.registry, &resolver, &f.world, f.owner).expect("home");
        assert_eq!(at.block(), BlockPos::new(10, 65, 10));
        assert!(respawn_point(&f.registry, &resolver, &f.world, ActorId::new()).is_none());
    }

    #[test]
    fn void_teleports_home_or_center() {
        let f = fixture();
        let resolver = SafeAnchorResolver::default();
        let mut config = VoidConfig::default();
        let bounds = WorldConfig::default();
        let home = check_void(&f.registry, &resolver, &f.world, &config, &bounds, f.owner, -3.0);
        assert!(matches!(home, VoidAction::Teleport(a) if a.block() == BlockPos::new(10, 65, 10)));

        config.to_home = false;
        let center = check_void(&f.registry, &resolver, &f.world, &config, &bounds, f.owner, -3.0);
        assert!(matches!(center, VoidAction::Teleport(a) if a.block() == BlockPos::new(0, 65, 0)));
    }

    #[test]
    fn void_without_territory_goes_to_spawn() {
        let mut f = fixture();
        let bounds = WorldConfig {
            spawn: Anchor::at(200.5, 80.0, 200.5),
            ..WorldConfig::default()
        };
        f.world.set(BlockPos::new(200, 77, 200), BlockState::SOLID);
        let action = check_void(
            &f.registry,
            &SafeAnchorResolver::default(),
            &f.world,
            &VoidConfig::default(),
            &bounds,
            ActorId::new(),
            -10.0,
        );
        assert!(matches!(action, VoidAction::Spawn(a) if a.block() == BlockPos::new(200, 78, 200)));
    }

    #[test]
    fn damage_mode_and_threshold() {
        let f = fixture();
        let resolver = SafeAnchorResolver::default();
        let bounds = WorldConfig::default();
        let config = VoidConfig {
            teleport_back: false,
            damage_enabled: true,
            ..VoidConfig::default()
        };
        assert_eq!(
            check_void(&f.registry, &resolver, &f.world, &config, &bounds, f.owner, -1.0),
            VoidAction::Damage(2.0)
        );
        assert_eq!(
            check_void(&f.registry, &resolver, &f.world, &config, &bounds, f.owner, 0.0),
            VoidAction::None
        );
        let off = VoidConfig {
            teleport_back: false,
            ..VoidConfig::default()
        };
        assert_eq!(
            check_void(&f.registry, &resolver, &f.world, &off, &bounds, f.owner, -1.0),
            VoidAction::None
        );
    }
}
