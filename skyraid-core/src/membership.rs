//! Group management: invites, kicks, roles, home and colour.
//!
//! Roles:
//! - owner: everything; can never be kicked or demoted
//! - leader: invite, kick plain members, set home, set colour
//! - member: leave, accept or decline invites
//!
//! Every operation validates first and mutates only on success.

use tracing::info;

use crate::error::{Result, SkyraidError};
use crate::registry::{Removal, TerritoryRegistry};
use crate::territory::Territory;
use crate::types::{ActorId, Anchor, DisplayColor, TerritoryId};

fn lookup(registry: &TerritoryRegistry, id: TerritoryId) -> Result<&Territory> {
    registry.by_id(id).ok_or(SkyraidError::TerritoryNotFound(id))
}

fn require_leader(territory: &Territory, actor: ActorId, action: &'static str) -> Result<()> {
    if territory.is_leader(actor) {
        Ok(())
    } else {
        Err(SkyraidError::PermissionDenied { actor, action })
    }
}

fn require_owner(territory: &Territory, actor: ActorId, action: &'static str) -> Result<()> {
    if territory.is_owner(actor) {
        Ok(())
    } else {
        Err(SkyraidError::PermissionDenied { actor, action })
    }
}

fn require_member(territory: &Territory, actor: ActorId) -> Result<()> {
    if territory.is_member(actor) {
        Ok(())
    } else {
        Err(SkyraidError::NotAMember {
            actor,
            territory: territory.id,
        })
    }
}

/// Invite `target` to join. Re-inviting is a no-op.
///
/// # Errors
/// `PermissionDenied` unless `inviter` leads the territory,
/// `AlreadyInTerritory` if `target` is already a member,
/// `TerritoryFull` at capacity.
pub fn invite(
    registry: &mut TerritoryRegistry,
    id: TerritoryId,
    inviter: ActorId,
    target: ActorId,
    max_members: usize,
) -> Result<()> {
    let territory = lookup(registry, id)?;
    require_leader(territory, inviter, "invite")?;
    if territory.is_member(target) {
        return Err(SkyraidError::AlreadyInTerritory {
            actor: target,
            territory: id,
        });
    }
    if territory.member_count() >= max_members {
        return Err(SkyraidError::TerritoryFull {
            territory: id,
            limit: max_members,
        });
    }
    registry.update(id, |t| t.invites.insert(target))?;
    info!(territory = %id, inviter = %inviter, target = %target, "Invite sent");
    Ok(())
}

/// Join a territory through a pending invite.
///
/// # Errors
/// `NotInvited`, `TerritoryFull`, or `AlreadyInTerritory` when the actor
/// still belongs elsewhere. The invite survives a failed accept.
pub fn accept_invite(
    registry: &mut TerritoryRegistry,
    id: TerritoryId,
    actor: ActorId,
    max_members: usize,
) -> Result<()> {
    let territory = lookup(registry, id)?;
    if !territory.is_invited(actor) {
        return Err(SkyraidError::NotInvited {
            actor,
            territory: id,
        });
    }
    if territory.member_count() >= max_members {
        return Err(SkyraidError::TerritoryFull {
            territory: id,
            limit: max_members,
        });
    }
    registry.add_member(id, actor)?;
    info!(territory = %id, actor = %actor, "Member joined");
    Ok(())
}

/// Drop a pending invite.
///
/// # Errors
/// `NotInvited` if there is nothing to decline.
pub fn decline_invite(registry: &mut TerritoryRegistry, id: TerritoryId, actor: ActorId) -> Result<()> {
    if !registry.update(id, |t| t.invites.remove(&actor))? {
        return Err(SkyraidError::NotInvited {
            actor,
            territory: id,
        });
    }
    Ok(())
}

/// Territories with a pending invite for `actor`, sorted by id.
#[must_use]
pub fn pending_invites(registry: &TerritoryRegistry, actor: ActorId) -> Vec<TerritoryId> {
    let mut ids: Vec<_> = registry
        .iter()
        .filter(|t| t.is_invited(actor))
        .map(|t| t.id)
        .collect();
    ids.sort();
    ids
}

/// Remove `target` on behalf of `by`.
///
/// # Errors
/// `PermissionDenied` unless `by` is a leader (and the owner, when `target`
/// is a leader), `OwnerImmutable` when targeting the owner, `NotAMember`.
pub fn kick(
    registry: &mut TerritoryRegistry,
    id: TerritoryId,
    by: ActorId,
    target: ActorId,
) -> Result<Removal> {
    let territory = lookup(registry, id)?;
    require_leader(territory, by, "kick")?;
    if territory.is_owner(target) {
        return Err(SkyraidError::OwnerImmutable(id));
    }
    require_member(territory, target)?;
    if by == target {
        return Err(SkyraidError::PermissionDenied {
            actor: by,
            action: "kick themselves",
        });
    }
    if territory.is_leader(target) && !territory.is_owner(by) {
        return Err(SkyraidError::PermissionDenied {
            actor: by,
            action: "kick a leader",
        });
    }
    let removal = registry.remove_member(id, target)?;
    info!(territory = %id, by = %by, target = %target, "Member kicked");
    Ok(removal)
}

/// `actor` leaves. The territory dissolves if the owner leaves or nobody
/// remains.
///
/// # Errors
/// `TerritoryNotFound`, `NotAMember`.
pub fn leave(registry: &mut TerritoryRegistry, id: TerritoryId, actor: ActorId) -> Result<Removal> {
    let removal = registry.remove_member(id, actor)?;
    if removal == Removal::Left {
        info!(territory = %id, actor = %actor, "Member left");
    }
    Ok(removal)
}

/// Grant leadership. Promoting the owner is a no-op.
///
/// # Errors
/// `PermissionDenied` unless `by` is the owner, `NotAMember`.
pub fn promote(
    registry: &mut TerritoryRegistry,
    id: TerritoryId,
    by: ActorId,
    target: ActorId,
) -> Result<()> {
    let territory = lookup(registry, id)?;
    require_owner(territory, by, "promote")?;
    require_member(territory, target)?;
    if territory.is_owner(target) {
        return Ok(());
    }
    registry.update(id, |t| t.leaders.insert(target))?;
    info!(territory = %id, target = %target, "Member promoted");
    Ok(())
}

/// Revoke leadership.
///
/// # Errors
/// `PermissionDenied` unless `by` is the owner, `OwnerImmutable` for the
/// owner, `NotAMember`.
pub fn demote(
    registry: &mut TerritoryRegistry,
    id: TerritoryId,
    by: ActorId,
    target: ActorId,
) -> Result<()> {
    let territory = lookup(registry, id)?;
    require_owner(territory, by, "demote")?;
    if territory.is_owner(target) {
        return Err(SkyraidError::OwnerImmutable(id));
    }
    require_member(territory, target)?;
    registry.update(id, |t| t.leaders.remove(&target))?;
    info!(territory = %id, target = %target, "Member demoted");
    Ok(())
}

/// Move the home anchor.
///
/// # Errors
/// `PermissionDenied` unless `by` leads, `OutsideFootprint` if the anchor's
/// column is not inside the territory.
pub fn set_home(
    registry: &mut TerritoryRegistry,
    id: TerritoryId,
    by: ActorId,
    anchor: Anchor,
) -> Result<()> {
    let territory = lookup(registry, id)?;
    require_leader(territory, by, "set the home")?;
    if !registry.footprint_of(territory).contains_anchor(&anchor) {
        return Err(SkyraidError::OutsideFootprint {
            territory: id,
            anchor: anchor.to_string(),
        });
    }
    registry.update(id, |t| t.anchor = anchor)?;
    info!(territory = %id, anchor = %anchor, "Home moved");
    Ok(())
}

/// Change the border colour.
///
/// # Errors
/// `PermissionDenied` unless `by` leads.
pub fn set_color(
    registry: &mut TerritoryRegistry,
    id: TerritoryId,
    by: ActorId,
    color: DisplayColor,
) -> Result<()> {
    let territory = lookup(registry, id)?;
    require_leader(territory, by, "change the colour")?;
    registry.update(id, |t| t.color = color)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerritoryConfig;
    use crate::types::ColumnPos;

    const CAP: usize = 3;

    fn setup() -> (TerritoryRegistry, TerritoryId, ActorId) {
        let mut registry = TerritoryRegistry::new(&TerritoryConfig::default());
        let t = Territory::new(ActorId::new(), "Keep", ColumnPos::new(0, 0), 69.0, 0);
        let (id, owner) = (t.id, t.owner);
        registry.register(t).expect("register");
        (registry, id, owner)
    }

    fn join(registry: &mut TerritoryRegistry, id: TerritoryId, owner: ActorId) -> ActorId {
        let actor = ActorId::new();
        invite(registry, id, owner, actor, CAP).expect("invite");
        accept_invite(registry, id, actor, CAP).expect("accept");
        actor
    }

    #[test]
    fn invite_accept_flow() {
        let (mut reg, id, owner) = setup();
        let friend = ActorId::new();
        assert!(matches!(
            accept_invite(&mut reg, id, friend, CAP),
            Err(SkyraidError::NotInvited { .. })
        ));
        invite(&mut reg, id, owner, friend, CAP).expect("invite");
        assert_eq!(pending_invites(&reg, friend), vec![id]);
        accept_invite(&mut reg, id, friend, CAP).expect("accept");
        assert!(pending_invites(&reg, friend).is_empty());
        assert_eq!(reg.membership_of(friend).map(|t| t.id), Some(id));
    }

    #[test]
    fn plain_members_cannot_invite() {
        let (mut reg, id, owner) = setup();
        let member = join(&mut reg, id, owner);
        let err = invite(&mut reg, id, member, ActorId::new(), CAP).expect_err("member");
        assert!(matches!(err, SkyraidError::PermissionDenied { action: "invite", .. }));
    }

    #[test]
    fn capacity_is_enforced_at_accept() {
        let (mut reg, id, owner) = setup();
        let late = ActorId::new();
        invite(&mut reg, id, owner, late, CAP).expect("invite while room");
        join(&mut reg, id, owner);
        join(&mut reg, id, owner);
        assert!(matches!(
            accept_invite(&mut reg, id, late, CAP),
            Err(SkyraidError::TerritoryFull { limit: CAP, .. })
        ));
        assert!(reg.by_id(id).is_some_and(|t| t.is_invited(late)));
    }

    #[test]
    fn accept_fails_while_in_another_territory() {
        let (mut reg, id, owner) = setup();
        let other = Territory::new(ActorId::new(), "Other", ColumnPos::new(1000, 0), 69.0, 0);
        let other_owner = other.owner;
        reg.register(other).expect("other");
        invite(&mut reg, id, owner, other_owner, CAP).expect("invite");
        assert!(matches!(
            accept_invite(&mut reg, id, other_owner, CAP),
            Err(SkyraidError::AlreadyInTerritory { .. })
        ));
    }

    #[test]
    fn decline_removes_invite() {
        let (mut reg, id, owner) = setup();
        let friend = ActorId::new();
        invite(&mut reg, id, owner, friend, CAP).expect("invite");
        decline_invite(&mut reg, id, friend).expect("decline");
        assert!(decline_invite(&mut reg, id, friend).is_err());
    }

    #[test]
    fn kick_rules() {
        let (mut reg, id, owner) = setup();
        let leader = join(&mut reg, id, owner);
        let member = join(&mut reg, id, owner);
        promote(&mut reg, id, owner, leader).expect("promote");

        assert!(matches!(
            kick(&mut reg, id, member, leader),
            Err(SkyraidError::PermissionDenied { .. })
        ));
        assert!(matches!(
            kick(&mut reg, id, leader, owner),
            Err(SkyraidError::OwnerImmutable(_))
        ));
        assert_eq!(kick(&mut reg, id, leader, member).expect("leader kicks member"), Removal::Left);
        assert!(reg.membership_of(member).is_none());
        assert_eq!(kick(&mut reg, id, owner, leader).expect("owner kicks leader"), Removal::Left);
    }

    #[test]
    fn leader_cannot_kick_another_leader() {
        let (mut reg, id, owner) = setup();
        let a = join(&mut reg, id, owner);
        let b = join(&mut reg, id, owner);
        promote(&mut reg, id, owner, a).expect("a");
        promote(&mut reg, id, owner, b).expect("b");
        assert!(matches!(
            kick(&mut reg, id, a, b),
            Err(SkyraidError::PermissionDenied { action: "kick a leader", .. })
        ));
    }

    #[test]
    fn only_owner_changes_roles_and_owner_stays_leader() {
        let (mut reg, id, owner) = setup();
        let leader = join(&mut reg, id, owner);
        promote(&mut reg, id, owner, leader).expect("promote");
        let member = join(&mut reg, id, owner);
        assert!(promote(&mut reg, id, leader, member).is_err());
        assert!(matches!(
            demote(&mut reg, id, owner, owner),
            Err(SkyraidError::OwnerImmutable(_))
        ));
        demote(&mut reg, id, owner, leader).expect("demote");
        assert!(reg.by_id(id).is_some_and(|t| !t.is_leader(leader) && t.is_leader(owner)));
    }

    #[test]
    fn owner_leaving_dissolves() {
        let (mut reg, id, owner) = setup();
        let member = join(&mut reg, id, owner);
        assert!(matches!(leave(&mut reg, id, owner), Ok(Removal::Dissolved(_))));
        assert!(reg.membership_of(member).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn home_must_stay_inside_footprint() {
        let (mut reg, id, owner) = setup();
        set_home(&mut reg, id, owner, Anchor::at(40.5, 70.0, -40.5)).expect("inside");
        let err = set_home(&mut reg, id, owner, Anchor::at(60.0, 70.0, 0.0)).expect_err("outside");
        assert!(matches!(err, SkyraidError::OutsideFootprint { .. }));
        assert_eq!(reg.by_id(id).map(|t| t.anchor.x), Some(40.5));
    }

    #[test]
    fn colour_needs_a_leader() {
        let (mut reg, id, owner) = setup();
        let member = join(&mut reg, id, owner);
        assert!(set_color(&mut reg, id, member, DisplayColor::Red).is_err());
        set_color(&mut reg, id, owner, DisplayColor::Red).expect("owner");
        assert_eq!(reg.by_id(id).map(|t| t.color), Some(DisplayColor::Red));
    }
}
