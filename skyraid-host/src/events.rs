//! Actor actions reported by the host, before they take effect.
//!
//! The host emits one of these for every movement, block edit, attack and
//! block interaction, and cancels the underlying effect when the gate says so.

use skyraid_core::access::ActionKind;
use skyraid_core::types::{ActorId, Anchor, BlockPos, ColumnPos};

/// An action about to happen.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionEvent {
    /// An actor moved.
    Move {
        /// Who moved.
        actor: ActorId,
        /// Position before the move.
        from: Anchor,
        /// Position after the move.
        to: Anchor,
    },
    /// An actor is breaking a block.
    BlockBreak {
        /// Who is breaking.
        actor: ActorId,
        /// The block.
        block: BlockPos,
    },
    /// An actor is placing a block.
    BlockPlace {
        /// Who is placing.
        actor: ActorId,
        /// Where the block goes.
        block: BlockPos,
    },
    /// An actor attacked another actor.
    Attack {
        /// Attacker.
        attacker: ActorId,
        /// Victim.
        victim: ActorId,
        /// Where the victim stands.
        victim_at: Anchor,
    },
    /// An actor used a block (opened a chest, pressed a button...).
    Interact {
        /// Who interacted.
        actor: ActorId,
        /// The block.
        block: BlockPos,
        /// Host block type name, e.g. `"CHEST"`.
        kind: String,
    },
}

impl ActionEvent {
    /// The acting actor.
    #[must_use]
    pub fn actor(&self) -> ActorId {
        match self {
            Self::Move { actor, .. }
            | Self::BlockBreak { actor, .. }
            | Self::BlockPlace { actor, .. }
            | Self::Interact { actor, .. } => *actor,
            Self::Attack { attacker, .. } => *attacker,
        }
    }

    /// The column being acted upon.
    #[must_use]
    pub fn target(&self) -> ColumnPos {
        match self {
            Self::Move { to, .. } => to.column(),
            Self::BlockBreak { block, .. }
            | Self::BlockPlace { block, .. }
            | Self::Interact { block, .. } => block.column(),
            Self::Attack { victim_at, .. } => victim_at.column(),
        }
    }

    /// Decision-engine action kind.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Move { .. } => ActionKind::Enter,
            Self::BlockBreak { .. } | Self::BlockPlace { .. } => ActionKind::BreakOrPlace,
            Self::Attack { .. } => ActionKind::Combat,
            Self::Interact { .. } => ActionKind::OpenContainer,
        }
    }

    /// Whether the move stays within one block column. Such moves are never
    /// evaluated.
    #[must_use]
    pub fn is_same_column_move(&self) -> bool {
        matches!(self, Self::Move { from, to, .. } if from.column() == to.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attack_targets_the_victim_column() {
        let attacker = ActorId::new();
        let event = ActionEvent::Attack {
            attacker,
            victim: ActorId::new(),
            victim_at: Anchor::at(1000.7, 65.0, -3.2),
        };
        assert_eq!(event.actor(), attacker);
        assert_eq!(event.target(), ColumnPos::new(1000, -4));
        assert_eq!(event.kind(), ActionKind::Combat);
    }

    #[test]
    fn head_turns_are_same_column_moves() {
        let actor = ActorId::new();
        let mut to = Anchor::at(10.2, 65.0, 10.9);
        to.yaw = 180.0;
        let event = ActionEvent::Move {
            actor,
            from: Anchor::at(10.8, 65.0, 10.1),
            to,
        };
        assert!(event.is_same_column_move());
        let stepped = ActionEvent::Move {
            actor,
            from: Anchor::at(10.8, 65.0, 10.1),
            to: Anchor::at(11.1, 65.0, 10.1),
        };
        assert!(!stepped.is_same_column_move());
    }
}
