//! Allow/deny arbitration for actions against territories.
//!
//! Precedence:
//! 1. unclaimed target → allow
//! 2. actor's own territory → allow, whatever its protection
//! 3. target protected → deny
//! 4. actor's territory protected → deny (a shielded actor may not raid)
//! 5. allow
//!
//! The engine reads the registry and never mutates it.

use std::fmt;

use tracing::trace;

use crate::config::AccessConfig;
use crate::metrics::SkyraidCounters;
use crate::protection::ProtectionStateMachine;
use crate::registry::TerritoryRegistry;
use crate::types::{ActorId, ColumnPos};

/// What the actor is attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Walking into the column.
    Enter,
    /// Breaking or placing a block.
    BreakOrPlace,
    /// Attacking another actor standing in the column.
    Combat,
    /// Opening a container block.
    OpenContainer,
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The territory being acted on is protected.
    TargetProtected {
        /// Milliseconds of protection left on the target.
        remaining_ms: i64,
    },
    /// The actor's own territory is protected, which bars acting on others.
    ActorProtected,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetProtected { .. } => f.write_str("target protected"),
            Self::ActorProtected => {
                f.write_str("actor protected: may not act on others while shielded")
            }
        }
    }
}

/// Outcome of [`AccessDecisionEngine::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Go ahead.
    Allow,
    /// Cancel the action.
    Deny(DenyReason),
}

impl Decision {
    /// Whether the action may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Policy knobs layered on top of the fixed precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Skip the actor-protected rule for [`ActionKind::Enter`] only.
    pub shielded_may_enter: bool,
}

impl From<&AccessConfig> for AccessPolicy {
    fn from(config: &AccessConfig) -> Self {
        Self {
            shielded_may_enter: config.shielded_may_enter,
        }
    }
}

/// The decision engine.
#[derive(Debug, Default)]
pub struct AccessDecisionEngine {
    policy: AccessPolicy,
    counters: SkyraidCounters,
}

impl AccessDecisionEngine {
    /// Engine with the given policy.
    #[must_use]
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            policy,
            counters: SkyraidCounters::new(),
        }
    }

    /// Active policy.
    #[must_use]
    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Counters updated by every decision.
    #[must_use]
    pub fn counters(&self) -> &SkyraidCounters {
        &self.counters
    }

    /// Decide whether `actor` may perform `kind` at `target`.
    pub fn decide(
        &self,
        registry: &TerritoryRegistry,
        actor: ActorId,
        target: ColumnPos,
        kind: ActionKind,
        now_ms: i64,
    ) -> Decision {
        let decision = self.evaluate(registry, actor, target, kind, now_ms);
        self.counters.record_decision(&decision);
        if let Decision::Deny(reason) = decision {
            trace!(actor = %actor, target = %target, ?kind, %reason, "Action denied");
        }
        decision
    }

    fn evaluate(
        &self,
        registry: &TerritoryRegistry,
        actor: ActorId,
        target: ColumnPos,
        kind: ActionKind,
        now_ms: i64,
    ) -> Decision {
        let Some(target_territory) = registry.by_position(target) else {
            return Decision::Allow;
        };
        let actor_territory = registry.membership_of(actor);

        if actor_territory.is_some_and(|own| own.id == target_territory.id) {
            return Decision::Allow;
        }

        if ProtectionStateMachine::is_protected(target_territory, now_ms) {
            return Decision::Deny(DenyReason::TargetProtected {
                remaining_ms: target_territory.protection_expiry_ms - now_ms,
            });
        }

        let exempt = kind == ActionKind::Enter && self.policy.shielded_may_enter;
        if !exempt
            && actor_territory.is_some_and(|own| ProtectionStateMachine::is_protected(own, now_ms))
        {
            return Decision::Deny(DenyReason::ActorProtected);
        }

        Decision::Allow
    }
}
