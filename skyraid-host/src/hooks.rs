//! The action gate: where host events meet the access decision engine.
//!
//! Hosts call [`ActionGate::check`] from their movement, block, combat and
//! interaction handlers and cancel the action on [`Verdict::Cancel`],
//! showing the message to the actor.

use std::collections::HashSet;

use skyraid_core::access::{AccessDecisionEngine, AccessPolicy, ActionKind, Decision, DenyReason};
use skyraid_core::config::AccessConfig;
use skyraid_core::registry::TerritoryRegistry;

use crate::events::ActionEvent;

/// What the host should do with the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Let it happen.
    Proceed,
    /// Cancel it and tell the actor why.
    Cancel {
        /// Message for the actor.
        message: String,
    },
}

impl Verdict {
    /// Whether the host should cancel.
    #[must_use]
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel { .. })
    }
}

/// Filters host events and asks the engine about the rest.
#[derive(Debug)]
pub struct ActionGate {
    engine: AccessDecisionEngine,
    protected_blocks: HashSet<String>,
}

impl ActionGate {
    /// Gate using the access section of the configuration.
    #[must_use]
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            engine: AccessDecisionEngine::new(AccessPolicy::from(config)),
            protected_blocks: config
                .protected_blocks
                .iter()
                .map(|b| b.to_ascii_uppercase())
                .collect(),
        }
    }

    /// The underlying engine, for counters.
    #[must_use]
    pub fn engine(&self) -> &AccessDecisionEngine {
        &self.engine
    }

    /// Whether interacting with `kind` counts as opening a container.
    #[must_use]
    pub fn is_protected_block(&self, kind: &str) -> bool {
        self.protected_blocks.contains(&kind.to_ascii_uppercase())
    }

    /// Judge one event.
    pub fn check(&self, registry: &TerritoryRegistry, event: &ActionEvent, now_ms: i64) -> Verdict {
        if event.is_same_column_move() {
            return Verdict::Proceed;
        }
        if let ActionEvent::Interact { kind, .. } = event {
            if !self.is_protected_block(kind) {
                return Verdict::Proceed;
            }
        }
        let kind = event.kind();
        match self
            .engine
            .decide(registry, event.actor(), event.target(), kind, now_ms)
        {
            Decision::Allow => Verdict::Proceed,
            Decision::Deny(reason) => Verdict::Cancel {
                message: deny_message(reason, kind),
            },
        }
    }
}

/// Actor-facing explanation of a denial.
#[must_use]
pub fn deny_message(reason: DenyReason, kind: ActionKind) -> String {
    match reason {
        DenyReason::TargetProtected { remaining_ms } => {
            let minutes = remaining_ms.max(0) / 60_000;
            let (h, m) = (minutes / 60, minutes % 60);
            format!("This territory is shielded for another {h}h {m}m.")
        }
        DenyReason::ActorProtected => {
            let verb = match kind {
                ActionKind::Enter => "enter",
                ActionKind::BreakOrPlace => "build in",
                ActionKind::Combat => "fight in",
                ActionKind::OpenContainer => "open containers in",
            };
            format!("Your territory is shielded. You cannot {verb} other territories until it expires.")
        }
    }
}
