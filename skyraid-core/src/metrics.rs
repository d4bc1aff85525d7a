//! Runtime counters.
//!
//! Access decisions run on every movement and block event, so counting is
//! lock-free (`AtomicU64`, relaxed). Reads happen on dashboard export only.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::access::{Decision, DenyReason};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomic counters for territory events.
#[derive(Debug)]
pub struct SkyraidCounters {
    /// Decisions that allowed the action.
    pub decisions_allowed: AtomicU64,
    /// Denials because the target territory was protected.
    pub denied_target_protected: AtomicU64,
    /// Denials because the actor's own territory was protected.
    pub denied_actor_protected: AtomicU64,
    /// Territories created since startup.
    pub territories_created: AtomicU64,
    /// Territories dissolved since startup.
    pub territories_dissolved: AtomicU64,
    /// Protection grants.
    pub protection_activations: AtomicU64,
    /// Safe-anchor searches that fell back to the raw candidate.
    pub anchor_fallbacks: AtomicU64,
    /// Save operations completed.
    pub saves_completed: AtomicU64,
}

impl SkyraidCounters {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            decisions_allowed: AtomicU64::new(0),
            denied_target_protected: AtomicU64::new(0),
            denied_actor_protected: AtomicU64::new(0),
            territories_created: AtomicU64::new(0),
            territories_dissolved: AtomicU64::new(0),
            protection_activations: AtomicU64::new(0),
            anchor_fallbacks: AtomicU64::new(0),
            saves_completed: AtomicU64::new(0),
        }
    }

    /// Count one access decision.
    pub fn record_decision(&self, decision: &Decision) {
        let counter = match decision {
            Decision::Allow => &self.decisions_allowed,
            Decision::Deny(DenyReason::TargetProtected { .. }) => &self.denied_target_protected,
            Decision::Deny(DenyReason::ActorProtected) => &self.denied_actor_protected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Bump a counter by one.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            decisions_allowed: self.decisions_allowed.load(Ordering::Relaxed),
            denied_target_protected: self.denied_target_protected.load(Ordering::Relaxed),
            denied_actor_protected: self.denied_actor_protected.load(Ordering::Relaxed),
            territories_created: self.territories_created.load(Ordering::Relaxed),
            territories_dissolved: self.territories_dissolved.load(Ordering::Relaxed),
            protection_activations: self.protection_activations.load(Ordering::Relaxed),
            anchor_fallbacks: self.anchor_fallbacks.load(Ordering::Relaxed),
            saves_completed: self.saves_completed.load(Ordering::Relaxed),
        }
    }
}

impl Default for SkyraidCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Allowed decisions.
    pub decisions_allowed: u64,
    /// Target-protected denials.
    pub denied_target_protected: u64,
    /// Actor-protected denials.
    pub denied_actor_protected: u64,
    /// Territories created.
    pub territories_created: u64,
    /// Territories dissolved.
    pub territories_dissolved: u64,
    /// Protection grants.
    pub protection_activations: u64,
    /// Fallback anchors.
    pub anchor_fallbacks: u64,
    /// Completed saves.
    pub saves_completed: u64,
}

impl CounterSnapshot {
    /// Total decisions of any outcome.
    #[must_use]
    pub fn decisions_total(&self) -> u64 {
        self.decisions_allowed + self.denied_target_protected + self.denied_actor_protected
    }

    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP skyraid_access_decisions_total Access decisions by outcome\n\
             # TYPE skyraid_access_decisions_total counter\n\
             skyraid_access_decisions_total{{outcome=\"allow\"}} {}\n\
             skyraid_access_decisions_total{{outcome=\"target_protected\"}} {}\n\
             skyraid_access_decisions_total{{outcome=\"actor_protected\"}} {}\n\
             # HELP skyraid_territories_created_total Territories created\n\
             # TYPE skyraid_territories_created_total counter\n\
             skyraid_territories_created_total {}\n\
             # HELP skyraid_territories_dissolved_total Territories dissolved\n\
             # TYPE skyraid_territories_dissolved_total counter\n\
             skyraid_territories_dissolved_total {}\n\
             # HELP skyraid_protection_activations_total Protection grants\n\
             # TYPE skyraid_protection_activations_total counter\n\
             skyraid_protection_activations_total {}\n\
             # HELP skyraid_anchor_fallbacks_total Unsafe anchors used as-is\n\
             # TYPE skyraid_anchor_fallbacks_total counter\n\
             skyraid_anchor_fallbacks_total {}\n\
             # HELP skyraid_saves_completed_total Save operations completed\n\
             # TYPE skyraid_saves_completed_total counter\n\
             skyraid_saves_completed_total {}\n",
            self.decisions_allowed,
            self.denied_target_protected,
            self.denied_actor_protected,
            self.territories_created,
            self.territories_dissolved,
            self.protection_activations,
            self.anchor_fallbacks,
            self.saves_completed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_are_bucketed_by_outcome() {
        let counters = SkyraidCounters::new();
        counters.record_decision(&Decision::Allow);
        counters.record_decision(&Decision::Allow);
        counters.record_decision(&Decision::Deny(DenyReason::ActorProtected));
        counters.record_decision(&Decision::Deny(DenyReason::TargetProtected {
            remaining_ms: 10,
        }));
        let snap = counters.snapshot();
        assert_eq!(snap.decisions_allowed, 2);
        assert_eq!(snap.denied_actor_protected, 1);
        assert_eq!(snap.denied_target_protected, 1);
        assert_eq!(snap.decisions_total(), 4);
    }

    #[test]
    fn prometheus_export_contains_labels() {
        let counters = SkyraidCounters::new();
        SkyraidCounters::bump(&counters.territories_created);
        let text = counters.snapshot().to_prometheus();
        assert!(text.contains("skyraid_territories_created_total 1"));
        assert!(text.contains("outcome=\"actor_protected\"} 0"));
    }
}
