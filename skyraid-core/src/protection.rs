//! Time-boxed protection ("forcefield") state.
//!
//! State lives entirely in [`Territory::protection_expiry_ms`]. There is no
//! timer: expiry is evaluated lazily against the caller's notion of now.

use std::time::Duration;

use tracing::info;

use crate::error::{Result, SkyraidError};
use crate::territory::Territory;

/// Milliseconds per hour.
pub const MS_PER_HOUR: i64 = 3_600_000;

/// Observable protection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionState {
    /// Expiry has passed (or was never set).
    Unprotected,
    /// Protected for another `remaining_ms`.
    Protected {
        /// Milliseconds until expiry.
        remaining_ms: i64,
    },
}

/// Stateless operations over a territory's protection timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectionStateMachine;

impl ProtectionStateMachine {
    /// Protect for `duration_hours` from `now_ms`, replacing any existing
    /// expiry. Returns the new expiry.
    ///
    /// # Errors
    /// `InvalidDuration` if `duration_hours <= 0`.
    pub fn activate(territory: &mut Territory, duration_hours: i64, now_ms: i64) -> Result<i64> {
        if duration_hours <= 0 {
            return Err(SkyraidError::InvalidDuration {
                hours: duration_hours,
            });
        }
        let expiry = now_ms.saturating_add(duration_hours.saturating_mul(MS_PER_HOUR));
        territory.protection_expiry_ms = expiry;
        info!(
            territory = %territory.id,
            hours = duration_hours,
            expiry_ms = expiry,
            "Protection activated"
        );
        Ok(expiry)
    }

    /// Drop protection immediately. Idempotent.
    pub fn deactivate(territory: &mut Territory) {
        if territory.protection_expiry_ms != 0 {
            info!(territory = %territory.id, "Protection deactivated");
        }
        territory.protection_expiry_ms = 0;
    }

    /// `expiry > now`.
    #[must_use]
    pub fn is_protected(territory: &Territory, now_ms: i64) -> bool {
        territory.protection_expiry_ms > now_ms
    }

    /// Time left, zero when unprotected.
    #[must_use]
    pub fn remaining(territory: &Territory, now_ms: i64) -> Duration {
        Duration::from_millis(remaining_ms(territory, now_ms))
    }

    /// Current state.
    #[must_use]
    pub fn state(territory: &Territory, now_ms: i64) -> ProtectionState {
        if Self::is_protected(territory, now_ms) {
            ProtectionState::Protected {
                remaining_ms: territory.protection_expiry_ms - now_ms,
            }
        } else {
            ProtectionState::Unprotected
        }
    }

    /// Whole hours left, rounded down.
    #[must_use]
    pub fn remaining_hours(territory: &Territory, now_ms: i64) -> u64 {
        remaining_ms(territory, now_ms) / MS_PER_HOUR.unsigned_abs()
    }
}

#[allow(clippy::cast_sign_loss)]
fn remaining_ms(territory: &Territory, now_ms: i64) -> u64 {
    territory.protection_expiry_ms.saturating_sub(now_ms).max(0) as u64
}
