//! Timed auto-reversion to the neutral baseline.
//!
//! Runs right after the resolver on the same cadence. Quick transients
//! (success/error) always revert after their timeout, even while the hook
//! dominates. Slow transients only revert when nobody is holding them: not
//! while the hook dominates, and not while a watcher keeps reporting them.

use chrono::{DateTime, Duration, Utc};

use crate::activity::{revert_class, RevertClass};
use crate::status::resolver::{ResolvedStatus, StatusResolver};

pub const DEFAULT_QUICK_REVERT_SECS: i64 = 5;
pub const DEFAULT_SLOW_REVERT_SECS: i64 = 120;

#[derive(Debug, Clone)]
pub struct RevertPolicy {
    pub quick: Duration,
    pub slow: Duration,
}

impl Default for RevertPolicy {
    fn default() -> Self {
        Self {
            quick: Duration::seconds(DEFAULT_QUICK_REVERT_SECS),
            slow: Duration::seconds(DEFAULT_SLOW_REVERT_SECS),
        }
    }
}

impl RevertPolicy {
    pub fn should_revert(
        &self,
        status: &ResolvedStatus,
        hook_active: bool,
        held_by_watcher: bool,
        now: DateTime<Utc>,
    ) -> bool {
        let elapsed = now.signed_duration_since(status.since);
        match revert_class(&status.label) {
            RevertClass::Sticky => false,
            RevertClass::QuickTransient => elapsed > self.quick,
            RevertClass::SlowTransient => {
                !hook_active && !held_by_watcher && elapsed > self.slow
            }
        }
    }

    /// Forces the resolver back to baseline when the current status has
    /// outlived its class timeout. Returns the new status when it fired.
    pub fn enforce(
        &self,
        resolver: &mut StatusResolver,
        now: DateTime<Utc>,
    ) -> Option<ResolvedStatus> {
        let fire = self.should_revert(
            resolver.current(),
            resolver.hook_active(now),
            resolver.held_by_watcher(),
            now,
        );
        if !fire {
            return None;
        }
        tracing::debug!(
            label = %resolver.current().label,
            source = %resolver.current().source,
            "Auto-reverting status to baseline"
        );
        resolver.force_baseline(now);
        Some(resolver.current().clone())
    }
}
