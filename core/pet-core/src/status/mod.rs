//! Status resolution: arbitration plus auto-revert.
//!
//! ```text
//! hook writes ──┐
//!               ├─► StatusResolver::tick ─► RevertPolicy::enforce ─► ResolvedStatus
//! sources ──────┘            │
//!                            └─► side messages ─► MessageQueue
//! ```
//!
//! [`StatusEngine`] runs both halves in the order the daemon's status task
//! needs them.

mod resolver;
mod revert;

pub use resolver::{
    HookSender, HookWrite, ResolvedStatus, ResolverConfig, StatusResolver, TickOutcome,
    DEFAULT_DOMINANCE_SECS,
};
pub use revert::{RevertPolicy, DEFAULT_QUICK_REVERT_SECS, DEFAULT_SLOW_REVERT_SECS};

use chrono::{DateTime, Utc};

/// Resolver and revert policy driven as one deterministic tick.
pub struct StatusEngine {
    pub resolver: StatusResolver,
    pub policy: RevertPolicy,
}

impl StatusEngine {
    pub fn new(resolver: StatusResolver, policy: RevertPolicy) -> Self {
        Self { resolver, policy }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let mut outcome = self.resolver.tick(now);
        if let Some(reverted) = self.policy.enforce(&mut self.resolver, now) {
            outcome.changed = true;
            outcome.status = reverted;
        }
        outcome
    }

    pub fn current(&self) -> &ResolvedStatus {
        self.resolver.current()
    }
}
