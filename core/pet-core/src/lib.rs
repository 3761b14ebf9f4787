//! # pet-core
//!
//! Core library for Claude Pet: decides what the pet is doing and how far it
//! has come.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. Every engine is a deterministic
//!   `tick(now)` driven by whoever owns it.
//! - **Single owner**: Resolver, progression and message queue each belong to
//!   one task. Everyone else sends inputs through channels or reads snapshots.
//! - **Graceful degradation**: A failing source contributes nothing for a tick;
//!   unusable persisted data becomes a fresh state. Nothing here is fatal.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pet_core::{StatusEngine, StatusResolver, RevertPolicy, ResolverConfig};
//!
//! let mut resolver = StatusResolver::new(ResolverConfig::default(), now);
//! build_sources(&config.observers).register_into(&mut resolver);
//! let mut engine = StatusEngine::new(resolver, RevertPolicy::default());
//! let outcome = engine.tick(now);
//! ```

pub mod activity;
pub mod config;
pub mod error;
pub mod hook;
pub mod messages;
pub mod observers;
pub mod progression;
pub mod source;
pub mod status;
pub mod storage;

pub use activity::{Activity, ActivityLabel, RevertClass, Skill};
pub use config::{load_config, PetConfig};
pub use error::{PetError, Result, SourceError};
pub use messages::{
    DisplayedMessage, Message, MessageEvent, MessageQueue, MessageQueueConfig, MessageSender,
};
pub use observers::{build_sources, SourceHandles, SourceSet};
pub use progression::{
    LevelKind, LevelUp, ProgressionConfig, ProgressionEngine, ProgressionSnapshot,
    ProgressionState, ProgressionStore,
};
pub use source::{Observation, ObservationSource, PriorityRank, SourceId};
pub use status::{
    HookSender, ResolvedStatus, ResolverConfig, RevertPolicy, StatusEngine, StatusResolver,
    TickOutcome,
};
pub use storage::StorageConfig;
