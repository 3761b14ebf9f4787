//! XP, skill levels and the overall level.
//!
//! - [`ladder`]: threshold math and the level-up loops
//! - [`state`]: owned state, snapshots, level-up events
//! - [`store`]: versioned JSON persistence with atomic writes
//! - [`engine`]: the per-tick state machine the daemon drives

pub mod engine;
pub mod ladder;
pub mod state;
pub mod store;

pub use engine::{
    ProgressionConfig, ProgressionEngine, DEFAULT_FLUSH_SECS, DEFAULT_PROGRESSION_TICK_MS,
};
pub use ladder::{
    cumulative_overall_threshold, overall_level_for, overall_level_threshold, skill_threshold,
    tier_for_level, SkillRecord,
};
pub use state::{LevelKind, LevelUp, ProgressionSnapshot, ProgressionState, SkillSnapshot};
pub use store::{ProgressionStore, PROGRESSION_VERSION};
