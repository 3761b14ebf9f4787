//! Progression state, its read-only snapshot, and level-up events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ladder::{cumulative_overall_threshold, skill_threshold, tier_for_level, SkillRecord};
use crate::activity::Skill;

/// One profile's leveling state. Owned by the progression task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    #[serde(default)]
    pub total_xp: u64,
    #[serde(default = "first_level")]
    pub level: u32,
    #[serde(default)]
    pub skills: BTreeMap<String, SkillRecord>,
    #[serde(default)]
    pub total_active_ms: u64,
    #[serde(default)]
    pub sessions: u64,
}

fn first_level() -> u32 {
    1
}

impl Default for ProgressionState {
    fn default() -> Self {
        let mut state = Self {
            total_xp: 0,
            level: 1,
            skills: BTreeMap::new(),
            total_active_ms: 0,
            sessions: 0,
        };
        state.fill_missing_skills();
        state
    }
}

impl ProgressionState {
    /// Adds zero records for any skill the persisted shape did not know about.
    /// Returns how many were added.
    pub fn fill_missing_skills(&mut self) -> usize {
        let mut added = 0;
        for skill in Skill::ALL {
            if !self.skills.contains_key(skill.key()) {
                self.skills.insert(skill.key().to_string(), SkillRecord::default());
                added += 1;
            }
        }
        added
    }

    pub fn skill(&self, skill: Skill) -> SkillRecord {
        self.skills.get(skill.key()).copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> ProgressionSnapshot {
        ProgressionSnapshot {
            total_xp: self.total_xp,
            level: self.level,
            tier: tier_for_level(self.level),
            next_level_at: cumulative_overall_threshold(self.level),
            skills: self
                .skills
                .iter()
                .map(|(name, record)| SkillSnapshot {
                    name: name.clone(),
                    xp: record.xp,
                    level: record.level,
                    next_level_at: skill_threshold(record.level),
                })
                .collect(),
            total_active_ms: self.total_active_ms,
            sessions: self.sessions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSnapshot {
    pub name: String,
    pub xp: u64,
    pub level: u32,
    pub next_level_at: u64,
}

/// Display projection handed to renderers and IPC clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionSnapshot {
    pub total_xp: u64,
    pub level: u32,
    pub tier: u8,
    /// Lifetime XP at which the next overall level is reached.
    pub next_level_at: u64,
    pub skills: Vec<SkillSnapshot>,
    pub total_active_ms: u64,
    pub sessions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Skill,
    Overall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub kind: LevelKind,
    /// Skill key for skill level-ups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub new_level: u32,
}
