//! Activity vocabulary shared by the resolver, revert policy and progression.
//!
//! Labels are an open vocabulary (`idle`, `coding`, `idle-coffee`, ...). The
//! only structure the core cares about is the base [`Activity`] a label maps
//! to, which carries the XP rate, the skill it trains and its revert class.
//! Unknown labels are valid everywhere and simply map to nothing.

use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// Labels
// ═══════════════════════════════════════════════════════════════════════════════

/// An opaque activity label. Equality is the only meaningful operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityLabel(String);

impl ActivityLabel {
    pub const BASELINE: &'static str = "idle";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The neutral baseline every transient status eventually returns to.
    pub fn baseline() -> Self {
        Self(Self::BASELINE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_baseline(&self) -> bool {
        self.0 == Self::BASELINE
    }

    /// Maps the label to its base activity.
    ///
    /// Exact names win; compound `<activity>-<variant>` labels fall back to
    /// the prefix before the first `-`.
    pub fn activity(&self) -> Option<Activity> {
        let label = self.0.trim();
        Activity::from_name(label).or_else(|| {
            label
                .split_once('-')
                .and_then(|(base, _variant)| Activity::from_name(base))
        })
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivityLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Activity> for ActivityLabel {
    fn from(value: Activity) -> Self {
        Self::new(value.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Activities
// ═══════════════════════════════════════════════════════════════════════════════

/// Known base activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Idle,
    Thinking,
    Coding,
    Searching,
    Reading,
    Debugging,
    Installing,
    Testing,
    Deploying,
    Cooking,
    Hatching,
    Deleting,
    Downloading,
    Success,
    Error,
}

/// How long a status may hold before the revert policy returns it to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertClass {
    /// Brief flashes (success/error).
    QuickTransient,
    /// Work states that should not linger once their signal goes quiet.
    SlowTransient,
    /// Never reverted.
    Sticky,
}

impl Activity {
    pub const ALL: [Activity; 15] = [
        Activity::Idle,
        Activity::Thinking,
        Activity::Coding,
        Activity::Searching,
        Activity::Reading,
        Activity::Debugging,
        Activity::Installing,
        Activity::Testing,
        Activity::Deploying,
        Activity::Cooking,
        Activity::Hatching,
        Activity::Deleting,
        Activity::Downloading,
        Activity::Success,
        Activity::Error,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|activity| activity.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Activity::Idle => "idle",
            Activity::Thinking => "thinking",
            Activity::Coding => "coding",
            Activity::Searching => "searching",
            Activity::Reading => "reading",
            Activity::Debugging => "debugging",
            Activity::Installing => "installing",
            Activity::Testing => "testing",
            Activity::Deploying => "deploying",
            Activity::Cooking => "cooking",
            Activity::Hatching => "hatching",
            Activity::Deleting => "deleting",
            Activity::Downloading => "downloading",
            Activity::Success => "success",
            Activity::Error => "error",
        }
    }

    /// XP granted per progression tick while this activity is shown.
    pub fn xp_rate(self) -> u64 {
        match self {
            Activity::Idle => 0,
            Activity::Coding | Activity::Deploying => 5,
            Activity::Debugging | Activity::Testing => 4,
            Activity::Thinking | Activity::Cooking => 3,
            Activity::Searching | Activity::Reading | Activity::Installing | Activity::Hatching => {
                2
            }
            Activity::Downloading | Activity::Deleting | Activity::Error => 1,
            Activity::Success => 10,
        }
    }

    /// Skill ladder this activity trains, if any.
    pub fn skill(self) -> Option<Skill> {
        match self {
            Activity::Coding | Activity::Cooking => Some(Skill::Coding),
            Activity::Searching | Activity::Reading | Activity::Downloading => {
                Some(Skill::Research)
            }
            Activity::Debugging | Activity::Testing | Activity::Error => Some(Skill::Debugging),
            Activity::Installing | Activity::Deploying | Activity::Deleting => {
                Some(Skill::Operations)
            }
            Activity::Thinking | Activity::Hatching => Some(Skill::Thinking),
            Activity::Idle | Activity::Success => None,
        }
    }

    pub fn revert_class(self) -> RevertClass {
        match self {
            Activity::Success | Activity::Error => RevertClass::QuickTransient,
            Activity::Idle => RevertClass::Sticky,
            _ => RevertClass::SlowTransient,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Skills
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-category leveling ladders, distinct from the overall level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Coding,
    Research,
    Debugging,
    Operations,
    Thinking,
}

impl Skill {
    pub const ALL: [Skill; 5] = [
        Skill::Coding,
        Skill::Research,
        Skill::Debugging,
        Skill::Operations,
        Skill::Thinking,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Skill::Coding => "coding",
            Skill::Research => "research",
            Skill::Debugging => "debugging",
            Skill::Operations => "operations",
            Skill::Thinking => "thinking",
        }
    }
}

/// Rate lookup that defaults safely for unrecognized labels.
pub fn xp_rate(label: &ActivityLabel) -> u64 {
    label.activity().map_or(0, Activity::xp_rate)
}

/// Skill lookup that defaults safely for unrecognized labels.
pub fn skill_for(label: &ActivityLabel) -> Option<Skill> {
    label.activity().and_then(Activity::skill)
}

/// Revert class lookup; unknown labels are sticky.
pub fn revert_class(label: &ActivityLabel) -> RevertClass {
    label
        .activity()
        .map_or(RevertClass::Sticky, Activity::revert_class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_labels_fall_back_to_their_base() {
        assert_eq!(
            ActivityLabel::from("idle-coffee").activity(),
            Some(Activity::Idle)
        );
        assert_eq!(
            ActivityLabel::from("coding-night").activity(),
            Some(Activity::Coding)
        );
        assert_eq!(ActivityLabel::from("dancing").activity(), None);
    }

    #[test]
    fn unknown_labels_grant_nothing_and_never_revert() {
        let label = ActivityLabel::from("juggling");
        assert_eq!(xp_rate(&label), 0);
        assert_eq!(skill_for(&label), None);
        assert_eq!(revert_class(&label), RevertClass::Sticky);
    }

    #[test]
    fn idle_variants_are_sticky_and_free() {
        let label = ActivityLabel::from("idle-dancing");
        assert_eq!(xp_rate(&label), 0);
        assert_eq!(revert_class(&label), RevertClass::Sticky);
    }

    #[test]
    fn revert_classes_match_flash_and_work_states() {
        assert_eq!(
            revert_class(&ActivityLabel::from("success")),
            RevertClass::QuickTransient
        );
        assert_eq!(
            revert_class(&ActivityLabel::from("error")),
            RevertClass::QuickTransient
        );
        assert_eq!(
            revert_class(&ActivityLabel::from("testing")),
            RevertClass::SlowTransient
        );
    }

    #[test]
    fn success_levels_overall_but_no_skill() {
        let label = ActivityLabel::from("success");
        assert_eq!(xp_rate(&label), 10);
        assert_eq!(skill_for(&label), None);
    }

    #[test]
    fn every_activity_round_trips_through_its_name() {
        for activity in Activity::ALL {
            assert_eq!(Activity::from_name(activity.name()), Some(activity));
        }
    }
}
