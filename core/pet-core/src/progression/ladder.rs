//! Leveling math.
//!
//! Skills and the overall level use different rules on purpose:
//!
//! - **Skill XP resets on overflow.** `xp` always stays in
//!   `[0, skill_threshold(level))`; crossing a threshold subtracts it.
//! - **Overall level is cumulative.** Lifetime XP is compared against the
//!   running sum of per-level thresholds and is never reduced.
//!
//! Both loop until below threshold, so one large grant can cross several
//! levels and yields one event per level crossed.

use serde::{Deserialize, Serialize};

/// `floor(100 * level * 1.2)`
pub fn skill_threshold(level: u32) -> u64 {
    u64::from(level) * 100 * 12 / 10
}

/// `floor(500 * level * 1.5)`
pub fn overall_level_threshold(level: u32) -> u64 {
    u64::from(level) * 500 * 15 / 10
}

/// Lifetime XP needed to leave `level`: `Σ_{i=1..level} overall_level_threshold(i)`,
/// which is `375 * level * (level + 1)`. Saturates at `u64::MAX`.
pub fn cumulative_overall_threshold(level: u32) -> u64 {
    let level = u128::from(level);
    u64::try_from(375 * level * (level + 1)).unwrap_or(u64::MAX)
}

/// Overall level implied by lifetime XP alone: the smallest level whose
/// cumulative threshold is still above `total_xp`.
pub fn overall_level_for(total_xp: u64) -> u32 {
    let (mut low, mut high) = (1u32, u32::MAX);
    while low < high {
        let mid = low + (high - low) / 2;
        if total_xp < cumulative_overall_threshold(mid) {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    low
}

/// Cosmetic bucket for the overall level.
pub fn tier_for_level(level: u32) -> u8 {
    match level {
        0..=4 => 0,
        5..=9 => 1,
        10..=14 => 2,
        15..=19 => 3,
        20..=24 => 4,
        _ => 5,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    #[serde(default)]
    pub xp: u64,
    #[serde(default = "first_level")]
    pub level: u32,
}

fn first_level() -> u32 {
    1
}

impl Default for SkillRecord {
    fn default() -> Self {
        Self { xp: 0, level: 1 }
    }
}

impl SkillRecord {
    /// Adds XP and returns every level reached, in order.
    pub fn grant(&mut self, xp: u64) -> Vec<u32> {
        self.xp = self.xp.saturating_add(xp);
        self.settle()
    }

    /// Runs the threshold loop without adding XP. Repairs records whose xp
    /// was persisted above their threshold.
    pub fn settle(&mut self) -> Vec<u32> {
        self.level = self.level.max(1);
        let mut reached = Vec::new();
        loop {
            let threshold = skill_threshold(self.level);
            if self.xp < threshold {
                break;
            }
            self.xp -= threshold;
            self.level += 1;
            reached.push(self.level);
        }
        reached
    }

    /// Same end state as [`settle`](Self::settle), reached without walking
    /// one level at a time. Used on loaded records, whose xp can be anything.
    pub fn repair(&mut self) {
        self.level = self.level.max(1);
        let start = u128::from(self.level);
        let xp = u128::from(self.xp);
        // XP to climb `k` levels from `start`: 120 * (k * start + k * (k - 1) / 2).
        let cost = |k: u128| 120 * (k * start + k * k.saturating_sub(1) / 2);

        let (mut low, mut high) = (0u128, u128::from(u32::MAX - self.level));
        while low < high {
            let mid = low + (high - low + 1) / 2;
            if cost(mid) <= xp {
                low = mid;
            } else {
                high = mid - 1;
            }
        }

        self.xp = u64::try_from(xp - cost(low)).unwrap_or(u64::MAX);
        self.level = self
            .level
            .saturating_add(u32::try_from(low).unwrap_or(u32::MAX));
    }
}

/// Raises `level` while lifetime XP meets the cumulative threshold. Returns
/// every level reached, in order.
pub fn advance_overall(total_xp: u64, level: &mut u32) -> Vec<u32> {
    *level = (*level).max(1);
    let mut reached = Vec::new();
    while *level < u32::MAX && total_xp >= cumulative_overall_threshold(*level) {
        *level += 1;
        reached.push(*level);
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_follow_the_formulas() {
        assert_eq!(skill_threshold(1), 120);
        assert_eq!(skill_threshold(2), 240);
        assert_eq!(skill_threshold(7), 840);
        assert_eq!(overall_level_threshold(1), 750);
        assert_eq!(overall_level_threshold(3), 2250);
        assert_eq!(cumulative_overall_threshold(1), 750);
        assert_eq!(cumulative_overall_threshold(2), 2250);
        assert_eq!(cumulative_overall_threshold(3), 4500);
    }

    #[test]
    fn twenty_four_grants_of_five_level_once_with_no_leftover() {
        let mut skill = SkillRecord::default();
        let mut reached = Vec::new();
        for _ in 0..24 {
            reached.extend(skill.grant(5));
        }
        assert_eq!(reached, vec![2]);
        assert_eq!(skill, SkillRecord { xp: 0, level: 2 });
    }

    #[test]
    fn one_large_grant_crosses_several_skill_levels() {
        let mut skill = SkillRecord::default();
        // 120 + 240 + 360 = 720, plus 5 left over at level 4.
        let reached = skill.grant(725);
        assert_eq!(reached, vec![2, 3, 4]);
        assert_eq!(skill, SkillRecord { xp: 5, level: 4 });
    }

    #[test]
    fn settle_repairs_overflowed_records() {
        let mut skill = SkillRecord { xp: 130, level: 1 };
        assert_eq!(skill.settle(), vec![2]);
        assert_eq!(skill, SkillRecord { xp: 10, level: 2 });
    }

    #[test]
    fn overall_first_levels_up_at_750() {
        let mut level = 1;
        assert!(advance_overall(749, &mut level).is_empty());
        assert_eq!(level, 1);
        assert_eq!(advance_overall(750, &mut level), vec![2]);
        assert_eq!(level, 2);
    }

    #[test]
    fn overall_is_cumulative_and_loops() {
        let mut level = 1;
        assert_eq!(advance_overall(4_500, &mut level), vec![2, 3, 4]);
        assert_eq!(level, 4);
        // Re-running with the same total never double counts.
        assert!(advance_overall(4_500, &mut level).is_empty());
    }

    #[test]
    fn cumulative_threshold_matches_the_running_sum() {
        let mut running = 0;
        for level in 1..=50 {
            running += overall_level_threshold(level);
            assert_eq!(cumulative_overall_threshold(level), running);
        }
        assert_eq!(cumulative_overall_threshold(u32::MAX), u64::MAX);
    }

    #[test]
    fn overall_level_for_agrees_with_advance() {
        for total_xp in [0, 749, 750, 2_249, 2_250, 4_500, 1_000_000] {
            let mut level = 1;
            advance_overall(total_xp, &mut level);
            assert_eq!(overall_level_for(total_xp), level, "total_xp {total_xp}");
        }
    }

    #[test]
    fn overall_level_for_huge_totals_does_not_overflow() {
        assert_eq!(overall_level_for(375 * 1_000 * 1_001), 1_001);
        assert!(overall_level_for(u64::MAX) > 200_000_000);
    }

    #[test]
    fn repair_matches_settle() {
        for (xp, level) in [(0, 1), (130, 1), (725, 1), (5_000, 3), (119, 1), (0, 0)] {
            let mut walked = SkillRecord { xp, level };
            walked.settle();
            let mut jumped = SkillRecord { xp, level };
            jumped.repair();
            assert_eq!(jumped, walked, "xp {xp} level {level}");
        }
    }

    #[test]
    fn repair_handles_extreme_records() {
        let mut skill = SkillRecord {
            xp: u64::MAX,
            level: 1,
        };
        skill.repair();
        assert!(skill.level > 1);
        assert!(skill.xp < skill_threshold(skill.level));

        let mut skill = SkillRecord {
            xp: 0,
            level: u32::MAX,
        };
        skill.repair();
        assert_eq!(skill, SkillRecord { xp: 0, level: u32::MAX });
    }

    #[test]
    fn tier_breakpoints() {
        assert_eq!(tier_for_level(1), 0);
        assert_eq!(tier_for_level(4), 0);
        assert_eq!(tier_for_level(5), 1);
        assert_eq!(tier_for_level(14), 2);
        assert_eq!(tier_for_level(20), 4);
        assert_eq!(tier_for_level(25), 5);
        assert_eq!(tier_for_level(90), 5);
    }
}
