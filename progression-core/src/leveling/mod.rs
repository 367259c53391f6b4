//! XP accumulator for unbounded level ladders (player level, stats)
//!
//! Excess XP rolls over into the next level, the threshold is recomputed from
//! the requirement curve, and the loop repeats until the remainder fits under
//! the current threshold. There is no level cap.

use serde::{Deserialize, Serialize};

use crate::curve::RequirementCurve;

/// Position on a level ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    pub current_xp: u64,
    pub required_xp: u64,
}

impl LevelProgress {
    /// Fresh ladder position at level 1 on the given curve
    pub fn start(curve: &RequirementCurve) -> Self {
        Self {
            level: 1,
            current_xp: 0,
            required_xp: curve.required_xp(1),
        }
    }

    /// Progress toward the next level (0.0 - 1.0)
    pub fn fraction(&self) -> f32 {
        if self.required_xp == 0 {
            return 0.0;
        }
        (self.current_xp as f64 / self.required_xp as f64).min(1.0) as f32
    }
}

/// Levels crossed by a single accumulator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUp {
    pub previous: u32,
    pub new: u32,
}

impl LevelUp {
    pub fn levels_gained(&self) -> u32 {
        self.new - self.previous
    }
}

/// Result of applying XP to a ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGain {
    pub progress: LevelProgress,
    /// Present iff at least one level was gained
    pub level_up: Option<LevelUp>,
}

/// Add `amount` XP and fold every overflow into level increments.
///
/// Postcondition: `progress.current_xp < progress.required_xp`.
pub fn apply_xp(state: LevelProgress, amount: u64, curve: &RequirementCurve) -> XpGain {
    let previous = state.level;
    let mut level = state.level;
    let mut current_xp = state.current_xp.saturating_add(amount);
    let mut required_xp = state.required_xp.max(1);

    while current_xp >= required_xp {
        current_xp -= required_xp;
        level = level.saturating_add(1);
        required_xp = curve.required_xp(level).max(1);
        if level == u32::MAX {
            current_xp = current_xp.min(required_xp - 1);
            break;
        }
    }

    let level_up = (level > previous).then_some(LevelUp {
        previous,
        new: level,
    });

    XpGain {
        progress: LevelProgress {
            level,
            current_xp,
            required_xp,
        },
        level_up,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_start() -> LevelProgress {
        LevelProgress::start(&RequirementCurve::PLAYER)
    }

    #[test]
    fn test_zero_xp_is_identity() {
        let state = LevelProgress {
            level: 4,
            current_xp: 17,
            required_xp: 13_310,
        };
        let gain = apply_xp(state, 0, &RequirementCurve::PLAYER);
        assert_eq!(gain.progress, state);
        assert!(gain.level_up.is_none());
    }

    #[test]
    fn test_below_threshold_no_level_up() {
        let gain = apply_xp(player_start(), 9_999, &RequirementCurve::PLAYER);
        assert_eq!(gain.progress.level, 1);
        assert_eq!(gain.progress.current_xp, 9_999);
        assert!(gain.level_up.is_none());
    }

    #[test]
    fn test_exact_threshold_levels_up() {
        let gain = apply_xp(player_start(), 10_000, &RequirementCurve::PLAYER);
        assert_eq!(gain.progress.level, 2);
        assert_eq!(gain.progress.current_xp, 0);
        assert_eq!(gain.progress.required_xp, 11_000);
        assert_eq!(gain.level_up, Some(LevelUp { previous: 1, new: 2 }));
    }

    #[test]
    fn test_multi_level_rollover() {
        let curve = RequirementCurve::PLAYER;
        let gain = apply_xp(player_start(), 25_000, &curve);
        assert_eq!(gain.progress.level, 3);
        assert_eq!(
            gain.progress.current_xp,
            25_000 - 10_000 - curve.required_xp(2)
        );
        assert_eq!(gain.progress.current_xp, 4_000);
        assert_eq!(gain.progress.required_xp, 12_100);
        let up = gain.level_up.unwrap();
        assert_eq!(up.levels_gained(), 2);
    }

    #[test]
    fn test_stat_scenario() {
        let state = LevelProgress {
            level: 10,
            current_xp: 45,
            required_xp: 100,
        };
        let gain = apply_xp(state, 80, &RequirementCurve::STAT);
        assert_eq!(
            gain.progress,
            LevelProgress {
                level: 11,
                current_xp: 25,
                required_xp: 162,
            }
        );
        assert_eq!(gain.level_up, Some(LevelUp { previous: 10, new: 11 }));
    }

    #[test]
    fn test_zero_threshold_does_not_hang() {
        let state = LevelProgress {
            level: 1,
            current_xp: 0,
            required_xp: 0,
        };
        let gain = apply_xp(state, 5, &RequirementCurve::STAT);
        assert!(gain.progress.current_xp < gain.progress.required_xp);
    }

    #[test]
    fn test_saturating_add() {
        let state = LevelProgress {
            level: 1,
            current_xp: 50,
            required_xp: 100,
        };
        let gain = apply_xp(state, u64::MAX, &RequirementCurve::PLAYER);
        assert!(gain.progress.current_xp < gain.progress.required_xp);
        assert!(gain.progress.level > 1);
    }

    #[test]
    fn test_fraction() {
        let state = LevelProgress {
            level: 1,
            current_xp: 50,
            required_xp: 100,
        };
        assert!((state.fraction() - 0.5).abs() < 0.001);
    }
}
