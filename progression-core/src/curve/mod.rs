//! Requirement curves
//!
//! Maps a level (or stat value) to the XP needed to advance past it:
//! `floor(base * growth^(level - 1))`. Pure and deterministic.

use serde::{Deserialize, Serialize};

use crate::constants::{BASE_PLAYER_XP, BASE_STAT_XP, GROWTH_PLAYER, GROWTH_STAT};

/// Exponential XP requirement curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequirementCurve {
    pub base: u64,
    pub growth: f64,
}

impl RequirementCurve {
    /// Global player level curve (10000 * 1.10^(level-1))
    pub const PLAYER: Self = Self {
        base: BASE_PLAYER_XP,
        growth: GROWTH_PLAYER,
    };

    /// Character stat curve (100 * 1.05^(value-1))
    pub const STAT: Self = Self {
        base: BASE_STAT_XP,
        growth: GROWTH_STAT,
    };

    pub fn new(base: u64, growth: f64) -> Self {
        Self { base, growth }
    }

    /// XP required to advance past `level`.
    ///
    /// Level 0 is not a valid input; it is treated as level 1. Results past
    /// `u64::MAX` saturate.
    pub fn required_xp(&self, level: u32) -> u64 {
        let exponent = f64::from(level.saturating_sub(1));
        let raw = self.base as f64 * self.growth.powf(exponent);
        // float -> int casts saturate, so huge levels pin at u64::MAX
        raw.floor() as u64
    }

    /// Total XP spent to climb from level 1 to `level`
    pub fn cumulative_xp(&self, level: u32) -> u64 {
        (1..level.max(1)).fold(0u64, |acc, l| acc.saturating_add(self.required_xp(l)))
    }
}

impl Default for RequirementCurve {
    fn default() -> Self {
        Self::PLAYER
    }
}
