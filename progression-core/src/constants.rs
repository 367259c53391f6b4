//! Centralized progression constants.
//!
//! Curve parameters, storage keys and reward amounts shared by the stores.
//! Per-module tunables (seed data, stage bands) stay next to the code that
//! uses them.

// =====================================================
// Requirement curves
// =====================================================

/// XP needed to leave player level 1
pub const BASE_PLAYER_XP: u64 = 10_000;

/// Per-level growth of the player curve
pub const GROWTH_PLAYER: f64 = 1.10;

/// XP needed to raise a stat from value 1
pub const BASE_STAT_XP: u64 = 100;

/// Per-value growth of the stat curve (softer than the player curve)
pub const GROWTH_STAT: f64 = 1.05;

/// Single mastery bar length for newly created status skills
pub const DEFAULT_SKILL_REQUIRED_XP: u64 = 100;

// =====================================================
// Skill tree
// =====================================================

/// Highest level a tree skill can reach; reaching it counts as mastery
pub const TREE_MAX_LEVEL: u32 = 10;

/// XP bar length for every tree skill level
pub const TREE_REQUIRED_XP: u64 = 100;

/// Id of the undeletable tree root
pub const TREE_ROOT_ID: &str = "root";

/// Base parent-to-child distance in the radial layout
pub const LAYOUT_BASE_DISTANCE: f64 = 180.0;

/// Random extra distance added on top of the base (uniform in [0, jitter))
pub const LAYOUT_DISTANCE_JITTER: f64 = 40.0;

/// Minimum number of angular slots around a parent
pub const LAYOUT_MIN_SLOTS: usize = 3;

// =====================================================
// Storage keys
// =====================================================

pub const STATUS_KEY: &str = "player-status";
pub const SKILL_TREE_KEY: &str = "skill-tree-data";
pub const TRACK_LOG_KEY: &str = "track-log-records";
pub const SETTINGS_KEY: &str = "system-settings-storage";

/// Undelivered notifications kept per store before the oldest are dropped
pub const OUTBOX_CAPACITY: usize = 256;

// =====================================================
// Track log rewards
// =====================================================

pub const CORE_QUEST_XP: u64 = 50;
pub const OPTIONAL_QUEST_XP: u64 = 25;
pub const SPECIAL_QUEST_XP: u64 = 100;

/// Days of sample history generated when no track log exists yet
pub const SAMPLE_HISTORY_DAYS: i64 = 60;
