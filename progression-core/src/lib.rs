//! System - Progression Core Library
//!
//! Deterministic progression logic for the System productivity RPG:
//! - Requirement curves (player level, character stats)
//! - XP accumulation with multi-level rollover
//! - Single-bar skill mastery (progressive → mastered)
//! - Progression store (status card state, rewards, notifications)
//! - Skill tree (radial layout, capped node levels, cascade delete)
//! - Track log (daily quest/habit history, completion rates)
//! - System settings
//! - Key-value JSON persistence with versioned blob migration
//! - Bevy plugin exposing the stores as a resource with XP events

pub mod config;
pub mod constants;
pub mod curve;
pub mod events;
pub mod helpers;
pub mod leveling;
pub mod logging;
pub mod mastery;
pub mod migration;
pub mod plugin;
pub mod settings;
pub mod skill_tree;
pub mod status;
pub mod storage;
pub mod store;
pub mod track_log;

pub use config::{load_config, ProgressionConfig};
pub use plugin::{ProgressionPlugin, ProgressionResource};
pub use store::{ProgressionError, ProgressionStore, Reward};
