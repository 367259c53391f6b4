//! Progression notifications
//!
//! Stores push these into an outbox as side effects of XP application. They
//! are purely informational (UI animation, toasts, logging); nothing in the
//! engine waits on them.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::OUTBOX_CAPACITY;

/// Which ladder gained a level
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelTarget {
    /// Global player level
    Player,
    /// A character stat, by id
    Stat(String),
    /// A skill-tree node, by id
    TreeSkill(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressionEvent {
    /// One or more levels gained in a single XP application
    LevelUp {
        target: LevelTarget,
        previous: u32,
        new: u32,
    },
    /// A skill filled its bar and became mastered (fires once per skill)
    SkillMastered { skill_id: String, skill_name: String },
}

impl ProgressionEvent {
    pub fn is_level_up(&self) -> bool {
        matches!(self, Self::LevelUp { .. })
    }

    pub fn is_mastery(&self) -> bool {
        matches!(self, Self::SkillMastered { .. })
    }
}

/// Queue of events awaiting delivery to observers.
///
/// Callers that hold a store without the plugin must drain it themselves.
/// Past [`OUTBOX_CAPACITY`] the oldest undelivered event is dropped.
#[derive(Debug, Default, Clone)]
pub struct EventOutbox {
    pending: VecDeque<ProgressionEvent>,
    dropped: u64,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and log it
    pub fn push(&mut self, event: ProgressionEvent) {
        match &event {
            ProgressionEvent::LevelUp {
                target,
                previous,
                new,
            } => {
                info!(target: "system_core", ladder = ?target, previous, new, "level up");
            }
            ProgressionEvent::SkillMastered {
                skill_id,
                skill_name,
            } => {
                info!(target: "system_core", skill_id = %skill_id, skill_name = %skill_name, "skill mastered");
            }
        }
        if self.pending.len() == OUTBOX_CAPACITY {
            self.pending.pop_front();
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                warn!(dropped = self.dropped, "progression events are not being drained");
            }
        }
        self.pending.push_back(event);
    }

    /// Take every pending event, oldest first
    pub fn drain(&mut self) -> Vec<ProgressionEvent> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Events discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
