//! Skill Mastery Transition
//!
//! Unlike levels and stats, a status skill has exactly one XP bar:
//! - Progress is applied until the bar fills
//! - Filling the bar flips the skill to `Mastered`, clamps XP to the
//!   threshold and stamps `mastered_at`
//! - Excess XP is discarded (no rollover)
//! - Mastered skills ignore all further XP
//!
//! While progressive, a cosmetic stage (learning / practicing / refining) is
//! derived from the fill ratio.

use serde::{Deserialize, Serialize};

use crate::events::ProgressionEvent;

/// Progress category of a status skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Progressive,
    Mastered,
}

/// Display-only sub-state of a progressive skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStage {
    Learning,   // < 1/3
    Practicing, // < 2/3
    Refining,   // >= 2/3
}

impl SkillStage {
    /// Classify a fill ratio into a stage.
    ///
    /// Bands are exclusive at their upper edge: exactly 1/3 is `Practicing`,
    /// exactly 2/3 is `Refining`. Integer arithmetic keeps the tie-break exact.
    pub fn classify(current_xp: u64, required_xp: u64) -> Self {
        let scaled = u128::from(current_xp) * 3;
        let required = u128::from(required_xp);
        if scaled < required {
            Self::Learning
        } else if scaled < required * 2 {
            Self::Practicing
        } else {
            Self::Refining
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::Practicing => "practicing",
            Self::Refining => "refining",
        }
    }
}

/// A real-life skill tracked on the status card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: SkillCategory,
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    #[serde(rename = "requiredXP")]
    pub required_xp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<SkillStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_stat: Option<String>,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    /// Milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastered_at: Option<i64>,
}

fn default_visible() -> bool {
    true
}

impl Skill {
    /// New progressive skill with an empty bar
    pub fn new(id: impl Into<String>, name: impl Into<String>, required_xp: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            category: SkillCategory::Progressive,
            current_xp: 0,
            required_xp: required_xp.max(1),
            stage: Some(SkillStage::Learning),
            linked_stat: None,
            is_visible: true,
            mastered_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_linked_stat(mut self, stat_id: impl Into<String>) -> Self {
        self.linked_stat = Some(stat_id.into());
        self
    }

    pub fn is_mastered(&self) -> bool {
        self.category == SkillCategory::Mastered
    }

    /// Bar fill as a whole percentage (0 - 100, floored)
    pub fn progress_percent(&self) -> u8 {
        if self.required_xp == 0 {
            return 0;
        }
        let pct = u128::from(self.current_xp) * 100 / u128::from(self.required_xp);
        pct.min(100) as u8
    }

    /// Fill ratio (0.0 - 1.0) used for ordering previews
    pub fn completion_ratio(&self) -> f64 {
        if self.required_xp == 0 {
            return 0.0;
        }
        (self.current_xp as f64 / self.required_xp as f64).min(1.0)
    }
}

/// Result of applying XP to a skill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillGain {
    pub skill: Skill,
    /// Set only on the call that performed the mastery transition
    pub mastered: Option<ProgressionEvent>,
}

/// Apply XP to a skill's single bar. `now_ms` stamps the mastery instant.
pub fn apply_skill_xp(skill: &Skill, amount: u64, now_ms: i64) -> SkillGain {
    if skill.is_mastered() {
        return SkillGain {
            skill: skill.clone(),
            mastered: None,
        };
    }

    let mut next = skill.clone();
    let total = skill.current_xp.saturating_add(amount);

    if total >= skill.required_xp {
        next.current_xp = skill.required_xp;
        next.category = SkillCategory::Mastered;
        next.mastered_at = Some(now_ms);
        next.stage = None;
        let event = ProgressionEvent::SkillMastered {
            skill_id: next.id.clone(),
            skill_name: next.name.clone(),
        };
        return SkillGain {
            skill: next,
            mastered: Some(event),
        };
    }

    next.current_xp = total;
    next.stage = Some(SkillStage::classify(total, skill.required_xp));
    SkillGain {
        skill: next,
        mastered: None,
    }
}
