//! Player status card model
//!
//! Identity, global level, the six character stats and the status skills,
//! plus the hardcoded seed used on first load and the skill previews shown
//! on the card.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SKILL_REQUIRED_XP;
use crate::curve::RequirementCurve;
use crate::leveling::LevelProgress;
use crate::mastery::{Skill, SkillCategory, SkillStage};

/// Cosmetic identity shown on the status card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub name: String,
    pub job: String,
    pub title: String,
}

impl Default for PlayerIdentity {
    fn default() -> Self {
        Self {
            name: "PLAYER".into(),
            job: "Life Adventurer".into(),
            title: "The Beginner".into(),
        }
    }
}

/// Partial identity edit; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUpdate {
    pub name: Option<String>,
    pub job: Option<String>,
    pub title: Option<String>,
}

impl PlayerIdentity {
    pub fn apply(&mut self, update: IdentityUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(job) = update.job {
            self.job = job;
        }
        if let Some(title) = update.title {
            self.title = title;
        }
    }
}

/// Global player level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLevel {
    pub current: u32,
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    #[serde(rename = "requiredXP")]
    pub required_xp: u64,
}

impl PlayerLevel {
    pub fn new(curve: &RequirementCurve) -> Self {
        Self::from_progress(LevelProgress::start(curve))
    }

    pub fn progress(&self) -> LevelProgress {
        LevelProgress {
            level: self.current,
            current_xp: self.current_xp,
            required_xp: self.required_xp,
        }
    }

    pub fn from_progress(progress: LevelProgress) -> Self {
        Self {
            current: progress.level,
            current_xp: progress.current_xp,
            required_xp: progress.required_xp,
        }
    }
}

/// One of the fixed character stats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stat {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub icon: String,
    pub value: u32,
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    #[serde(rename = "requiredXP")]
    pub required_xp: u64,
    /// Milliseconds since the Unix epoch of the last XP application
    #[serde(default)]
    pub last_updated: i64,
}

impl Stat {
    pub fn new(id: &str, name: &str, short_name: &str, icon: &str, curve: &RequirementCurve) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            short_name: short_name.into(),
            icon: icon.into(),
            value: 1,
            current_xp: 0,
            required_xp: curve.required_xp(1),
            last_updated: 0,
        }
    }

    pub fn progress(&self) -> LevelProgress {
        LevelProgress {
            level: self.value,
            current_xp: self.current_xp,
            required_xp: self.required_xp,
        }
    }

    pub fn set_progress(&mut self, progress: LevelProgress) {
        self.value = progress.level;
        self.current_xp = progress.current_xp;
        self.required_xp = progress.required_xp;
    }
}

/// Everything shown on the status card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    #[serde(default)]
    pub identity: PlayerIdentity,
    pub level: PlayerLevel,
    pub stats: Vec<Stat>,
    #[serde(default)]
    pub skills: Vec<Skill>,
}

impl PlayerStatus {
    /// First-load seed, with thresholds taken from the given curves
    pub fn seed(player_curve: &RequirementCurve, stat_curve: &RequirementCurve) -> Self {
        let stats = [
            ("str", "Strength", "STR", "💪"),
            ("agi", "Agility", "AGI", "⚡"),
            ("int", "Intelligence", "INT", "🧠"),
            ("vit", "Vitality", "VIT", "❤️"),
            ("wis", "Wisdom", "WIS", "📖"),
            ("per", "Perception", "PER", "👁️"),
        ]
        .iter()
        .map(|(id, name, short, icon)| Stat::new(id, name, short, icon, stat_curve))
        .collect();

        let skills = vec![
            Skill::new("1", "Deep Work", DEFAULT_SKILL_REQUIRED_XP)
                .with_description("Focused, uninterrupted work sessions")
                .with_linked_stat("int"),
            Skill::new("2", "Public Speaking", DEFAULT_SKILL_REQUIRED_XP)
                .with_description("Presenting ideas clearly to groups")
                .with_linked_stat("per"),
            Skill::new("3", "Cooking", DEFAULT_SKILL_REQUIRED_XP)
                .with_description("Preparing healthy meals from scratch")
                .with_linked_stat("vit"),
        ];

        Self {
            identity: PlayerIdentity::default(),
            level: PlayerLevel::new(player_curve),
            stats,
            skills,
        }
    }

    pub fn stat(&self, id: &str) -> Option<&Stat> {
        self.stats.iter().find(|s| s.id == id)
    }

    pub fn skill(&self, id: &str) -> Option<&Skill> {
        self.skills.iter().find(|s| s.id == id)
    }

    /// Sum of all stat values
    pub fn total_stat_points(&self) -> u32 {
        self.stats.iter().map(|s| s.value).sum()
    }

    pub fn mastered_count(&self) -> usize {
        self.skills.iter().filter(|s| s.is_mastered()).count()
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self::seed(&RequirementCurve::PLAYER, &RequirementCurve::STAT)
    }
}

/// Compact skill view for the status card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillPreview {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// 0 - 100, floored
    pub progress: u8,
    pub is_mastered: bool,
    pub stage: Option<SkillStage>,
    pub linked_stat: Option<String>,
    pub current_xp: u64,
    pub required_xp: u64,
}

impl From<&Skill> for SkillPreview {
    fn from(skill: &Skill) -> Self {
        Self {
            id: skill.id.clone(),
            name: skill.name.clone(),
            description: skill.description.clone(),
            progress: skill.progress_percent(),
            is_mastered: skill.is_mastered(),
            stage: skill.stage,
            linked_stat: skill.linked_stat.clone(),
            current_xp: skill.current_xp,
            required_xp: skill.required_xp,
        }
    }
}

/// Visible progressive skills, closest to mastery first
pub fn progressive_preview(skills: &[Skill], limit: usize) -> Vec<SkillPreview> {
    let mut candidates: Vec<&Skill> = skills
        .iter()
        .filter(|s| s.category == SkillCategory::Progressive && s.is_visible)
        .collect();
    candidates.sort_by(|a, b| b.completion_ratio().total_cmp(&a.completion_ratio()));
    candidates
        .into_iter()
        .take(limit)
        .map(SkillPreview::from)
        .collect()
}

/// Visible mastered skills, most recently mastered first
pub fn mastered_preview(skills: &[Skill], limit: usize) -> Vec<SkillPreview> {
    let mut candidates: Vec<&Skill> = skills
        .iter()
        .filter(|s| s.category == SkillCategory::Mastered && s.is_visible)
        .collect();
    candidates.sort_by_key(|s| std::cmp::Reverse(s.mastered_at.unwrap_or(0)));
    candidates
        .into_iter()
        .take(limit)
        .map(SkillPreview::from)
        .collect()
}
