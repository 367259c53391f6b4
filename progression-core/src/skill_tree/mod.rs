//! Skill Tree
//!
//! Free-form tree of skills hanging off a protected root ("Core"). Unlike the
//! status skills, tree nodes climb a short ladder of fixed-size bars
//! (level 0 to [`TREE_MAX_LEVEL`]); reaching the top counts as mastery.
//!
//! Node positions are only cosmetic but persisted, so new children are placed
//! with a radial layout around their parent using a seeded RNG.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProgressionConfig;
use crate::constants::{
    LAYOUT_BASE_DISTANCE, LAYOUT_DISTANCE_JITTER, LAYOUT_MIN_SLOTS, SKILL_TREE_KEY,
    TREE_MAX_LEVEL, TREE_REQUIRED_XP, TREE_ROOT_ID,
};
use crate::events::{EventOutbox, LevelTarget, ProgressionEvent};
use crate::helpers::generate_id;
use crate::logging::OpTimer;
use crate::migration::{load_or_default, stamp_version, SKILL_TREE_SCHEMA};
use crate::storage::KeyValueStore;
use crate::store::ProgressionError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Canvas position relative to the root
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub level: u32,
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    #[serde(rename = "requiredXP")]
    pub required_xp: u64,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub linked_quests: Vec<String>,
    #[serde(default)]
    pub position: Position,
    /// `None` only for the root
    pub parent_id: Option<String>,
}

impl TreeSkill {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_mastered(&self) -> bool {
        self.level >= TREE_MAX_LEVEL
    }
}

/// Result of [`apply_tree_xp`]
#[derive(Debug, Clone, PartialEq)]
pub struct TreeXpGain {
    pub skill: TreeSkill,
    pub events: Vec<ProgressionEvent>,
}

/// Pure tree-node XP application.
///
/// Bars roll over while below the cap; once the cap is reached the bar is
/// pinned full and further XP is ignored.
pub fn apply_tree_xp(skill: &TreeSkill, amount: u64) -> TreeXpGain {
    let mut next = skill.clone();
    if skill.is_mastered() {
        return TreeXpGain {
            skill: next,
            events: Vec::new(),
        };
    }

    let bar = next.required_xp.max(1);
    next.current_xp = next.current_xp.saturating_add(amount);
    while next.current_xp >= bar && next.level < TREE_MAX_LEVEL {
        next.current_xp -= bar;
        next.level += 1;
    }
    if next.level >= TREE_MAX_LEVEL {
        next.current_xp = next.required_xp;
    }

    let mut events = Vec::new();
    if next.level > skill.level {
        events.push(ProgressionEvent::LevelUp {
            target: LevelTarget::TreeSkill(next.id.clone()),
            previous: skill.level,
            new: next.level,
        });
        if next.is_mastered() {
            events.push(ProgressionEvent::SkillMastered {
                skill_id: next.id.clone(),
                skill_name: next.name.clone(),
            });
        }
    }
    TreeXpGain { skill: next, events }
}

/// Position of the next child of `parent`, which already has `sibling_count`
/// children. Children fan out clockwise from straight up.
pub fn child_position<R: Rng + ?Sized>(parent: Position, sibling_count: usize, rng: &mut R) -> Position {
    let slots = (sibling_count + 1).max(LAYOUT_MIN_SLOTS) as f64;
    let angle = -PI / 2.0 + sibling_count as f64 * (2.0 * PI / slots);
    let distance = LAYOUT_BASE_DISTANCE + rng.gen::<f64>() * LAYOUT_DISTANCE_JITTER;
    Position {
        x: parent.x + angle.cos() * distance,
        y: parent.y + angle.sin() * distance,
    }
}

/// Persisted blob body (the `version` field is added on write)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTreeState {
    pub skills: Vec<TreeSkill>,
}

impl Default for SkillTreeState {
    fn default() -> Self {
        Self {
            skills: default_tree(),
        }
    }
}

impl SkillTreeState {
    /// Structural check for loaded blobs: unique ids, a single parentless
    /// node which is the root, and a parent chain from every node that ends
    /// there.
    pub fn check_links(&self) -> Result<(), String> {
        let mut parents: HashMap<&str, Option<&str>> = HashMap::with_capacity(self.skills.len());
        for skill in &self.skills {
            if parents.insert(&skill.id, skill.parent_id.as_deref()).is_some() {
                return Err(format!("duplicate skill id {:?}", skill.id));
            }
        }
        match parents.get(TREE_ROOT_ID) {
            Some(None) => {}
            Some(Some(_)) => return Err("root skill has a parent".to_string()),
            None => return Err("root skill missing".to_string()),
        }

        for skill in &self.skills {
            let mut cursor = skill.parent_id.as_deref();
            let mut steps = 0;
            while let Some(parent) = cursor {
                steps += 1;
                if steps > self.skills.len() {
                    return Err(format!("parent cycle through {:?}", skill.id));
                }
                cursor = match parents.get(parent) {
                    Some(next) => *next,
                    None => return Err(format!("{:?} has unknown parent {:?}", skill.id, parent)),
                };
            }
            if skill.parent_id.is_none() && skill.id != TREE_ROOT_ID {
                return Err(format!("{:?} has no parent", skill.id));
            }
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn seed_node(
    id: &str,
    name: &str,
    description: &str,
    difficulty: Difficulty,
    level: u32,
    current_xp: u64,
    icon: &str,
    tags: &[&str],
    position: (f64, f64),
    parent_id: Option<&str>,
) -> TreeSkill {
    TreeSkill {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        difficulty,
        level,
        current_xp,
        required_xp: TREE_REQUIRED_XP,
        icon: icon.into(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        linked_quests: Vec::new(),
        position: Position {
            x: position.0,
            y: position.1,
        },
        parent_id: parent_id.map(String::from),
    }
}

/// First-load tree
#[rustfmt::skip]
pub fn default_tree() -> Vec<TreeSkill> {
    use Difficulty::*;
    let root = Some(TREE_ROOT_ID);
    vec![
        seed_node(TREE_ROOT_ID, "Core", "The source of all power. Your journey begins here.",
            Medium, 5, 50, "⚡", &["foundation"], (0.0, 0.0), None),
        seed_node("strength", "Strength", "Physical power and endurance.",
            Medium, 3, 75, "💪", &["physical"], (-160.0, -140.0), root),
        seed_node("focus", "Focus", "Mental clarity and concentration.",
            Hard, 2, 30, "🎯", &["mental"], (160.0, -140.0), root),
        seed_node("discipline", "Discipline", "Consistency and self-control.",
            Hard, 10, 100, "🔥", &["mental", "foundation"], (0.0, -200.0), root),
        seed_node("vitality", "Vitality", "Health and wellness awareness.",
            Easy, 4, 60, "❤️", &["physical"], (-180.0, 100.0), root),
        seed_node("wisdom", "Wisdom", "Knowledge and understanding.",
            Medium, 1, 20, "📚", &["mental"], (180.0, 100.0), root),
    ]
}

/// Input for [`SkillTreeStore::add_skill`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTreeSkill {
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub icon: String,
    pub tags: Vec<String>,
    pub linked_quests: Vec<String>,
    /// Defaults to the root
    pub parent_id: Option<String>,
}

/// Partial edit; progress fields only move through XP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSkillUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub icon: Option<String>,
    pub tags: Option<Vec<String>>,
    pub linked_quests: Option<Vec<String>>,
    pub position: Option<Position>,
}

pub struct SkillTreeStore {
    backend: Box<dyn KeyValueStore>,
    state: SkillTreeState,
    rng: Xoshiro256PlusPlus,
    outbox: EventOutbox,
}

impl SkillTreeStore {
    pub fn open(backend: Box<dyn KeyValueStore>, config: &ProgressionConfig) -> Result<Self, ProgressionError> {
        let _timer = OpTimer::start("skill_tree", "open");
        let raw = backend.get(SKILL_TREE_KEY)?;
        let mut state: SkillTreeState =
            load_or_default(&SKILL_TREE_SCHEMA, raw.as_deref(), SkillTreeState::default);
        if let Err(reason) = state.check_links() {
            warn!("discarding stored skill tree: {}", reason);
            state = SkillTreeState::default();
        }
        info!(nodes = state.skills.len(), "Skill tree loaded");
        Ok(Self {
            backend,
            state,
            rng: Xoshiro256PlusPlus::seed_from_u64(config.layout_seed),
            outbox: EventOutbox::new(),
        })
    }

    pub fn skills(&self) -> &[TreeSkill] {
        &self.state.skills
    }

    pub fn get(&self, id: &str) -> Option<&TreeSkill> {
        self.state.skills.iter().find(|s| s.id == id)
    }

    pub fn root(&self) -> Option<&TreeSkill> {
        self.get(TREE_ROOT_ID)
    }

    /// Direct children of `id`, in insertion order
    pub fn children(&self, id: &str) -> Vec<&TreeSkill> {
        self.state
            .skills
            .iter()
            .filter(|s| s.parent_id.as_deref() == Some(id))
            .collect()
    }

    pub fn mastered_count(&self) -> usize {
        self.state.skills.iter().filter(|s| s.is_mastered()).count()
    }

    pub fn drain_events(&mut self) -> Vec<ProgressionEvent> {
        self.outbox.drain()
    }

    pub fn add_skill(&mut self, new_skill: NewTreeSkill) -> Result<String, ProgressionError> {
        let parent_id = new_skill
            .parent_id
            .unwrap_or_else(|| TREE_ROOT_ID.to_string());
        let parent_position = self
            .get(&parent_id)
            .map(|p| p.position)
            .ok_or_else(|| ProgressionError::SkillNotFound(parent_id.clone()))?;

        let sibling_count = self.children(&parent_id).len();
        let position = child_position(parent_position, sibling_count, &mut self.rng);
        let id = loop {
            let candidate = generate_id(&mut self.rng);
            if self.get(&candidate).is_none() {
                break candidate;
            }
        };

        let mut next = self.state.clone();
        next.skills.push(TreeSkill {
            id: id.clone(),
            name: new_skill.name,
            description: new_skill.description,
            difficulty: new_skill.difficulty,
            level: 0,
            current_xp: 0,
            required_xp: TREE_REQUIRED_XP,
            icon: new_skill.icon,
            tags: new_skill.tags,
            linked_quests: new_skill.linked_quests,
            position,
            parent_id: Some(parent_id.clone()),
        });
        self.commit(next, Vec::new())?;
        debug!(skill_id = %id, parent = %parent_id, "tree skill added");
        Ok(id)
    }

    pub fn update_skill(&mut self, id: &str, update: TreeSkillUpdate) -> Result<TreeSkill, ProgressionError> {
        let index = self.index_of(id)?;
        let mut next = self.state.clone();
        let skill = &mut next.skills[index];

        if let Some(name) = update.name {
            skill.name = name;
        }
        if let Some(description) = update.description {
            skill.description = description;
        }
        if let Some(difficulty) = update.difficulty {
            skill.difficulty = difficulty;
        }
        if let Some(icon) = update.icon {
            skill.icon = icon;
        }
        if let Some(tags) = update.tags {
            skill.tags = tags;
        }
        if let Some(linked_quests) = update.linked_quests {
            skill.linked_quests = linked_quests;
        }
        if let Some(position) = update.position {
            skill.position = position;
        }
        let updated = skill.clone();
        self.commit(next, Vec::new())?;
        Ok(updated)
    }

    /// Delete a node and its whole subtree. Returns the removed ids, the
    /// requested node first.
    pub fn delete_skill(&mut self, id: &str) -> Result<Vec<String>, ProgressionError> {
        if id == TREE_ROOT_ID {
            return Err(ProgressionError::RootSkillProtected);
        }
        self.index_of(id)?;

        let removed = self.subtree(id);
        let doomed: HashSet<&str> = removed.iter().map(String::as_str).collect();
        let mut next = self.state.clone();
        next.skills.retain(|s| !doomed.contains(s.id.as_str()));

        self.commit(next, Vec::new())?;
        debug!(skill_id = %id, removed = removed.len(), "tree skill deleted");
        Ok(removed)
    }

    /// Apply XP to one node. Mastered nodes are returned unchanged and
    /// nothing is written.
    pub fn add_xp(&mut self, id: &str, amount: u64) -> Result<TreeSkill, ProgressionError> {
        let index = self.index_of(id)?;
        let gain = apply_tree_xp(&self.state.skills[index], amount);
        if gain.skill == self.state.skills[index] {
            return Ok(gain.skill);
        }
        let mut next = self.state.clone();
        next.skills[index] = gain.skill.clone();
        self.commit(next, gain.events)?;
        Ok(gain.skill)
    }

    fn index_of(&self, id: &str) -> Result<usize, ProgressionError> {
        self.state
            .skills
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ProgressionError::SkillNotFound(id.to_string()))
    }

    /// `id` followed by all of its descendants, breadth first. Each node is
    /// visited once even if the parent links loop.
    fn subtree<'a>(&'a self, id: &'a str) -> Vec<String> {
        let mut seen: HashSet<&'a str> = HashSet::from([id]);
        let mut ids = vec![id.to_string()];
        let mut cursor = 0;
        while cursor < ids.len() {
            let parent = ids[cursor].clone();
            for child in self.children(&parent) {
                if seen.insert(child.id.as_str()) {
                    ids.push(child.id.clone());
                }
            }
            cursor += 1;
        }
        ids
    }

    /// Write `next`, then make it current and queue `events`. A failed
    /// write changes nothing.
    fn commit(&mut self, next: SkillTreeState, events: Vec<ProgressionEvent>) -> Result<(), ProgressionError> {
        let _timer = OpTimer::start("skill_tree", "persist");
        let blob = stamp_version(&SKILL_TREE_SCHEMA, &next)?;
        self.backend.set(SKILL_TREE_KEY, &blob)?;
        self.state = next;
        for event in events {
            self.outbox.push(event);
        }
        Ok(())
    }
}
