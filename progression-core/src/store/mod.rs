//! Progression Store
//!
//! Canonical in-memory copy of the player status. All mutation goes through
//! the operations below, which run the pure accumulator / mastery functions,
//! replace the affected entity, queue notifications and write the full
//! snapshot back to the storage backend.
//!
//! Unknown stat or skill ids are rejected with a not-found error and leave
//! the state untouched.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProgressionConfig;
use crate::constants::STATUS_KEY;
use crate::curve::RequirementCurve;
use crate::events::{EventOutbox, LevelTarget, ProgressionEvent};
use crate::helpers::{generate_id, now_millis};
use crate::leveling::apply_xp;
use crate::logging::OpTimer;
use crate::mastery::{apply_skill_xp, Skill};
use crate::migration::{load_or_default, stamp_version, STATUS_SCHEMA};
use crate::status::{
    mastered_preview, progressive_preview, IdentityUpdate, PlayerLevel, PlayerStatus, SkillPreview,
    Stat,
};
use crate::storage::{KeyValueStore, StorageError};

/// Errors surfaced by the stateful stores
#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    #[error("Stat not found: {0}")]
    StatNotFound(String),
    #[error("Skill not found: {0}")]
    SkillNotFound(String),
    #[error("The root skill cannot be deleted")]
    RootSkillProtected,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Input for creating a status skill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSkill {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to the configured mastery bar length
    pub required_xp: Option<u64>,
    pub linked_stat: Option<String>,
}

/// Cosmetic edits to a status skill. Progress fields only move through XP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    /// `Some(None)` unlinks the stat
    pub linked_stat: Option<Option<String>>,
    pub is_visible: Option<bool>,
}

/// XP destined for one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpGrant {
    pub id: String,
    pub xp: u64,
}

/// Reward for completing a quest or habit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub level_xp: u64,
    pub stat: Option<XpGrant>,
    pub skill: Option<XpGrant>,
}

impl Reward {
    pub fn level(xp: u64) -> Self {
        Self {
            level_xp: xp,
            ..Default::default()
        }
    }

    pub fn with_stat(mut self, id: impl Into<String>, xp: u64) -> Self {
        self.stat = Some(XpGrant { id: id.into(), xp });
        self
    }

    pub fn with_skill(mut self, id: impl Into<String>, xp: u64) -> Self {
        self.skill = Some(XpGrant { id: id.into(), xp });
        self
    }
}

pub struct ProgressionStore {
    backend: Box<dyn KeyValueStore>,
    status: PlayerStatus,
    player_curve: RequirementCurve,
    stat_curve: RequirementCurve,
    default_skill_xp: u64,
    rng: Xoshiro256PlusPlus,
    outbox: EventOutbox,
}

/// A mutation built against a copy of the status. Readers only see it once
/// the store has written it out.
struct Staged {
    status: PlayerStatus,
    events: Vec<ProgressionEvent>,
}

impl Staged {
    fn level_xp(&mut self, amount: u64, curve: &RequirementCurve) {
        let gain = apply_xp(self.status.level.progress(), amount, curve);
        self.status.level = PlayerLevel::from_progress(gain.progress);
        if let Some(up) = gain.level_up {
            self.events.push(ProgressionEvent::LevelUp {
                target: LevelTarget::Player,
                previous: up.previous,
                new: up.new,
            });
        }
    }

    fn stat_xp(&mut self, index: usize, amount: u64, curve: &RequirementCurve, now: i64) {
        let stat = &mut self.status.stats[index];
        let gain = apply_xp(stat.progress(), amount, curve);
        stat.set_progress(gain.progress);
        stat.last_updated = now;
        if let Some(up) = gain.level_up {
            self.events.push(ProgressionEvent::LevelUp {
                target: LevelTarget::Stat(stat.id.clone()),
                previous: up.previous,
                new: up.new,
            });
        }
    }

    /// Returns true if the skill changed
    fn skill_xp(&mut self, index: usize, amount: u64, now: i64) -> bool {
        let current = &self.status.skills[index];
        let gain = apply_skill_xp(current, amount, now);
        if gain.skill == *current {
            return false;
        }
        self.status.skills[index] = gain.skill;
        self.events.extend(gain.mastered);
        true
    }
}

impl ProgressionStore {
    /// Load the status blob (migrating or seeding as needed). The loaded
    /// state is written back when it differs from what was stored, so a
    /// first launch leaves the seed on disk.
    pub fn open(
        backend: Box<dyn KeyValueStore>,
        config: &ProgressionConfig,
    ) -> Result<Self, ProgressionError> {
        let _timer = OpTimer::start("status", "open");
        let raw = backend.get(STATUS_KEY)?;
        let status = load_or_default(&STATUS_SCHEMA, raw.as_deref(), || {
            PlayerStatus::seed(&config.player_curve, &config.stat_curve)
        });
        info!(
            level = status.level.current,
            stats = status.stats.len(),
            skills = status.skills.len(),
            "Progression store loaded"
        );

        let mut store = Self {
            backend,
            status,
            player_curve: config.player_curve,
            stat_curve: config.stat_curve,
            default_skill_xp: config.default_skill_required_xp,
            rng: Xoshiro256PlusPlus::from_entropy(),
            outbox: EventOutbox::new(),
        };
        let blob = stamp_version(&STATUS_SCHEMA, &store.status)?;
        if raw.as_deref() != Some(blob.as_str()) {
            debug!("writing normalized status blob");
            store.backend.set(STATUS_KEY, &blob)?;
        }
        Ok(store)
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.backend.as_ref()
    }

    /// Take every queued notification, oldest first
    pub fn drain_events(&mut self) -> Vec<ProgressionEvent> {
        self.outbox.drain()
    }

    pub fn pending_events(&self) -> usize {
        self.outbox.len()
    }

    // ========================================================================
    // Level / stat XP
    // ========================================================================

    pub fn add_level_xp(&mut self, amount: u64) -> Result<PlayerLevel, ProgressionError> {
        let mut next = self.stage();
        next.level_xp(amount, &self.player_curve);
        self.commit(next)?;
        Ok(self.status.level)
    }

    pub fn add_stat_xp(&mut self, stat_id: &str, amount: u64) -> Result<Stat, ProgressionError> {
        let index = self.stat_index(stat_id)?;
        let mut next = self.stage();
        next.stat_xp(index, amount, &self.stat_curve, now_millis());
        self.commit(next)?;
        Ok(self.status.stats[index].clone())
    }

    // ========================================================================
    // Skills
    // ========================================================================

    /// Apply XP to a skill. Mastered skills are returned unchanged and
    /// nothing is written.
    pub fn add_skill_xp(&mut self, skill_id: &str, amount: u64) -> Result<Skill, ProgressionError> {
        let index = self.skill_index(skill_id)?;
        let mut next = self.stage();
        if next.skill_xp(index, amount, now_millis()) {
            self.commit(next)?;
        }
        Ok(self.status.skills[index].clone())
    }

    /// Create a progressive skill and return its id
    pub fn add_skill(&mut self, new_skill: NewSkill) -> Result<String, ProgressionError> {
        if let Some(stat_id) = &new_skill.linked_stat {
            self.stat_index(stat_id)?;
        }

        let id = loop {
            let candidate = generate_id(&mut self.rng);
            if self.status.skill(&candidate).is_none() {
                break candidate;
            }
        };

        let mut skill = Skill::new(
            id.clone(),
            new_skill.name,
            new_skill.required_xp.unwrap_or(self.default_skill_xp),
        );
        skill.description = new_skill.description;
        skill.linked_stat = new_skill.linked_stat;

        let mut next = self.stage();
        next.status.skills.push(skill);
        self.commit(next)?;
        debug!(skill_id = %id, "skill added");
        Ok(id)
    }

    pub fn update_skill(&mut self, skill_id: &str, update: SkillUpdate) -> Result<Skill, ProgressionError> {
        let index = self.skill_index(skill_id)?;
        if let Some(Some(stat_id)) = &update.linked_stat {
            self.stat_index(stat_id)?;
        }

        let mut next = self.stage();
        let skill = &mut next.status.skills[index];
        if let Some(name) = update.name {
            skill.name = name;
        }
        if let Some(description) = update.description {
            skill.description = description;
        }
        if let Some(linked_stat) = update.linked_stat {
            skill.linked_stat = linked_stat;
        }
        if let Some(is_visible) = update.is_visible {
            skill.is_visible = is_visible;
        }
        let updated = skill.clone();
        self.commit(next)?;
        Ok(updated)
    }

    /// Remove a skill. Other entities are unaffected.
    pub fn delete_skill(&mut self, skill_id: &str) -> Result<Skill, ProgressionError> {
        let index = self.skill_index(skill_id)?;
        let mut next = self.stage();
        let removed = next.status.skills.remove(index);
        self.commit(next)?;
        debug!(skill_id = %removed.id, "skill deleted");
        Ok(removed)
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn update_name(&mut self, name: impl Into<String>) -> Result<(), ProgressionError> {
        self.update_identity(IdentityUpdate {
            name: Some(name.into()),
            ..Default::default()
        })
    }

    pub fn update_identity(&mut self, update: IdentityUpdate) -> Result<(), ProgressionError> {
        let mut next = self.stage();
        next.status.identity.apply(update);
        self.commit(next)
    }

    // ========================================================================
    // Rewards
    // ========================================================================

    /// Apply a quest/habit reward. Every id is checked before anything is
    /// applied, so a bad reward changes nothing.
    pub fn award(&mut self, reward: &Reward) -> Result<(), ProgressionError> {
        let _timer = OpTimer::start("status", "award");
        let stat_index = reward
            .stat
            .as_ref()
            .map(|grant| self.stat_index(&grant.id))
            .transpose()?;
        let skill_index = reward
            .skill
            .as_ref()
            .map(|grant| self.skill_index(&grant.id))
            .transpose()?;

        let now = now_millis();
        let mut next = self.stage();
        next.level_xp(reward.level_xp, &self.player_curve);
        if let (Some(index), Some(grant)) = (stat_index, &reward.stat) {
            next.stat_xp(index, grant.xp, &self.stat_curve, now);
        }
        if let (Some(index), Some(grant)) = (skill_index, &reward.skill) {
            next.skill_xp(index, grant.xp, now);
        }
        self.commit(next)
    }

    // ========================================================================
    // Previews
    // ========================================================================

    pub fn progressive_preview(&self, limit: usize) -> Vec<SkillPreview> {
        progressive_preview(&self.status.skills, limit)
    }

    pub fn mastered_preview(&self, limit: usize) -> Vec<SkillPreview> {
        mastered_preview(&self.status.skills, limit)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn stat_index(&self, stat_id: &str) -> Result<usize, ProgressionError> {
        self.status
            .stats
            .iter()
            .position(|s| s.id == stat_id)
            .ok_or_else(|| ProgressionError::StatNotFound(stat_id.to_string()))
    }

    fn skill_index(&self, skill_id: &str) -> Result<usize, ProgressionError> {
        self.status
            .skills
            .iter()
            .position(|s| s.id == skill_id)
            .ok_or_else(|| ProgressionError::SkillNotFound(skill_id.to_string()))
    }

    fn stage(&self) -> Staged {
        Staged {
            status: self.status.clone(),
            events: Vec::new(),
        }
    }

    /// Write the staged status, then make it current and queue its events.
    /// A failed write leaves both the state and the outbox untouched.
    fn commit(&mut self, next: Staged) -> Result<(), ProgressionError> {
        let _timer = OpTimer::start("status", "persist");
        let blob = stamp_version(&STATUS_SCHEMA, &next.status)?;
        self.backend.set(STATUS_KEY, &blob)?;
        self.status = next.status;
        for event in next.events {
            self.outbox.push(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::SkillCategory;
    use crate::storage::MemoryStore;

    fn store() -> ProgressionStore {
        ProgressionStore::open(Box::new(MemoryStore::new()), &ProgressionConfig::default()).unwrap()
    }

    fn stored_status(store: &ProgressionStore) -> serde_json::Value {
        let raw = store.backend().get(STATUS_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_open_empty_backend_writes_seed() {
        let store = store();
        assert_eq!(store.status(), &PlayerStatus::default());
        let json = stored_status(&store);
        assert_eq!(json["version"], crate::migration::CURRENT_STATUS_VERSION);
        assert_eq!(json["identity"]["name"], "PLAYER");
        assert_eq!(json["level"]["requiredXP"], 10_000);
    }

    #[test]
    fn test_open_normalizes_stored_blob() {
        let seeded = store();
        let raw = seeded.backend().get(STATUS_KEY).unwrap().unwrap();
        let pretty = serde_json::to_string_pretty(&stored_status(&seeded)).unwrap();
        assert_ne!(raw, pretty);

        // Same content, different formatting: normalized once
        let store = ProgressionStore::open(
            Box::new(MemoryStore::with_entry(STATUS_KEY, &pretty)),
            &ProgressionConfig::default(),
        )
        .unwrap();
        assert_eq!(store.backend().get(STATUS_KEY).unwrap().unwrap(), raw);

        let again = ProgressionStore::open(
            Box::new(MemoryStore::with_entry(STATUS_KEY, &raw)),
            &ProgressionConfig::default(),
        )
        .unwrap();
        assert_eq!(again.status(), store.status());
    }

    #[test]
    fn test_add_level_xp_rolls_over_and_persists() {
        let mut store = store();
        let level = store.add_level_xp(25_000).unwrap();
        assert_eq!(level.current, 3);
        assert_eq!(level.current_xp, 4_000);
        assert_eq!(level.required_xp, 12_100);

        let json = stored_status(&store);
        assert_eq!(json["level"]["current"], 3);
        assert_eq!(json["version"], crate::migration::CURRENT_STATUS_VERSION);

        let events = store.drain_events();
        assert_eq!(
            events,
            vec![ProgressionEvent::LevelUp {
                target: LevelTarget::Player,
                previous: 1,
                new: 3,
            }]
        );
    }

    #[test]
    fn test_add_stat_xp_recomputes_threshold() {
        let mut store = store();
        let stat = store.add_stat_xp("int", 250).unwrap();
        // 100 + 105 consumed, 45 left at value 3 (threshold 110)
        assert_eq!(stat.value, 3);
        assert_eq!(stat.current_xp, 45);
        assert_eq!(stat.required_xp, 110);
        assert!(stat.last_updated > 0);
        assert_eq!(store.status().stat("str").unwrap().value, 1);
    }

    #[test]
    fn test_unknown_ids_rejected_without_write() {
        let mut store = store();
        let before = store.backend().get(STATUS_KEY).unwrap();
        assert!(matches!(
            store.add_stat_xp("luck", 10),
            Err(ProgressionError::StatNotFound(id)) if id == "luck"
        ));
        assert!(matches!(
            store.add_skill_xp("nope", 10),
            Err(ProgressionError::SkillNotFound(_))
        ));
        assert!(matches!(
            store.delete_skill("nope"),
            Err(ProgressionError::SkillNotFound(_))
        ));
        assert_eq!(store.backend().get(STATUS_KEY).unwrap(), before);
        assert_eq!(store.status(), &PlayerStatus::default());
    }

    #[test]
    fn test_skill_mastery_event_fires_once() {
        let mut store = store();
        store.add_skill_xp("1", 90).unwrap();
        let skill = store.add_skill_xp("1", 50).unwrap();
        assert_eq!(skill.category, SkillCategory::Mastered);
        assert_eq!(skill.current_xp, 100);
        assert!(skill.mastered_at.is_some());

        let again = store.add_skill_xp("1", 50).unwrap();
        assert_eq!(again, skill);

        let masteries: Vec<_> = store
            .drain_events()
            .into_iter()
            .filter(ProgressionEvent::is_mastery)
            .collect();
        assert_eq!(masteries.len(), 1);
    }

    #[test]
    fn test_add_update_delete_skill() {
        let mut store = store();
        let id = store
            .add_skill(NewSkill {
                name: "Juggling".into(),
                linked_stat: Some("agi".into()),
                ..Default::default()
            })
            .unwrap();
        let skill = store.status().skill(&id).unwrap();
        assert_eq!(skill.required_xp, 100);
        assert_eq!(skill.category, SkillCategory::Progressive);

        let updated = store
            .update_skill(
                &id,
                SkillUpdate {
                    name: Some("Juggling (3 balls)".into()),
                    linked_stat: Some(None),
                    is_visible: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Juggling (3 balls)");
        assert!(updated.linked_stat.is_none());
        assert!(!updated.is_visible);

        let removed = store.delete_skill(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(store.status().skill(&id).is_none());
        assert_eq!(store.status().skills.len(), 3);
    }

    #[test]
    fn test_add_skill_rejects_unknown_stat_link() {
        let mut store = store();
        let result = store.add_skill(NewSkill {
            name: "Ghost".into(),
            linked_stat: Some("xyz".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(ProgressionError::StatNotFound(_))));
        assert_eq!(store.status().skills.len(), 3);
    }

    #[test]
    fn test_award_is_all_or_nothing() {
        let mut store = store();
        let bad = Reward::level(500).with_stat("str", 50).with_skill("missing", 10);
        assert!(store.award(&bad).is_err());
        assert_eq!(store.status().level.current_xp, 0);
        assert_eq!(store.status().stat("str").unwrap().current_xp, 0);

        let good = Reward::level(500).with_stat("str", 150).with_skill("2", 40);
        store.award(&good).unwrap();
        let status = store.status();
        assert_eq!(status.level.current_xp, 500);
        assert_eq!(status.stat("str").unwrap().value, 2);
        assert_eq!(status.skill("2").unwrap().current_xp, 40);
    }

    #[test]
    fn test_identity_updates_persist() {
        let mut store = store();
        store.update_name("NEO").unwrap();
        store
            .update_identity(IdentityUpdate {
                job: Some("Programmer".into()),
                ..Default::default()
            })
            .unwrap();
        let json = stored_status(&store);
        assert_eq!(json["identity"]["name"], "NEO");
        assert_eq!(json["identity"]["job"], "Programmer");
        assert_eq!(json["identity"]["title"], "The Beginner");
    }

    #[test]
    fn test_reopen_restores_state() {
        let mut backend = MemoryStore::new();
        {
            let mut store =
                ProgressionStore::open(Box::new(backend.clone()), &ProgressionConfig::default())
                    .unwrap();
            store.add_level_xp(12_345).unwrap();
            let raw = store.backend().get(STATUS_KEY).unwrap().unwrap();
            backend.set(STATUS_KEY, &raw).unwrap();
        }
        let store = ProgressionStore::open(Box::new(backend), &ProgressionConfig::default()).unwrap();
        assert_eq!(store.status().level.current, 2);
        assert_eq!(store.status().level.current_xp, 2_345);
    }

    #[test]
    fn test_previews() {
        let mut store = store();
        store.add_skill_xp("3", 60).unwrap();
        store.add_skill_xp("2", 100).unwrap();
        let progressive = store.progressive_preview(2);
        assert_eq!(progressive[0].id, "3");
        let mastered = store.mastered_preview(2);
        assert_eq!(mastered.len(), 1);
        assert_eq!(mastered[0].id, "2");
    }
}
