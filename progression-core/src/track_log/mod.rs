//! Track Log
//!
//! Daily history of quest and habit completion, keyed by calendar date.
//! Drives the calendar colouring, completion graphs and per-day quest lists.
//!
//! The blob is a plain `date -> DayRecord` map without a version field. A
//! missing or unreadable blob is replaced with generated sample history so
//! the views have something to show on first launch.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Local, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ProgressionConfig;
use crate::constants::{
    CORE_QUEST_XP, OPTIONAL_QUEST_XP, SAMPLE_HISTORY_DAYS, SPECIAL_QUEST_XP, TRACK_LOG_KEY,
};
use crate::logging::OpTimer;
use crate::storage::KeyValueStore;
use crate::store::ProgressionError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestTally {
    pub total: u32,
    pub completed: u32,
}

impl QuestTally {
    pub fn new(total: u32, completed: u32) -> Self {
        Self {
            total,
            completed: completed.min(total),
        }
    }

    /// Exact match only: a stored tally claiming more completions than
    /// quests does not count as done.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestTallies {
    pub core: QuestTally,
    pub optional: QuestTally,
    pub special: QuestTally,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecord {
    pub id: String,
    pub name: String,
    pub done: bool,
    /// +1 if the streak was kept, -1 if broken
    pub streak_impact: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillXpEntry {
    pub skill_id: String,
    pub skill_name: String,
    pub xp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: NaiveDate,
    pub quests: QuestTallies,
    #[serde(default)]
    pub habits: Vec<HabitRecord>,
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    #[serde(default)]
    pub inventory_bonus_applied: bool,
    #[serde(rename = "linkedSkillXP", default)]
    pub linked_skill_xp: Vec<SkillXpEntry>,
}

impl DayRecord {
    /// Empty record for `date`
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            quests: QuestTallies::default(),
            habits: Vec::new(),
            total_xp: 0,
            inventory_bonus_applied: false,
            linked_skill_xp: Vec::new(),
        }
    }

    /// XP implied by the completed quest counts
    pub fn quest_xp(&self) -> u64 {
        self.quests.core.completed as u64 * CORE_QUEST_XP
            + self.quests.optional.completed as u64 * OPTIONAL_QUEST_XP
            + self.quests.special.completed as u64 * SPECIAL_QUEST_XP
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestCategory {
    Core,
    Optional,
    Special,
}

impl QuestCategory {
    pub fn xp(&self) -> u64 {
        match self {
            QuestCategory::Core => CORE_QUEST_XP,
            QuestCategory::Optional => OPTIONAL_QUEST_XP,
            QuestCategory::Special => SPECIAL_QUEST_XP,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            QuestCategory::Core => "core",
            QuestCategory::Optional => "optional",
            QuestCategory::Special => "special",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            QuestCategory::Core => "Core",
            QuestCategory::Optional => "Optional",
            QuestCategory::Special => "Special",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestRecord {
    pub id: String,
    pub name: String,
    pub category: QuestCategory,
    pub completed: bool,
    pub xp_gained: u64,
}

/// Calendar colour of a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    /// Every core and optional quest done
    Green,
    /// Core done, some optional missed
    Yellow,
    /// Some core done
    Orange,
    /// No core done
    Red,
    /// No record, or no core quests that day
    None,
}

impl DayStatus {
    pub fn classify(record: Option<&DayRecord>) -> Self {
        let Some(record) = record else {
            return DayStatus::None;
        };
        let QuestTallies { core, optional, .. } = record.quests;

        if core.total == 0 {
            DayStatus::None
        } else if core.is_complete() {
            if optional.total == 0 || optional.is_complete() {
                DayStatus::Green
            } else {
                DayStatus::Yellow
            }
        } else if core.completed > 0 {
            DayStatus::Orange
        } else {
            DayStatus::Red
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DayStatus::Green => "ALL COMPLETE",
            DayStatus::Yellow => "CORE DONE",
            DayStatus::Orange => "PARTIAL",
            DayStatus::Red => "FAILED",
            DayStatus::None => "NO DATA",
        }
    }
}

/// Percentage rounded half up, 0 for an empty denominator
fn rounded_percent(completed: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * completed + total) / (2 * total)) as u32
}

/// Expand a day's tallies into individual quest rows
pub fn quests_for_record(record: &DayRecord) -> Vec<QuestRecord> {
    let tallies = [
        (QuestCategory::Core, record.quests.core),
        (QuestCategory::Optional, record.quests.optional),
        (QuestCategory::Special, record.quests.special),
    ];
    tallies
        .iter()
        .flat_map(|(category, tally)| {
            (0..tally.total).map(move |i| {
                let completed = i < tally.completed;
                QuestRecord {
                    id: format!("{}-{}", category.prefix(), i),
                    name: format!("{} Quest {}", category.title(), i + 1),
                    category: *category,
                    completed,
                    xp_gained: if completed { category.xp() } else { 0 },
                }
            })
        })
        .collect()
}

/// Deterministic demo history for the `days` days before `today`
pub fn generate_sample_history(today: NaiveDate, days: i64, seed: u64) -> BTreeMap<NaiveDate, DayRecord> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut records = BTreeMap::new();

    for offset in 1..=days {
        let date = today - Duration::days(offset);
        let core = QuestTally::new(3, rng.gen_range(0..4));
        let optional = QuestTally::new(2, rng.gen_range(0..3));
        let special_total = u32::from(rng.gen_bool(0.3));
        let special = QuestTally::new(special_total, u32::from(special_total > 0 && rng.gen_bool(0.5)));

        let habits = [("1", "Morning Exercise", 0.7), ("2", "Read 30 mins", 0.6), ("3", "Meditate", 0.5)]
            .iter()
            .map(|(id, name, p)| HabitRecord {
                id: id.to_string(),
                name: name.to_string(),
                done: rng.gen_bool(*p),
                streak_impact: if rng.gen_bool(*p) { 1 } else { -1 },
            })
            .collect();

        let mut record = DayRecord::new(date);
        record.quests = QuestTallies {
            core,
            optional,
            special,
        };
        record.habits = habits;
        record.total_xp = record.quest_xp();
        record.inventory_bonus_applied = rng.gen_bool(0.3);
        if core.completed > 0 {
            record.linked_skill_xp.push(SkillXpEntry {
                skill_id: "1".into(),
                skill_name: "Deep Work".into(),
                xp: core.completed as u64 * 10,
            });
        }
        records.insert(date, record);
    }
    records
}

pub struct TrackLogStore {
    backend: Box<dyn KeyValueStore>,
    records: BTreeMap<NaiveDate, DayRecord>,
}

impl TrackLogStore {
    pub fn open(backend: Box<dyn KeyValueStore>, config: &ProgressionConfig) -> Result<Self, ProgressionError> {
        Self::open_at(backend, config, Local::now().date_naive())
    }

    /// Open with an explicit "today" for the sample history
    pub fn open_at(
        backend: Box<dyn KeyValueStore>,
        config: &ProgressionConfig,
        today: NaiveDate,
    ) -> Result<Self, ProgressionError> {
        let raw = backend.get(TRACK_LOG_KEY)?;
        let parsed = raw.as_deref().map(serde_json::from_str::<BTreeMap<NaiveDate, DayRecord>>);

        let store = match parsed {
            Some(Ok(records)) => {
                info!(days = records.len(), "Track log loaded");
                Self { backend, records }
            }
            other => {
                if let Some(Err(e)) = other {
                    warn!("discarding unreadable track log: {}", e);
                }
                let records = generate_sample_history(today, SAMPLE_HISTORY_DAYS, config.sample_seed);
                info!(days = records.len(), "Track log seeded with sample history");
                let mut store = Self {
                    backend,
                    records: BTreeMap::new(),
                };
                store.commit(records)?;
                store
            }
        };
        Ok(store)
    }

    pub fn records(&self) -> &BTreeMap<NaiveDate, DayRecord> {
        &self.records
    }

    pub fn record(&self, date: NaiveDate) -> Option<&DayRecord> {
        self.records.get(&date)
    }

    pub fn day_status(&self, date: NaiveDate) -> DayStatus {
        DayStatus::classify(self.record(date))
    }

    /// Records falling in the given calendar month, in date order
    pub fn month_records(&self, year: i32, month: u32) -> Vec<&DayRecord> {
        self.records
            .values()
            .filter(|r| r.date.year() == year && r.date.month() == month)
            .collect()
    }

    /// Core quest completion over a month, 0 - 100
    pub fn month_completion_rate(&self, year: i32, month: u32) -> u32 {
        let (completed, total) = self
            .month_records(year, month)
            .iter()
            .fold((0u64, 0u64), |(c, t), r| {
                (c + u64::from(r.quests.core.completed), t + u64::from(r.quests.core.total))
            });
        rounded_percent(completed, total)
    }

    /// Core + optional completion for one day, 0 - 100
    pub fn day_completion_rate(&self, date: NaiveDate) -> u32 {
        let Some(record) = self.record(date) else {
            return 0;
        };
        let q = &record.quests;
        rounded_percent(
            u64::from(q.core.completed) + u64::from(q.optional.completed),
            u64::from(q.core.total) + u64::from(q.optional.total),
        )
    }

    pub fn quests_for_day(&self, date: NaiveDate) -> Vec<QuestRecord> {
        self.record(date).map(quests_for_record).unwrap_or_default()
    }

    /// Insert or replace the record for its date
    pub fn upsert_record(&mut self, record: DayRecord) -> Result<(), ProgressionError> {
        let mut next = self.records.clone();
        next.insert(record.date, record);
        self.commit(next)
    }

    /// Write `next` and make it current; a failed write changes nothing
    fn commit(&mut self, next: BTreeMap<NaiveDate, DayRecord>) -> Result<(), ProgressionError> {
        let _timer = OpTimer::start("track_log", "persist");
        let blob = serde_json::to_string(&next)?;
        self.backend.set(TRACK_LOG_KEY, &blob)?;
        self.records = next;
        Ok(())
    }
}
