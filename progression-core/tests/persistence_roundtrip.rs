//! Persistence round trips against the file backend
//!
//! Every store writes its full state after each mutation, so reopening over
//! the same directory must reproduce exactly what was there before.

use chrono::NaiveDate;
use tempfile::TempDir;

use system_core::constants::{SETTINGS_KEY, SKILL_TREE_KEY, STATUS_KEY, TRACK_LOG_KEY};
use system_core::settings::{CardDesign, SettingsStore};
use system_core::skill_tree::{NewTreeSkill, SkillTreeStore};
use system_core::status::IdentityUpdate;
use system_core::storage::{FileStore, KeyValueStore};
use system_core::store::NewSkill;
use system_core::track_log::{DayRecord, DayStatus, QuestTally, TrackLogStore};
use system_core::{ProgressionConfig, ProgressionResource, ProgressionStore, Reward};

fn files(dir: &TempDir) -> Box<dyn KeyValueStore> {
    Box::new(FileStore::open(dir.path()).unwrap())
}

#[test]
fn test_status_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProgressionConfig::default();

    let (snapshot, skill_id) = {
        let mut store = ProgressionStore::open(files(&dir), &config).unwrap();
        store.add_level_xp(25_000).unwrap();
        store.add_stat_xp("agi", 300).unwrap();
        store
            .update_identity(IdentityUpdate {
                name: Some("Sung".into()),
                title: Some("The Persistent".into()),
                ..Default::default()
            })
            .unwrap();
        let skill_id = store
            .add_skill(NewSkill {
                name: "Calligraphy".into(),
                required_xp: Some(40),
                ..Default::default()
            })
            .unwrap();
        store.add_skill_xp(&skill_id, 45).unwrap();
        (store.status().clone(), skill_id)
    };

    let reopened = ProgressionStore::open(files(&dir), &config).unwrap();
    assert_eq!(reopened.status(), &snapshot);
    assert_eq!(reopened.status().level.current, 3);
    assert!(reopened.status().skill(&skill_id).unwrap().is_mastered());
    assert_eq!(reopened.mastered_preview(3)[0].id, skill_id);
}

#[test]
fn test_status_file_is_versioned_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ProgressionStore::open(files(&dir), &ProgressionConfig::default()).unwrap();
    store.award(&Reward::level(50).with_stat("vit", 10)).unwrap();

    let raw = std::fs::read_to_string(dir.path().join(format!("{STATUS_KEY}.json"))).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["version"], 2);
    assert_eq!(json["level"]["currentXP"], 50);
    assert_eq!(json["stats"][3]["id"], "vit");
    assert_eq!(json["stats"][3]["currentXP"], 10);
}

#[test]
fn test_skill_tree_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProgressionConfig::default();

    let (skills, new_id) = {
        let mut tree = SkillTreeStore::open(files(&dir), &config).unwrap();
        let id = tree
            .add_skill(NewTreeSkill {
                name: "Meditation".into(),
                parent_id: Some("focus".into()),
                ..Default::default()
            })
            .unwrap();
        tree.add_xp(&id, 150).unwrap();
        tree.delete_skill("vitality").unwrap();
        (tree.skills().to_vec(), id)
    };

    let tree = SkillTreeStore::open(files(&dir), &config).unwrap();
    assert_eq!(tree.skills().len(), skills.len());
    for (loaded, saved) in tree.skills().iter().zip(&skills) {
        assert_eq!(loaded.id, saved.id);
        assert_eq!(loaded.parent_id, saved.parent_id);
        assert_eq!((loaded.level, loaded.current_xp), (saved.level, saved.current_xp));
        assert!(loaded.position.distance_to(&saved.position) < 1e-9);
    }
    assert!(tree.get("vitality").is_none());
    let node = tree.get(&new_id).unwrap();
    assert_eq!(node.level, 1);
    assert_eq!(node.current_xp, 50);
    assert_eq!(tree.children("focus").len(), 1);
}

#[test]
fn test_track_log_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProgressionConfig::default();
    let today = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();

    {
        let mut log = TrackLogStore::open_at(files(&dir), &config, today).unwrap();
        let mut record = DayRecord::new(today);
        record.quests.core = QuestTally::new(3, 3);
        record.quests.optional = QuestTally::new(2, 2);
        record.total_xp = record.quest_xp();
        log.upsert_record(record).unwrap();
    }

    // A later "today" must not regenerate history over stored records
    let later = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
    let log = TrackLogStore::open_at(files(&dir), &config, later).unwrap();
    assert_eq!(log.records().len(), 61);
    assert_eq!(log.day_status(today), DayStatus::Green);
    assert_eq!(log.record(today).unwrap().total_xp, 200);
    assert_eq!(log.day_completion_rate(today), 100);
}

#[test]
fn test_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut settings = SettingsStore::open(files(&dir)).unwrap();
        settings.toggle_high_performance_mode().unwrap();
        settings.set_optional_quests_per_day(0).unwrap();
        settings.set_card_design(CardDesign::DesignB).unwrap();
    }
    let settings = SettingsStore::open(files(&dir)).unwrap();
    assert!(!settings.settings().high_performance_mode);
    assert_eq!(settings.settings().optional_quests_per_day, 0);
    assert_eq!(settings.settings().card_design, CardDesign::DesignB);
}

#[test]
fn test_resource_writes_one_file_per_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProgressionConfig {
        storage: system_core::config::StorageConfig {
            data_dir: dir.path().to_path_buf(),
        },
        ..Default::default()
    };
    let mut resource = ProgressionResource::open_files(&config).unwrap();
    resource.status.add_level_xp(1).unwrap();
    resource.skill_tree.add_xp("root", 1).unwrap();
    resource.settings.toggle_system_status().unwrap();

    let keys = FileStore::open(dir.path()).unwrap().keys().unwrap();
    let mut expected = vec![
        SETTINGS_KEY.to_string(),
        SKILL_TREE_KEY.to_string(),
        STATUS_KEY.to_string(),
        TRACK_LOG_KEY.to_string(),
    ];
    expected.sort();
    assert_eq!(keys, expected);
}
