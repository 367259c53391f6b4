//! Bevy integration
//!
//! Exposes the stores as a single resource and bridges XP requests and
//! progression notifications through the app's event queues:
//!
//! ```text
//! AwardXpEvent ──▶ apply_award_requests ──▶ stores ──▶ forward_progression_events
//!                                                        ├──▶ LevelUpEvent
//!                                                        └──▶ SkillMasteredEvent
//! ```

use bevy::prelude::*;
use tracing::{error, info, warn};

use crate::config::ProgressionConfig;
use crate::events::{LevelTarget, ProgressionEvent};
use crate::logging::LoggingPlugin;
use crate::settings::SettingsStore;
use crate::skill_tree::SkillTreeStore;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::store::{ProgressionError, ProgressionStore, Reward};
use crate::track_log::TrackLogStore;

/// XP request from the UI or quest system
#[derive(Event, Debug, Clone)]
pub enum AwardXpEvent {
    /// Quest/habit reward against the status card
    Reward(Reward),
    /// XP for a skill-tree node
    TreeSkill { skill_id: String, xp: u64 },
}

#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct LevelUpEvent {
    pub target: LevelTarget,
    pub previous: u32,
    pub new: u32,
}

#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct SkillMasteredEvent {
    pub skill_id: String,
    pub skill_name: String,
}

/// Every store, sharing one storage location
#[derive(Resource)]
pub struct ProgressionResource {
    pub status: ProgressionStore,
    pub skill_tree: SkillTreeStore,
    pub track_log: TrackLogStore,
    pub settings: SettingsStore,
}

impl ProgressionResource {
    /// Open all stores, each over a backend produced by `backend`
    pub fn open<F>(backend: F, config: &ProgressionConfig) -> Result<Self, ProgressionError>
    where
        F: Fn() -> Box<dyn KeyValueStore>,
    {
        Ok(Self {
            status: ProgressionStore::open(backend(), config)?,
            skill_tree: SkillTreeStore::open(backend(), config)?,
            track_log: TrackLogStore::open(backend(), config)?,
            settings: SettingsStore::open(backend())?,
        })
    }

    /// Open over files in `config.storage.data_dir`
    pub fn open_files(config: &ProgressionConfig) -> Result<Self, ProgressionError> {
        let files = FileStore::open(&config.storage.data_dir)?;
        Self::open(|| Box::new(files.clone()), config)
    }

    pub fn in_memory(config: &ProgressionConfig) -> Result<Self, ProgressionError> {
        Self::open(|| Box::new(MemoryStore::new()), config)
    }

    /// Queued notifications from every store
    pub fn drain_events(&mut self) -> Vec<ProgressionEvent> {
        let mut events = self.status.drain_events();
        events.extend(self.skill_tree.drain_events());
        events
    }
}

#[derive(Default)]
pub struct ProgressionPlugin {
    pub config: ProgressionConfig,
}

impl Plugin for ProgressionPlugin {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<LoggingPlugin>() {
            app.add_plugins(LoggingPlugin {
                config: self.config.tracing.clone(),
            });
        }
        app.add_event::<AwardXpEvent>()
            .add_event::<LevelUpEvent>()
            .add_event::<SkillMasteredEvent>();

        let config = match self.config.validate() {
            Ok(()) => self.config.clone(),
            Err(e) => {
                error!("Invalid progression config, using defaults: {}", e);
                ProgressionConfig::default()
            }
        };

        let resource = ProgressionResource::open_files(&config).or_else(|e| {
            error!(
                "Progression storage unavailable at {:?}, keeping state in memory: {}",
                config.storage.data_dir, e
            );
            ProgressionResource::in_memory(&config)
        });

        match resource {
            Ok(resource) => {
                info!(
                    level = resource.status.status().level.current,
                    "Progression plugin ready"
                );
                app.insert_resource(resource).add_systems(
                    Update,
                    (apply_award_requests, forward_progression_events).chain(),
                );
            }
            Err(e) => error!("Progression stores could not be opened: {}", e),
        }
    }
}

fn apply_award_requests(
    mut requests: EventReader<AwardXpEvent>,
    mut progression: ResMut<ProgressionResource>,
) {
    for request in requests.read() {
        let result = match request {
            AwardXpEvent::Reward(reward) => progression.status.award(reward),
            AwardXpEvent::TreeSkill { skill_id, xp } => {
                progression.skill_tree.add_xp(skill_id, *xp).map(|_| ())
            }
        };
        if let Err(e) = result {
            warn!("XP request rejected: {}", e);
        }
    }
}

fn forward_progression_events(
    mut progression: ResMut<ProgressionResource>,
    mut level_ups: EventWriter<LevelUpEvent>,
    mut masteries: EventWriter<SkillMasteredEvent>,
) {
    for event in progression.drain_events() {
        match event {
            ProgressionEvent::LevelUp {
                target,
                previous,
                new,
            } => {
                level_ups.send(LevelUpEvent {
                    target,
                    previous,
                    new,
                });
            }
            ProgressionEvent::SkillMastered {
                skill_id,
                skill_name,
            } => {
                masteries.send(SkillMasteredEvent {
                    skill_id,
                    skill_name,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn app_in(dir: &std::path::Path) -> App {
        let mut app = App::new();
        app.add_plugins(ProgressionPlugin {
            config: ProgressionConfig {
                storage: StorageConfig {
                    data_dir: dir.to_path_buf(),
                },
                ..Default::default()
            },
        });
        app
    }

    fn drain<E: Event>(app: &mut App) -> Vec<E> {
        app.world_mut().resource_mut::<Events<E>>().drain().collect()
    }

    #[test]
    fn test_plugin_inserts_resource() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        let resource = app.world().resource::<ProgressionResource>();
        assert_eq!(resource.status.status().level.current, 1);
        assert_eq!(resource.skill_tree.skills().len(), 6);
    }

    #[test]
    fn test_award_event_produces_level_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path());

        app.world_mut()
            .send_event(AwardXpEvent::Reward(Reward::level(25_000).with_stat("str", 100)));
        app.update();

        let level_ups = drain::<LevelUpEvent>(&mut app);
        assert_eq!(level_ups.len(), 2);
        assert_eq!(
            level_ups[0],
            LevelUpEvent {
                target: LevelTarget::Player,
                previous: 1,
                new: 3,
            }
        );
        assert_eq!(level_ups[1].target, LevelTarget::Stat("str".into()));

        let resource = app.world().resource::<ProgressionResource>();
        assert_eq!(resource.status.status().level.current_xp, 4_000);
    }

    #[test]
    fn test_tree_mastery_event() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path());

        app.world_mut().send_event(AwardXpEvent::TreeSkill {
            skill_id: "wisdom".into(),
            xp: 5_000,
        });
        app.update();

        let masteries = drain::<SkillMasteredEvent>(&mut app);
        assert_eq!(
            masteries,
            vec![SkillMasteredEvent {
                skill_id: "wisdom".into(),
                skill_name: "Wisdom".into(),
            }]
        );
    }

    #[test]
    fn test_rejected_award_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path());

        app.world_mut()
            .send_event(AwardXpEvent::Reward(Reward::level(100).with_skill("ghost", 5)));
        app.update();

        assert!(drain::<LevelUpEvent>(&mut app).is_empty());
        let resource = app.world().resource::<ProgressionResource>();
        assert_eq!(resource.status.status().level.current_xp, 0);
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut app = app_in(dir.path());
            app.world_mut()
                .send_event(AwardXpEvent::Reward(Reward::level(12_000)));
            app.update();
        }
        let app = app_in(dir.path());
        let resource = app.world().resource::<ProgressionResource>();
        assert_eq!(resource.status.status().level.current, 2);
        assert_eq!(resource.status.status().level.current_xp, 2_000);
    }

    #[test]
    fn test_logging_installed_once() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        assert!(app.is_plugin_added::<LoggingPlugin>());

        // A host-provided logging plugin is kept as is
        let mut app = App::new();
        app.add_plugins(LoggingPlugin::default());
        app.add_plugins(ProgressionPlugin {
            config: ProgressionConfig {
                storage: StorageConfig {
                    data_dir: dir.path().to_path_buf(),
                },
                ..Default::default()
            },
        });
        assert!(app.world().contains_resource::<ProgressionResource>());
    }
}
