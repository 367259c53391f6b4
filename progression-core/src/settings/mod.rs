//! System settings
//!
//! Operating parameters for quest generation, penalties and presentation.
//! Changes apply forward only; nothing here rewrites history.
//!
//! The blob keeps the persisted-store envelope:
//! `{ "state": { "settings": { ... } }, "version": 0 }`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::SETTINGS_KEY;
use crate::logging::OpTimer;
use crate::storage::KeyValueStore;
use crate::store::ProgressionError;

const ENVELOPE_VERSION: u32 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyMode {
    #[default]
    Standard,
    Strict,
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTheme {
    #[default]
    Blue,
    Violet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardDesign {
    #[default]
    DesignA,
    DesignB,
    DesignC,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSettings {
    /// Master switch for quest generation, tracking and XP
    pub system_status: bool,
    pub difficulty_mode: DifficultyMode,
    /// At least 1
    pub core_quests_per_day: u32,
    pub optional_quests_per_day: u32,
    pub penalty_for_daily_quests: bool,
    /// Only meaningful while calorie tracking is enabled
    pub penalty_for_calorie_count: bool,
    pub calorie_tracking_enabled: bool,
    pub ai_quest_suggestions: bool,
    pub ai_penalty_quest_suggestions: bool,
    pub high_performance_mode: bool,
    pub color_theme: ColorTheme,
    pub card_design: CardDesign,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            system_status: true,
            difficulty_mode: DifficultyMode::Standard,
            core_quests_per_day: 3,
            optional_quests_per_day: 2,
            penalty_for_daily_quests: true,
            penalty_for_calorie_count: false,
            calorie_tracking_enabled: false,
            ai_quest_suggestions: true,
            ai_penalty_quest_suggestions: false,
            high_performance_mode: true,
            color_theme: ColorTheme::Blue,
            card_design: CardDesign::DesignA,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsState {
    settings: SystemSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    state: SettingsState,
    version: u32,
}

pub struct SettingsStore {
    backend: Box<dyn KeyValueStore>,
    settings: SystemSettings,
}

impl SettingsStore {
    pub fn open(backend: Box<dyn KeyValueStore>) -> Result<Self, ProgressionError> {
        let settings = match backend.get(SETTINGS_KEY)? {
            None => SystemSettings::default(),
            Some(raw) => match serde_json::from_str::<SettingsEnvelope>(&raw) {
                Ok(envelope) => envelope.state.settings,
                Err(e) => {
                    warn!("discarding unreadable settings: {}", e);
                    SystemSettings::default()
                }
            },
        };
        Ok(Self { backend, settings })
    }

    pub fn settings(&self) -> &SystemSettings {
        &self.settings
    }

    pub fn toggle_system_status(&mut self) -> Result<bool, ProgressionError> {
        self.toggle(|s| &mut s.system_status)
    }

    pub fn toggle_penalty_for_daily_quests(&mut self) -> Result<bool, ProgressionError> {
        self.toggle(|s| &mut s.penalty_for_daily_quests)
    }

    pub fn toggle_penalty_for_calorie_count(&mut self) -> Result<bool, ProgressionError> {
        self.toggle(|s| &mut s.penalty_for_calorie_count)
    }

    pub fn toggle_calorie_tracking(&mut self) -> Result<bool, ProgressionError> {
        self.toggle(|s| &mut s.calorie_tracking_enabled)
    }

    pub fn toggle_ai_quest_suggestions(&mut self) -> Result<bool, ProgressionError> {
        self.toggle(|s| &mut s.ai_quest_suggestions)
    }

    pub fn toggle_ai_penalty_quest_suggestions(&mut self) -> Result<bool, ProgressionError> {
        self.toggle(|s| &mut s.ai_penalty_quest_suggestions)
    }

    pub fn toggle_high_performance_mode(&mut self) -> Result<bool, ProgressionError> {
        self.toggle(|s| &mut s.high_performance_mode)
    }

    pub fn set_difficulty_mode(&mut self, mode: DifficultyMode) -> Result<(), ProgressionError> {
        self.change(|s| s.difficulty_mode = mode)
    }

    /// Clamped to at least one
    pub fn set_core_quests_per_day(&mut self, count: u32) -> Result<u32, ProgressionError> {
        let count = count.max(1);
        self.change(|s| s.core_quests_per_day = count)?;
        Ok(count)
    }

    pub fn set_optional_quests_per_day(&mut self, count: u32) -> Result<u32, ProgressionError> {
        self.change(|s| s.optional_quests_per_day = count)?;
        Ok(count)
    }

    pub fn set_color_theme(&mut self, theme: ColorTheme) -> Result<(), ProgressionError> {
        self.change(|s| s.color_theme = theme)
    }

    pub fn set_card_design(&mut self, design: CardDesign) -> Result<(), ProgressionError> {
        self.change(|s| s.card_design = design)
    }

    fn toggle<F>(&mut self, field: F) -> Result<bool, ProgressionError>
    where
        F: Fn(&mut SystemSettings) -> &mut bool,
    {
        let mut value = false;
        self.change(|s| {
            let flag = field(s);
            *flag = !*flag;
            value = *flag;
        })?;
        Ok(value)
    }

    /// Apply `edit` to a copy, write it, then keep it. A failed write leaves
    /// the current settings as they were.
    fn change<F>(&mut self, edit: F) -> Result<(), ProgressionError>
    where
        F: FnOnce(&mut SystemSettings),
    {
        let _timer = OpTimer::start("settings", "persist");
        let mut next = self.settings.clone();
        edit(&mut next);
        let envelope = SettingsEnvelope {
            state: SettingsState {
                settings: next.clone(),
            },
            version: ENVELOPE_VERSION,
        };
        let blob = serde_json::to_string(&envelope)?;
        self.backend.set(SETTINGS_KEY, &blob)?;
        self.settings = next;
        debug!("Settings saved");
        Ok(())
    }
}
