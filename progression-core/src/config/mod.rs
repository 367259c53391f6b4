//! Engine configuration
//!
//! Curves, storage location, RNG seeds and tracing setup. Files may be RON
//! or JSON, chosen by extension; anything else is parsed as RON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::DEFAULT_SKILL_REQUIRED_XP;
use crate::curve::RequirementCurve;
use crate::logging::TracingConfig;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} curve base must be positive")]
    ZeroCurveBase { name: &'static str },
    #[error("{name} curve growth must be greater than 1.0, got {growth}")]
    FlatCurve { name: &'static str, growth: f64 },
    #[error("default skill requiredXP must be positive")]
    ZeroSkillRequirement,
    #[error("storage data_dir is empty")]
    EmptyDataDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `<key>.json` file per blob
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub player_curve: RequirementCurve,
    pub stat_curve: RequirementCurve,
    pub default_skill_required_xp: u64,
    pub storage: StorageConfig,
    /// Seed for skill-tree ids and layout jitter
    pub layout_seed: u64,
    /// Seed for generated track-log history
    pub sample_seed: u64,
    pub tracing: TracingConfig,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            player_curve: RequirementCurve::PLAYER,
            stat_curve: RequirementCurve::STAT,
            default_skill_required_xp: DEFAULT_SKILL_REQUIRED_XP,
            storage: StorageConfig::default(),
            layout_seed: 42,
            sample_seed: 7,
            tracing: TracingConfig::default(),
        }
    }
}

impl ProgressionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, curve) in [("player", &self.player_curve), ("stat", &self.stat_curve)] {
            if curve.base == 0 {
                return Err(ConfigError::ZeroCurveBase { name });
            }
            if curve.growth.is_nan() || curve.growth <= 1.0 {
                return Err(ConfigError::FlatCurve {
                    name,
                    growth: curve.growth,
                });
            }
        }
        if self.default_skill_required_xp == 0 {
            return Err(ConfigError::ZeroSkillRequirement);
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        Ok(())
    }

    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).context("Failed to parse RON config")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse JSON config")
    }

    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("Failed to serialize config")
    }
}

/// Read, parse and validate a config file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ProgressionConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ProgressionConfig::from_json(&text),
        _ => ProgressionConfig::from_ron(&text),
    }
    .with_context(|| format!("Invalid config {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Rejected config {}", path.display()))?;
    info!("Config loaded from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = ProgressionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.player_curve.required_xp(1), 10_000);
        assert_eq!(config.stat_curve.required_xp(1), 100);
    }

    #[test]
    fn test_validate_rejects_bad_curves() {
        let mut config = ProgressionConfig::default();
        config.stat_curve.growth = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FlatCurve { name: "stat", .. })
        ));

        let mut config = ProgressionConfig::default();
        config.player_curve.base = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCurveBase { name: "player" })
        );

        let mut config = ProgressionConfig::default();
        config.player_curve.growth = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_skill_bar() {
        let config = ProgressionConfig {
            default_skill_required_xp: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroSkillRequirement));
    }

    #[test]
    fn test_ron_roundtrip() {
        let config = ProgressionConfig {
            layout_seed: 1234,
            ..Default::default()
        };
        let text = config.to_ron().unwrap();
        assert_eq!(ProgressionConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            ProgressionConfig::from_json(r#"{"stat_curve":{"base":50,"growth":1.2}}"#).unwrap();
        assert_eq!(config.stat_curve.base, 50);
        assert_eq!(config.player_curve, RequirementCurve::PLAYER);
        assert_eq!(config.layout_seed, 42);
    }

    #[test]
    fn test_load_config_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("progression.json");
        let mut file = fs::File::create(&json_path).unwrap();
        write!(file, r#"{{"layout_seed": 9}}"#).unwrap();
        assert_eq!(load_config(&json_path).unwrap().layout_seed, 9);

        let ron_path = dir.path().join("progression.ron");
        fs::write(&ron_path, "(sample_seed: 3, storage: (data_dir: \"saves\"))").unwrap();
        let config = load_config(&ron_path).unwrap();
        assert_eq!(config.sample_seed, 3);
        assert_eq!(config.storage.data_dir, PathBuf::from("saves"));
    }

    #[test]
    fn test_load_config_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.ron");
        let err = load_config(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("missing.ron"));

        let invalid = dir.path().join("bad.json");
        fs::write(&invalid, r#"{"player_curve":{"base":0,"growth":1.1}}"#).unwrap();
        let err = load_config(&invalid).unwrap_err();
        assert!(format!("{err:#}").contains("base must be positive"));
    }
}
