//! Blob Schema Migration
//!
//! Handles versioned JSON blobs with forward migration:
//! - Each persisted blob carries a `version` field
//! - Blobs without one predate versioning and count as v1
//! - Migration steps transform v(N) → v(N+1) → ... → v(current)
//! - Unknown future versions produce an error (no downgrade)
//!
//! Loading never fails: any migration or deserialization error falls back to
//! the store's default seed and is logged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::TREE_MAX_LEVEL;

/// Version assumed for blobs that carry no `version` field
pub const LEGACY_VERSION: u32 = 1;

/// Error types for migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum MigrationError {
    /// Blob version is newer than what we support (can't downgrade)
    #[error("{schema} blob version {blob_version} is newer than supported {max_supported}")]
    FutureVersion {
        schema: String,
        blob_version: u32,
        max_supported: u32,
    },
    /// JSON parsing failed or the blob is not an object
    #[error("invalid {schema} blob: {detail}")]
    InvalidFormat { schema: String, detail: String },
    /// A specific migration step failed
    #[error("{schema} migration from v{from_version} failed: {detail}")]
    MigrationStepFailed {
        schema: String,
        from_version: u32,
        detail: String,
    },
}

/// A single v(N) → v(N+1) transformation. Returns a description of the change.
pub type MigrationStep = fn(&mut Value) -> Result<String, String>;

/// Versioned layout of one persisted blob
pub struct BlobSchema {
    pub name: &'static str,
    pub current_version: u32,
    /// `steps[i]` migrates from version `LEGACY_VERSION + i`
    pub steps: &'static [MigrationStep],
}

/// Result of a migration attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    pub original_version: u32,
    pub final_version: u32,
    pub steps_applied: Vec<String>,
    pub data: Value,
}

// ============================================================================
// Schemas
// ============================================================================

pub const CURRENT_STATUS_VERSION: u32 = 2;
pub const CURRENT_SKILL_TREE_VERSION: u32 = 1;

/// Player status blob (`player-status`)
pub static STATUS_SCHEMA: BlobSchema = BlobSchema {
    name: "player-status",
    current_version: CURRENT_STATUS_VERSION,
    steps: &[migrate_status_v1_to_v2],
};

/// Skill tree blob (`skill-tree-data`)
pub static SKILL_TREE_SCHEMA: BlobSchema = BlobSchema {
    name: "skill-tree-data",
    current_version: CURRENT_SKILL_TREE_VERSION,
    steps: &[],
};

// ============================================================================
// Driver
// ============================================================================

/// Migrate a raw blob to `schema.current_version`
pub fn migrate(schema: &BlobSchema, raw: &str) -> Result<MigrationResult, MigrationError> {
    let mut data: Value = serde_json::from_str(raw).map_err(|e| MigrationError::InvalidFormat {
        schema: schema.name.to_string(),
        detail: e.to_string(),
    })?;

    if !data.is_object() {
        return Err(MigrationError::InvalidFormat {
            schema: schema.name.to_string(),
            detail: "blob is not a JSON object".to_string(),
        });
    }

    let version = match data.get("version") {
        None => LEGACY_VERSION,
        Some(v) => v
            .as_u64()
            .filter(|v| *v >= u64::from(LEGACY_VERSION) && *v <= u64::from(u32::MAX))
            .map(|v| v as u32)
            .ok_or_else(|| MigrationError::InvalidFormat {
                schema: schema.name.to_string(),
                detail: format!("invalid 'version' field: {v}"),
            })?,
    };

    if version > schema.current_version {
        return Err(MigrationError::FutureVersion {
            schema: schema.name.to_string(),
            blob_version: version,
            max_supported: schema.current_version,
        });
    }

    let mut current_version = version;
    let mut steps = Vec::new();

    while current_version < schema.current_version {
        let index = (current_version - LEGACY_VERSION) as usize;
        let step = schema
            .steps
            .get(index)
            .ok_or_else(|| MigrationError::MigrationStepFailed {
                schema: schema.name.to_string(),
                from_version: current_version,
                detail: format!("no migration path from version {current_version}"),
            })?;
        let description = step(&mut data).map_err(|detail| MigrationError::MigrationStepFailed {
            schema: schema.name.to_string(),
            from_version: current_version,
            detail,
        })?;
        debug!(schema = schema.name, "{}", description);
        steps.push(description);
        current_version += 1;
    }

    data["version"] = serde_json::json!(current_version);

    Ok(MigrationResult {
        original_version: version,
        final_version: current_version,
        steps_applied: steps,
        data,
    })
}

/// Migrate and deserialize a stored blob, or fall back to `default`.
///
/// `raw = None` (key absent) is the normal first-run path and is not logged
/// as a problem.
pub fn load_or_default<T, F>(schema: &BlobSchema, raw: Option<&str>, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let Some(raw) = raw else {
        debug!(schema = schema.name, "no stored blob, using default seed");
        return default();
    };

    let migrated = match migrate(schema, raw) {
        Ok(result) => result,
        Err(e) => {
            warn!(schema = schema.name, "discarding stored blob: {}", e);
            return default();
        }
    };

    match serde_json::from_value(migrated.data) {
        Ok(value) => value,
        Err(e) => {
            warn!(schema = schema.name, "stored blob does not match schema: {}", e);
            default()
        }
    }
}

/// Wrap a serialized state with the schema's current version
pub fn stamp_version<T: Serialize>(schema: &BlobSchema, state: &T) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(state)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("version".to_string(), serde_json::json!(schema.current_version));
    }
    serde_json::to_string(&value)
}

/// Read the version of a blob without migrating it
pub fn blob_version(raw: &str) -> Option<u32> {
    let data: Value = serde_json::from_str(raw).ok()?;
    if !data.is_object() {
        return None;
    }
    match data.get("version") {
        None => Some(LEGACY_VERSION),
        Some(v) => v.as_u64().map(|v| v as u32),
    }
}

// ============================================================================
// Steps
// ============================================================================

/// Status v1 → v2:
/// - Skills in the old ladder shape (`level` but no `category`) become
///   single-bar skills: level 10 or a full bar means mastered
/// - `isVisible` defaults to true
/// - Missing `identity` / `skills` sections are filled in
fn migrate_status_v1_to_v2(data: &mut Value) -> Result<String, String> {
    let obj = data.as_object_mut().ok_or("Status blob is not an object")?;

    if !obj.contains_key("identity") {
        obj.insert(
            "identity".to_string(),
            serde_json::json!({
                "name": "PLAYER",
                "job": "Life Adventurer",
                "title": "The Beginner"
            }),
        );
    }

    let skills = obj
        .entry("skills")
        .or_insert_with(|| serde_json::json!([]));
    let skills = skills
        .as_array_mut()
        .ok_or("'skills' is not an array")?;

    let mut converted = 0;
    for skill in skills.iter_mut() {
        let Some(skill_obj) = skill.as_object_mut() else {
            return Err("skill entry is not an object".to_string());
        };

        if !skill_obj.contains_key("isVisible") {
            skill_obj.insert("isVisible".to_string(), serde_json::json!(true));
        }

        if skill_obj.contains_key("category") {
            continue;
        }

        let level = skill_obj.get("level").and_then(Value::as_u64).unwrap_or(0);
        let required = skill_obj
            .get("requiredXP")
            .and_then(Value::as_u64)
            .unwrap_or(100);
        let current = skill_obj
            .get("currentXP")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let mastered = level >= u64::from(TREE_MAX_LEVEL) || current >= required;

        skill_obj.remove("level");
        skill_obj.insert("requiredXP".to_string(), serde_json::json!(required));
        if mastered {
            skill_obj.insert("category".to_string(), serde_json::json!("mastered"));
            skill_obj.insert("currentXP".to_string(), serde_json::json!(required));
            skill_obj.remove("stage");
        } else {
            skill_obj.insert("category".to_string(), serde_json::json!("progressive"));
            skill_obj.insert("currentXP".to_string(), serde_json::json!(current));
        }
        converted += 1;
    }

    Ok(format!(
        "v1→v2: converted {converted} legacy skills to single-bar mastery shape"
    ))
}
