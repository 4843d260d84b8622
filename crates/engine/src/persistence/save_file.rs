use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::snapshot::{GameState, TypeCatalog};
use crate::streaming::SceneRecord;
use crate::world::MemoryEntry;

use super::atomic_io::{remove_if_exists, write_bytes_atomic};
use super::hashing::sha256_hex;
use super::settings::SettingObject;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("read save '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("remove save '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse save json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("save checksum mismatch: expected {expected}, computed {actual}")]
    Checksum { expected: String, actual: String },
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveConfig {
    pub save_dir: PathBuf,
    pub base_name: String,
    pub extension: String,
    /// Demo builds never load on startup and always write timestamped files.
    pub demo_mode: bool,
    pub save_with_timestamp: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("cache").join("saves"),
            base_name: "merky".to_string(),
            extension: "json".to_string(),
            demo_mode: false,
            save_with_timestamp: false,
        }
    }
}

impl SaveConfig {
    pub fn with_dir(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            ..Self::default()
        }
    }

    pub fn uses_timestamp(&self) -> bool {
        self.demo_mode || self.save_with_timestamp
    }

    /// `merky.json`, or `merky_<unix seconds>.json` when timestamped.
    pub fn file_path(&self, unix_seconds: Option<u64>) -> PathBuf {
        let file_name = match unix_seconds {
            Some(seconds) => format!("{}_{seconds}.{}", self.base_name, self.extension),
            None => format!("{}.{}", self.base_name, self.extension),
        };
        self.save_dir.join(file_name)
    }

    /// Path for the next write, stamped with the current time if configured.
    pub fn write_path(&self) -> PathBuf {
        let stamp = self.uses_timestamp().then(unix_now_seconds);
        self.file_path(stamp)
    }

    pub fn canonical_path(&self) -> PathBuf {
        self.file_path(None)
    }
}

fn unix_now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Everything a save file holds, under its four logical tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveBody {
    pub memories: Vec<MemoryEntry>,
    pub states: Vec<GameState>,
    pub scenes: Vec<SceneRecord>,
    pub settings: Vec<SettingObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SaveEnvelope {
    save_version: u32,
    checksum_sha256: String,
    body: SaveBody,
}

fn body_checksum(body: &SaveBody) -> Result<String, PersistenceError> {
    let canonical = serde_json::to_vec(body).map_err(PersistenceError::Encode)?;
    Ok(sha256_hex(&canonical))
}

pub fn write_save(path: &Path, body: &SaveBody) -> Result<(), PersistenceError> {
    let envelope = SaveEnvelope {
        save_version: SAVE_VERSION,
        checksum_sha256: body_checksum(body)?,
        body: body.clone(),
    };
    let json = serde_json::to_string_pretty(&envelope).map_err(PersistenceError::Encode)?;
    write_bytes_atomic(path, json.as_bytes()).map_err(|source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        state_count = body.states.len(),
        bytes = json.len(),
        "save_file_written"
    );
    Ok(())
}

/// Reads, parses and validates a save. `Ok(None)` means there is no file.
pub fn read_save(path: &Path, catalog: &TypeCatalog) -> Result<Option<SaveBody>, PersistenceError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let envelope = parse_save_json(&raw)?;
    validate_envelope(&envelope, catalog)?;
    Ok(Some(envelope.body))
}

pub fn delete_save(path: &Path) -> Result<bool, PersistenceError> {
    remove_if_exists(path).map_err(|source| PersistenceError::Remove {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_save_json(raw: &str) -> Result<SaveEnvelope, PersistenceError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveEnvelope>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        PersistenceError::Parse {
            path: if path.is_empty() { ".".to_string() } else { path },
            source,
        }
    })
}

fn validation_err(path: &str, message: impl Into<String>) -> PersistenceError {
    PersistenceError::Validation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> PersistenceError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

fn validate_envelope(
    envelope: &SaveEnvelope,
    catalog: &TypeCatalog,
) -> Result<(), PersistenceError> {
    if envelope.save_version != SAVE_VERSION {
        return Err(expected_actual(
            "save_version",
            SAVE_VERSION,
            envelope.save_version,
        ));
    }

    let actual = body_checksum(&envelope.body)?;
    if actual != envelope.checksum_sha256 {
        return Err(PersistenceError::Checksum {
            expected: envelope.checksum_sha256.clone(),
            actual,
        });
    }

    validate_body(&envelope.body, catalog)
}

fn validate_body(body: &SaveBody, catalog: &TypeCatalog) -> Result<(), PersistenceError> {
    for (index, state) in body.states.iter().enumerate() {
        let id_path = format!("body.states[{index}].id");
        if state.id.index() != index {
            return Err(expected_actual(&id_path, index, state.id.0));
        }

        let mut seen = HashSet::with_capacity(state.states.len());
        for (object_index, object) in state.states.iter().enumerate() {
            let object_path = format!("body.states[{index}].states[{object_index}]");
            if !seen.insert(object.object_id) {
                return Err(validation_err(
                    &object_path,
                    format!("duplicate object_id {}", object.object_id.0),
                ));
            }
            if !object.is_finite() {
                return Err(expected_actual(
                    &object_path,
                    "finite transform and field values",
                    "non-finite value",
                ));
            }
            for (savable_index, savable) in object.savables.iter().enumerate() {
                if !catalog.contains(&savable.type_tag) {
                    return Err(validation_err(
                        &format!("{object_path}.savables[{savable_index}].type_tag"),
                        format!("unknown savable type tag '{}'", savable.type_tag),
                    ));
                }
            }
        }
    }

    let mut memory_ids = HashSet::with_capacity(body.memories.len());
    for (index, entry) in body.memories.iter().enumerate() {
        if !memory_ids.insert(entry.id) {
            return Err(validation_err(
                &format!("body.memories[{index}].id"),
                format!("duplicate memory id {}", entry.id.0),
            ));
        }
    }

    let mut setting_ids = HashSet::with_capacity(body.settings.len());
    for (index, setting) in body.settings.iter().enumerate() {
        if !setting_ids.insert(setting.id.as_str()) {
            return Err(validation_err(
                &format!("body.settings[{index}].id"),
                format!("duplicate setting id '{}'", setting.id),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use tempfile::TempDir;

    use super::*;
    use crate::math::Vec2;
    use crate::snapshot::{FieldMap, GameStateId, SavableComponent, SnapshotError};
    use crate::world::{Body, Entity, MemoryObject, ObjectId, SceneId, Transform};

    #[derive(Debug, Default)]
    struct Gauge {
        level: f32,
    }

    impl SavableComponent for Gauge {
        fn type_tag(&self) -> &'static str {
            "Gauge"
        }

        fn capture(&self) -> Result<FieldMap, SnapshotError> {
            let mut fields = FieldMap::new();
            fields.insert("level", self.level)?;
            Ok(fields)
        }

        fn restore(&mut self, fields: &FieldMap) -> Result<(), SnapshotError> {
            self.level = fields.get("level")?;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::default();
        catalog
            .register("Gauge", || Box::new(Gauge::default()))
            .expect("register");
        catalog
    }

    fn sample_body() -> SaveBody {
        let entity = Entity::new(ObjectId(0), "merky", SceneId(0))
            .with_transform(Transform::at(Vec2::new(1.5, 2.0)))
            .with_body(Body::default())
            .with_component(Box::new(Gauge { level: 0.5 }));
        let states = (0..3)
            .map(|id| GameState::capture(GameStateId(id), [&entity]).expect("capture"))
            .collect();
        SaveBody {
            memories: vec![MemoryEntry {
                id: ObjectId(4),
                memory: MemoryObject {
                    discovered: true,
                    used: false,
                },
            }],
            states,
            scenes: vec![SceneRecord {
                scene: SceneId(0),
                first_open: Some(GameStateId(0)),
                last_open: Some(GameStateId(2)),
            }],
            settings: vec![SettingObject {
                id: "teleport".to_string(),
                unlocked: true,
                upgrade_level: 1,
            }],
        }
    }

    #[test]
    fn write_then_read_returns_same_body() {
        let temp = TempDir::new().expect("tempdir");
        let path = SaveConfig::with_dir(temp.path()).canonical_path();
        let body = sample_body();

        write_save(&path, &body).expect("write");
        let loaded = read_save(&path, &catalog()).expect("read").expect("present");
        assert_eq!(loaded, body);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("merky.json");
        assert!(read_save(&path, &catalog()).expect("read").is_none());
    }

    #[test]
    fn parse_error_reports_json_path() {
        let raw = r#"{"save_version":1,"checksum_sha256":"x","body":{"memories":[],"states":[{"id":"zero","states":[]}],"scenes":[],"settings":[]}}"#;
        let err = parse_save_json(raw).expect_err("bad id");
        let message = err.to_string();
        assert!(
            message.contains("body.states[0].id"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn tampered_body_fails_checksum() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("merky.json");
        write_save(&path, &sample_body()).expect("write");

        let raw = fs::read_to_string(&path).expect("read");
        let tampered = raw.replacen("\"teleport\"", "\"swap\"", 1);
        fs::write(&path, tampered).expect("write tampered");

        assert!(matches!(
            read_save(&path, &catalog()),
            Err(PersistenceError::Checksum { .. })
        ));
    }

    #[test]
    fn unknown_type_tag_fails_validation() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("merky.json");
        write_save(&path, &sample_body()).expect("write");

        let err = read_save(&path, &TypeCatalog::default()).expect_err("unknown tag");
        match err {
            PersistenceError::Validation { path, message } => {
                assert_eq!(path, "body.states[0].states[0].savables[0].type_tag");
                assert!(message.contains("Gauge"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_contiguous_state_ids_fail_validation() {
        let mut body = sample_body();
        body.states[1].id = GameStateId(7);
        let err = validate_body(&body, &catalog()).expect_err("gap");
        assert_eq!(
            err.to_string(),
            "validation failed at body.states[1].id: expected 1, got 7"
        );
    }

    #[test]
    fn timestamped_file_name_keeps_base_and_extension() {
        let config = SaveConfig::with_dir("saves");
        assert_eq!(config.file_path(None), PathBuf::from("saves").join("merky.json"));
        assert_eq!(
            config.file_path(Some(1_700_000_000)),
            PathBuf::from("saves").join("merky_1700000000.json")
        );
        assert!(!config.uses_timestamp());
    }
}
