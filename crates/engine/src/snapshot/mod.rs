//! Snapshot data model: per-component field records, per-entity states and
//! whole-world game states.

mod catalog;
mod game_state;
mod object_state;
mod savable;
mod value;

use thiserror::Error;

pub use catalog::{PrefabCatalog, PrefabInstance, TypeCatalog};
pub use game_state::{GameState, GameStateId, GameStateIdAllocator, PLAYER_OBJECT_NAME};
pub use object_state::ObjectState;
pub use savable::{SavableComponent, SavableObject};
pub use value::{FieldMap, FromSavedValue, SavedField, SavedValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("unknown savable type tag '{tag}'")]
    UnknownTypeTag { tag: String },
    #[error("savable type tag '{tag}' is already registered")]
    DuplicateTypeTag { tag: String },
    #[error("unknown prefab '{prefab}'")]
    UnknownPrefab { prefab: String },
    #[error("prefab '{prefab}' is already registered")]
    DuplicatePrefab { prefab: String },
    #[error("field pair list has an odd number of entries ({len})")]
    OddPairCount { len: usize },
    #[error("field pair key at index {index} must be text, got {actual}")]
    NonTextKey { index: usize, actual: &'static str },
    #[error("field '{key}' is already present")]
    DuplicateField { key: String },
    #[error("missing field '{key}'")]
    MissingField { key: String },
    #[error("field '{key}' expected {expected}, got {actual}")]
    FieldType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("list '{key}' has invalid count {count}")]
    ListCount { key: String, count: i64 },
    #[error("object '{object}' is missing non-spawnable component '{tag}'")]
    MissingComponent { object: String, tag: String },
    #[error("savable object tag '{actual}' does not match component '{expected}'")]
    TagMismatch { expected: String, actual: String },
}
