use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::world::SpawnInfo;

use super::value::{FieldMap, FromSavedValue, SavedValue};
use super::SnapshotError;

/// A piece of entity behaviour whose fields take part in rewind.
///
/// `restore` must be the exact inverse of `capture` for any map the component
/// produced itself. `capture` must not mutate anything.
pub trait SavableComponent: fmt::Debug {
    fn type_tag(&self) -> &'static str;

    fn capture(&self) -> Result<FieldMap, SnapshotError>;

    fn restore(&mut self, fields: &FieldMap) -> Result<(), SnapshotError>;

    /// Entities with higher priority are restored first.
    fn priority(&self) -> i32 {
        0
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The persisted fields of one component instance plus the metadata needed to
/// recreate that component, or its whole entity, on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavableObject {
    pub type_tag: String,
    pub fields: FieldMap,
    #[serde(default)]
    pub is_spawned_object: bool,
    #[serde(default)]
    pub is_spawned_script: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefab_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_tag: Option<String>,
}

impl SavableObject {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            fields: FieldMap::new(),
            is_spawned_object: false,
            is_spawned_script: false,
            prefab_name: None,
            spawn_tag: None,
        }
    }

    /// Builds a record from alternating `key, value` entries, e.g.
    /// `["cracked", true, "name", "CrackedGround"]`.
    pub fn from_pairs(
        type_tag: impl Into<String>,
        pairs: Vec<SavedValue>,
    ) -> Result<Self, SnapshotError> {
        Self::new(type_tag).more(pairs)
    }

    pub fn more(mut self, pairs: Vec<SavedValue>) -> Result<Self, SnapshotError> {
        self.fields.extend_pairs(pairs)?;
        Ok(self)
    }

    pub fn get<T: FromSavedValue>(&self, key: &str) -> Result<T, SnapshotError> {
        self.fields.get(key)
    }

    pub(crate) fn capture(
        component: &dyn SavableComponent,
        spawn: Option<&SpawnInfo>,
        spawned_script: bool,
    ) -> Result<Self, SnapshotError> {
        let mut record = Self::new(component.type_tag());
        record.fields = component.capture()?;
        record.is_spawned_script = spawned_script;
        if let Some(spawn) = spawn {
            record.is_spawned_object = true;
            record.prefab_name = Some(spawn.prefab.clone());
            record.spawn_tag = Some(spawn.spawn_tag.clone());
        }
        Ok(record)
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.fields.iter().all(|field| field.value.is_finite())
    }
}
