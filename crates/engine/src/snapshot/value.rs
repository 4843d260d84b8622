use serde::{Deserialize, Serialize};

use crate::math::{Quat, Vec2, Vec3};

use super::SnapshotError;

const LIST_COUNT_KEY: &str = "count";

/// A single persisted value. `Dict` carries self-describing nested payloads
/// such as variable-length lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Quat(Quat),
    Dict(FieldMap),
}

impl SavedValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Quat(_) => "quat",
            Self::Dict(_) => "dict",
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        match self {
            Self::Float(value) => value.is_finite(),
            Self::Vec2(value) => value.is_finite(),
            Self::Vec3(value) => value.is_finite(),
            Self::Quat(value) => value.is_finite(),
            Self::Dict(fields) => fields.iter().all(|field| field.value.is_finite()),
            Self::Bool(_) | Self::Int(_) | Self::Text(_) => true,
        }
    }
}

impl From<bool> for SavedValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SavedValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SavedValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for SavedValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f32> for SavedValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SavedValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SavedValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec2> for SavedValue {
    fn from(value: Vec2) -> Self {
        Self::Vec2(value)
    }
}

impl From<Vec3> for SavedValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Quat> for SavedValue {
    fn from(value: Quat) -> Self {
        Self::Quat(value)
    }
}

impl From<FieldMap> for SavedValue {
    fn from(value: FieldMap) -> Self {
        Self::Dict(value)
    }
}

/// Typed extraction out of a [`SavedValue`].
pub trait FromSavedValue: Sized {
    const KIND: &'static str;

    fn from_saved(value: &SavedValue) -> Option<Self>;
}

macro_rules! impl_from_saved {
    ($ty:ty, $kind:literal, $variant:ident) => {
        impl FromSavedValue for $ty {
            const KIND: &'static str = $kind;

            fn from_saved(value: &SavedValue) -> Option<Self> {
                match value {
                    SavedValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_from_saved!(bool, "bool", Bool);
impl_from_saved!(i64, "int", Int);
impl_from_saved!(f32, "float", Float);
impl_from_saved!(String, "text", Text);
impl_from_saved!(Vec2, "vec2", Vec2);
impl_from_saved!(Vec3, "vec3", Vec3);
impl_from_saved!(Quat, "quat", Quat);
impl_from_saved!(FieldMap, "dict", Dict);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedField {
    pub key: String,
    pub value: SavedValue,
}

/// Insertion-ordered field-name to value mapping with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    fields: Vec<SavedField>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SavedField> {
        self.fields.iter()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|field| field.key == key)
    }

    pub fn raw(&self, key: &str) -> Option<&SavedValue> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map(|field| &field.value)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<SavedValue>,
    ) -> Result<(), SnapshotError> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(SnapshotError::DuplicateField { key });
        }
        self.fields.push(SavedField {
            key,
            value: value.into(),
        });
        Ok(())
    }

    /// Appends alternating `key, value, key, value, ...` entries. Keys must be
    /// `Text`.
    pub fn extend_pairs(&mut self, pairs: Vec<SavedValue>) -> Result<(), SnapshotError> {
        if pairs.len() % 2 != 0 {
            return Err(SnapshotError::OddPairCount { len: pairs.len() });
        }
        let mut iter = pairs.into_iter().enumerate();
        while let (Some((index, key)), Some((_, value))) = (iter.next(), iter.next()) {
            let SavedValue::Text(key) = key else {
                return Err(SnapshotError::NonTextKey {
                    index,
                    actual: key.kind_name(),
                });
            };
            self.insert(key, value)?;
        }
        Ok(())
    }

    pub fn get<T: FromSavedValue>(&self, key: &str) -> Result<T, SnapshotError> {
        let value = self.raw(key).ok_or_else(|| SnapshotError::MissingField {
            key: key.to_string(),
        })?;
        T::from_saved(value).ok_or_else(|| SnapshotError::FieldType {
            key: key.to_string(),
            expected: T::KIND,
            actual: value.kind_name(),
        })
    }

    /// Stores `items` as a nested dictionary `{ "0": .., "1": .., "count": n }`.
    pub fn insert_list<I, V>(
        &mut self,
        key: impl Into<String>,
        items: I,
    ) -> Result<(), SnapshotError>
    where
        I: IntoIterator<Item = V>,
        V: Into<SavedValue>,
    {
        let mut nested = FieldMap::new();
        let mut count = 0i64;
        for item in items {
            nested.insert(count.to_string(), item)?;
            count += 1;
        }
        nested.insert(LIST_COUNT_KEY, count)?;
        self.insert(key, nested)
    }

    pub fn get_list<T: FromSavedValue>(&self, key: &str) -> Result<Vec<T>, SnapshotError> {
        let nested: FieldMap = self.get(key)?;
        let count: i64 = nested.get(LIST_COUNT_KEY)?;
        if count < 0 {
            return Err(SnapshotError::ListCount {
                key: key.to_string(),
                count,
            });
        }
        (0..count)
            .map(|index| nested.get::<T>(&index.to_string()))
            .collect()
    }
}
