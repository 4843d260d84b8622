use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unlock and upgrade state of one ability. Settings are persisted but never
/// rewound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingObject {
    pub id: String,
    pub unlocked: bool,
    pub upgrade_level: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SettingsBook {
    settings: BTreeMap<String, SettingObject>,
}

impl SettingsBook {
    pub fn set(&mut self, setting: SettingObject) {
        self.settings.insert(setting.id.clone(), setting);
    }

    pub fn get(&self, id: &str) -> Option<&SettingObject> {
        self.settings.get(id)
    }

    pub fn unlock(&mut self, id: &str) {
        self.settings
            .entry(id.to_string())
            .or_insert_with(|| SettingObject {
                id: id.to_string(),
                unlocked: false,
                upgrade_level: 0,
            })
            .unlocked = true;
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.get(id).is_some_and(|setting| setting.unlocked)
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn to_entries(&self) -> Vec<SettingObject> {
        self.settings.values().cloned().collect()
    }

    pub fn from_entries(entries: &[SettingObject]) -> Self {
        let mut book = Self::default();
        for entry in entries {
            book.set(entry.clone());
        }
        book
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_creates_missing_setting() {
        let mut book = SettingsBook::default();
        assert!(!book.is_unlocked("teleport"));
        book.unlock("teleport");
        assert!(book.is_unlocked("teleport"));
        assert_eq!(book.get("teleport").expect("setting").upgrade_level, 0);
    }

    #[test]
    fn set_replaces_by_id() {
        let mut book = SettingsBook::default();
        book.set(SettingObject {
            id: "wall_climb".to_string(),
            unlocked: true,
            upgrade_level: 1,
        });
        book.set(SettingObject {
            id: "wall_climb".to_string(),
            unlocked: true,
            upgrade_level: 2,
        });
        assert_eq!(book.len(), 1);
        assert_eq!(book.to_entries()[0].upgrade_level, 2);
    }
}
