use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity::{ObjectId, World};

/// Flags for one-time pickups and discoveries. Once set they are never
/// rewound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryObject {
    pub discovered: bool,
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: ObjectId,
    #[serde(flatten)]
    pub memory: MemoryObject,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryBook {
    memories: BTreeMap<ObjectId, MemoryObject>,
}

impl MemoryBook {
    /// Records the entity's current memory, replacing any earlier one.
    /// Returns `false` when the entity is missing or carries no memory.
    pub fn save(&mut self, world: &World, id: ObjectId) -> bool {
        let Some(memory) = world.get(id).and_then(|entity| entity.memory) else {
            return false;
        };
        self.memories.insert(id, memory);
        true
    }

    pub fn get(&self, id: ObjectId) -> Option<MemoryObject> {
        self.memories.get(&id).copied()
    }

    /// Pushes stored memories onto live entities and records memories of
    /// entities not seen before.
    pub fn sync(&mut self, world: &mut World) {
        let ids: Vec<ObjectId> = world
            .iter()
            .filter(|entity| entity.memory.is_some())
            .map(|entity| entity.id)
            .collect();
        for id in ids {
            let Some(entity) = world.get_mut(id) else {
                continue;
            };
            match self.memories.get(&id) {
                Some(stored) => entity.memory = Some(*stored),
                None => {
                    if let Some(memory) = entity.memory {
                        self.memories.insert(id, memory);
                    }
                }
            }
        }
    }

    /// Only pushes stored memories onto live entities.
    pub fn apply(&self, world: &mut World) {
        for (id, stored) in &self.memories {
            if let Some(entity) = world.get_mut(*id) {
                if entity.memory.is_some() {
                    entity.memory = Some(*stored);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn clear(&mut self) {
        self.memories.clear();
    }

    pub fn to_entries(&self) -> Vec<MemoryEntry> {
        self.memories
            .iter()
            .map(|(id, memory)| MemoryEntry {
                id: *id,
                memory: *memory,
            })
            .collect()
    }

    pub fn from_entries(entries: &[MemoryEntry]) -> Self {
        Self {
            memories: entries
                .iter()
                .map(|entry| (entry.id, entry.memory))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::entity::{Entity, SceneId};

    #[test]
    fn sync_restores_known_and_records_new_memories() {
        let mut world = World::default();
        world.insert(
            Entity::new(ObjectId(1), "lantern", SceneId(0)).with_memory(MemoryObject::default()),
        );
        world.insert(Entity::new(ObjectId(2), "shrine", SceneId(0)).with_memory(MemoryObject {
            discovered: true,
            used: false,
        }));

        let mut book = MemoryBook::from_entries(&[MemoryEntry {
            id: ObjectId(1),
            memory: MemoryObject {
                discovered: true,
                used: true,
            },
        }]);
        book.sync(&mut world);

        let lantern = world.get(ObjectId(1)).expect("lantern");
        assert_eq!(
            lantern.memory,
            Some(MemoryObject {
                discovered: true,
                used: true
            })
        );
        assert_eq!(book.get(ObjectId(2)).map(|memory| memory.discovered), Some(true));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn save_overwrites_previous_memory() {
        let mut world = World::default();
        world.insert(
            Entity::new(ObjectId(4), "switch", SceneId(0)).with_memory(MemoryObject::default()),
        );
        let mut book = MemoryBook::default();
        assert!(book.save(&world, ObjectId(4)));

        world.get_mut(ObjectId(4)).expect("switch").memory = Some(MemoryObject {
            discovered: true,
            used: true,
        });
        assert!(book.save(&world, ObjectId(4)));
        assert!(book.get(ObjectId(4)).expect("memory").used);
        assert!(!book.save(&world, ObjectId(99)));
    }
}
