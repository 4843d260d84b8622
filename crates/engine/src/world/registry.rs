use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use super::entity::{Entity, ObjectId, SceneId, World};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("object {name} ({id:?}) is already registered")]
    DuplicateKey { id: ObjectId, name: String },
    #[error("object {name} ({id:?}) has no state to save")]
    NoSavableState { id: ObjectId, name: String },
    #[error("object {id:?} does not exist in the world")]
    UnknownEntity { id: ObjectId },
    #[error("object {id:?} is not registered")]
    NotTracked { id: ObjectId },
}

/// The set of entities that take part in snapshots.
///
/// Forgotten entities are inactive but still tracked, so their state keeps
/// being captured until their scene unloads.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ObjectRegistry {
    tracked: BTreeSet<ObjectId>,
    forgotten: BTreeSet<ObjectId>,
}

impl ObjectRegistry {
    pub fn add(&mut self, world: &World, id: ObjectId) -> Result<(), RegistryError> {
        let entity = world.get(id).ok_or(RegistryError::UnknownEntity { id })?;
        if self.tracked.contains(&id) {
            return Err(RegistryError::DuplicateKey {
                id,
                name: entity.name.clone(),
            });
        }
        if !entity.has_savable_state() {
            return Err(RegistryError::NoSavableState {
                id,
                name: entity.name.clone(),
            });
        }
        self.tracked.insert(id);
        Ok(())
    }

    pub fn remove(&mut self, id: ObjectId) -> Result<(), RegistryError> {
        let was_forgotten = self.forgotten.remove(&id);
        if !self.tracked.remove(&id) && !was_forgotten {
            return Err(RegistryError::NotTracked { id });
        }
        Ok(())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.tracked.contains(&id)
    }

    pub fn is_forgotten(&self, id: ObjectId) -> bool {
        self.forgotten.contains(&id)
    }

    /// Tracked ids in ascending order.
    pub fn tracked(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.tracked.iter().copied()
    }

    pub fn forgotten(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.forgotten.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Rebuilds the tracked set from the world: every active entity with
    /// savable state, plus every forgotten entity that still exists and is
    /// still inactive. Calling it twice without world changes is a no-op.
    pub fn refresh(&mut self, world: &World) -> Result<(), RegistryError> {
        self.forgotten
            .retain(|id| world.get(*id).is_some_and(|entity| !entity.active));
        self.tracked.clear();

        let live: Vec<ObjectId> = world
            .iter()
            .filter(|entity| entity.active && entity.has_savable_state())
            .map(|entity| entity.id)
            .collect();
        for id in live {
            self.add(world, id)?;
        }
        let forgotten: Vec<ObjectId> = self.forgotten.iter().copied().collect();
        for id in forgotten {
            self.add(world, id)?;
        }

        debug!(
            tracked = self.tracked.len(),
            forgotten = self.forgotten.len(),
            "registry_refreshed"
        );
        Ok(())
    }

    /// Deactivates the entity while keeping its state in every later
    /// snapshot.
    pub fn forget(&mut self, world: &mut World, id: ObjectId) -> Result<(), RegistryError> {
        let entity = world
            .get_mut(id)
            .ok_or(RegistryError::UnknownEntity { id })?;
        if !entity.has_savable_state() {
            return Err(RegistryError::NoSavableState {
                id,
                name: entity.name.clone(),
            });
        }
        entity.active = false;
        self.forgotten.insert(id);
        self.tracked.insert(id);
        Ok(())
    }

    pub fn remember(&mut self, world: &mut World, id: ObjectId) -> Result<(), RegistryError> {
        let entity = world
            .get_mut(id)
            .ok_or(RegistryError::UnknownEntity { id })?;
        entity.active = true;
        self.forgotten.remove(&id);
        Ok(())
    }

    /// Unregisters the entity, then removes it from the world.
    pub fn destroy(&mut self, world: &mut World, id: ObjectId) -> Option<Entity> {
        self.tracked.remove(&id);
        self.forgotten.remove(&id);
        world.remove(id)
    }

    /// Drops forgotten entities belonging to `scene`; called as the scene
    /// unloads.
    pub fn drop_scene(&mut self, world: &World, scene: SceneId) {
        self.forgotten
            .retain(|id| world.get(*id).is_some_and(|entity| entity.scene != scene));
        self.tracked
            .retain(|id| world.get(*id).is_some_and(|entity| entity.scene != scene));
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
        self.forgotten.clear();
    }
}
