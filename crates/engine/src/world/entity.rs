use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::{Quat, Vec2, Vec3};
use crate::snapshot::SavableComponent;

use super::memory::MemoryObject;

/// Stable identity of a trackable entity. Authored entities carry the id from
/// their scene blueprint; spawned entities get one from [`ObjectIdAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position: position.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub velocity: Vec2,
    pub angular_velocity: f32,
}

/// Present on entities created at runtime from a prefab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnInfo {
    pub prefab: String,
    pub spawn_tag: String,
}

#[derive(Debug)]
pub struct ComponentSlot {
    pub component: Box<dyn SavableComponent>,
    /// Attached at runtime rather than authored with the entity.
    pub spawned_script: bool,
}

#[derive(Debug)]
pub struct Entity {
    pub id: ObjectId,
    pub name: String,
    pub scene: SceneId,
    pub transform: Transform,
    pub body: Option<Body>,
    pub active: bool,
    pub spawn: Option<SpawnInfo>,
    /// One-time flags that survive rewinds.
    pub memory: Option<MemoryObject>,
    components: Vec<ComponentSlot>,
}

impl Entity {
    pub fn new(id: ObjectId, name: impl Into<String>, scene: SceneId) -> Self {
        Self {
            id,
            name: name.into(),
            scene,
            transform: Transform::default(),
            body: None,
            active: true,
            spawn: None,
            memory: None,
            components: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_spawn(mut self, spawn: SpawnInfo) -> Self {
        self.spawn = Some(spawn);
        self
    }

    pub fn with_memory(mut self, memory: MemoryObject) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_component(mut self, component: Box<dyn SavableComponent>) -> Self {
        self.add_component(component, false);
        self
    }

    /// Returns `false` and drops `component` when one with the same tag is
    /// already attached.
    pub fn add_component(
        &mut self,
        component: Box<dyn SavableComponent>,
        spawned_script: bool,
    ) -> bool {
        if self.component(component.type_tag()).is_some() {
            return false;
        }
        self.components.push(ComponentSlot {
            component,
            spawned_script,
        });
        true
    }

    pub fn components(&self) -> impl Iterator<Item = &ComponentSlot> {
        self.components.iter()
    }

    pub fn component(&self, tag: &str) -> Option<&dyn SavableComponent> {
        self.components
            .iter()
            .find(|slot| slot.component.type_tag() == tag)
            .map(|slot| slot.component.as_ref())
    }

    pub fn component_mut(&mut self, tag: &str) -> Option<&mut Box<dyn SavableComponent>> {
        self.components
            .iter_mut()
            .find(|slot| slot.component.type_tag() == tag)
            .map(|slot| &mut slot.component)
    }

    pub fn component_as<T: 'static>(&self) -> Option<&T> {
        self.components
            .iter()
            .find_map(|slot| slot.component.as_any().downcast_ref::<T>())
    }

    pub fn component_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find_map(|slot| slot.component.as_any_mut().downcast_mut::<T>())
    }

    /// Only entities with a physics body or at least one savable component
    /// can be tracked.
    pub fn has_savable_state(&self) -> bool {
        self.body.is_some() || !self.components.is_empty()
    }

    pub fn is_spawned(&self) -> bool {
        self.spawn.is_some()
    }

    pub fn position(&self) -> Vec2 {
        self.transform.position.truncate()
    }
}

#[derive(Debug, Default)]
pub struct ObjectIdAllocator {
    next: u64,
}

impl ObjectIdAllocator {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Guarantees `id` is never handed out by [`Self::allocate`].
    pub fn reserve_through(&mut self, id: ObjectId) {
        if id.0 >= self.next {
            self.next = id.0.saturating_add(1);
        }
    }
}

/// Every live entity, keyed by id. The id allocator is never reset so ids
/// used by a pruned branch of history cannot be handed out again.
#[derive(Debug, Default)]
pub struct World {
    allocator: ObjectIdAllocator,
    entities: BTreeMap<ObjectId, Entity>,
}

impl World {
    pub fn allocate_id(&mut self) -> ObjectId {
        self.allocator.allocate()
    }

    pub fn reserve_ids_through(&mut self, id: ObjectId) {
        self.allocator.reserve_through(id);
    }

    /// Returns `false` without inserting when the id is already live.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if self.entities.contains_key(&entity.id) {
            return false;
        }
        self.allocator.reserve_through(entity.id);
        self.entities.insert(entity.id, entity);
        true
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.values().find(|entity| entity.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn ids_in_scene(&self, scene: SceneId) -> Vec<ObjectId> {
        self.entities
            .values()
            .filter(|entity| entity.scene == scene)
            .map(|entity| entity.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
