//! Live entities, the registry of entities that take part in snapshots, and
//! the non-rewinding memory book.

mod entity;
mod memory;
mod registry;

pub use entity::{
    Body, ComponentSlot, Entity, ObjectId, ObjectIdAllocator, SceneId, SpawnInfo, Transform, World,
};
pub use memory::{MemoryBook, MemoryEntry, MemoryObject};
pub use registry::{ObjectRegistry, RegistryError};
