use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use tracing::debug;

use crate::world::{Entity, ObjectId, SceneId, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    Loaded(SceneId),
    Unloaded(SceneId),
}

/// Asynchronous scene loading. Requests complete on a later [`poll`], which
/// reports what finished.
///
/// [`poll`]: SceneStreaming::poll
pub trait SceneStreaming: fmt::Debug {
    fn is_loaded(&self, scene: SceneId) -> bool;

    fn is_loading(&self, scene: SceneId) -> bool;

    /// Returns `false` when the scene is already loaded or loading.
    fn request_load(&mut self, scene: SceneId) -> bool;

    /// Returns `false` when the scene is not loaded.
    fn request_unload(&mut self, scene: SceneId) -> bool;

    fn poll(&mut self, world: &mut World) -> Vec<SceneEvent>;

    fn loaded_scenes(&self) -> Vec<SceneId>;

    /// Drops every loaded scene and outstanding request immediately,
    /// without reporting events.
    fn unload_all(&mut self, world: &mut World);

    /// Highest id any scene authors, so spawned ids never collide with it.
    fn max_authored_id(&self) -> Option<ObjectId>;
}

type SceneBuilder = Box<dyn Fn() -> Vec<Entity>>;

struct SceneBlueprint {
    name: String,
    build: SceneBuilder,
    max_id: Option<ObjectId>,
}

/// In-process streamer that instantiates scenes from registered builders.
/// Loads and unloads requested during a frame take effect on the next poll.
#[derive(Default)]
pub struct ChunkStreamer {
    blueprints: BTreeMap<SceneId, SceneBlueprint>,
    loaded: BTreeSet<SceneId>,
    pending_loads: VecDeque<SceneId>,
    pending_unloads: VecDeque<SceneId>,
}

impl fmt::Debug for ChunkStreamer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .blueprints
            .values()
            .map(|blueprint| blueprint.name.as_str())
            .collect();
        f.debug_struct("ChunkStreamer")
            .field("scenes", &names)
            .field("loaded", &self.loaded)
            .field("pending_loads", &self.pending_loads)
            .field("pending_unloads", &self.pending_unloads)
            .finish()
    }
}

impl ChunkStreamer {
    pub fn register_scene<F>(&mut self, scene: SceneId, name: impl Into<String>, build: F)
    where
        F: Fn() -> Vec<Entity> + 'static,
    {
        let max_id = build().iter().map(|entity| entity.id).max();
        self.blueprints.insert(
            scene,
            SceneBlueprint {
                name: name.into(),
                build: Box::new(build),
                max_id,
            },
        );
    }

    fn load_now(&mut self, scene: SceneId, world: &mut World) {
        let Some(blueprint) = self.blueprints.get(&scene) else {
            return;
        };
        let mut spawned = 0usize;
        for mut entity in (blueprint.build)() {
            entity.scene = scene;
            if world.insert(entity) {
                spawned += 1;
            }
        }
        self.loaded.insert(scene);
        debug!(scene = %blueprint.name, entity_count = spawned, "scene_streamed_in");
    }

    fn unload_now(&mut self, scene: SceneId, world: &mut World) {
        for id in world.ids_in_scene(scene) {
            world.remove(id);
        }
        self.loaded.remove(&scene);
        debug!(scene = scene.0, "scene_streamed_out");
    }
}

impl SceneStreaming for ChunkStreamer {
    fn is_loaded(&self, scene: SceneId) -> bool {
        self.loaded.contains(&scene)
    }

    fn is_loading(&self, scene: SceneId) -> bool {
        self.pending_loads.contains(&scene)
    }

    fn request_load(&mut self, scene: SceneId) -> bool {
        if !self.blueprints.contains_key(&scene) || self.is_loaded(scene) || self.is_loading(scene) {
            return false;
        }
        self.pending_unloads.retain(|pending| *pending != scene);
        self.pending_loads.push_back(scene);
        true
    }

    fn request_unload(&mut self, scene: SceneId) -> bool {
        if self.is_loading(scene) {
            self.pending_loads.retain(|pending| *pending != scene);
            return true;
        }
        if !self.is_loaded(scene) || self.pending_unloads.contains(&scene) {
            return false;
        }
        self.pending_unloads.push_back(scene);
        true
    }

    fn poll(&mut self, world: &mut World) -> Vec<SceneEvent> {
        let mut events = Vec::new();
        while let Some(scene) = self.pending_unloads.pop_front() {
            self.unload_now(scene, world);
            events.push(SceneEvent::Unloaded(scene));
        }
        while let Some(scene) = self.pending_loads.pop_front() {
            self.load_now(scene, world);
            events.push(SceneEvent::Loaded(scene));
        }
        events
    }

    fn loaded_scenes(&self) -> Vec<SceneId> {
        self.loaded.iter().copied().collect()
    }

    fn unload_all(&mut self, world: &mut World) {
        self.pending_loads.clear();
        self.pending_unloads.clear();
        for scene in self.loaded_scenes() {
            self.unload_now(scene, world);
        }
    }

    fn max_authored_id(&self) -> Option<ObjectId> {
        self.blueprints
            .values()
            .filter_map(|blueprint| blueprint.max_id)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Body;

    fn streamer() -> ChunkStreamer {
        let mut streamer = ChunkStreamer::default();
        streamer.register_scene(SceneId(0), "meadow", || {
            vec![Entity::new(ObjectId(10), "rock", SceneId(0)).with_body(Body::default())]
        });
        streamer.register_scene(SceneId(1), "cavern", || {
            vec![Entity::new(ObjectId(20), "bat", SceneId(1)).with_body(Body::default())]
        });
        streamer
    }

    #[test]
    fn load_completes_on_next_poll() {
        let mut streamer = streamer();
        let mut world = World::default();
        assert!(streamer.request_load(SceneId(0)));
        assert!(!streamer.request_load(SceneId(0)));
        assert!(streamer.is_loading(SceneId(0)));
        assert!(world.is_empty());

        let events = streamer.poll(&mut world);
        assert_eq!(events, vec![SceneEvent::Loaded(SceneId(0))]);
        assert!(streamer.is_loaded(SceneId(0)));
        assert!(world.contains(ObjectId(10)));
    }

    #[test]
    fn unload_removes_scene_entities_only() {
        let mut streamer = streamer();
        let mut world = World::default();
        streamer.request_load(SceneId(0));
        streamer.request_load(SceneId(1));
        streamer.poll(&mut world);

        assert!(streamer.request_unload(SceneId(1)));
        let events = streamer.poll(&mut world);
        assert_eq!(events, vec![SceneEvent::Unloaded(SceneId(1))]);
        assert!(world.contains(ObjectId(10)));
        assert!(!world.contains(ObjectId(20)));
    }

    #[test]
    fn max_authored_id_spans_all_scenes() {
        assert_eq!(streamer().max_authored_id(), Some(ObjectId(20)));
    }

    #[test]
    fn unknown_scene_is_never_requested() {
        let mut streamer = streamer();
        assert!(!streamer.request_load(SceneId(9)));
    }

    #[test]
    fn unload_all_drops_everything_silently() {
        let mut streamer = streamer();
        let mut world = World::default();
        streamer.request_load(SceneId(0));
        streamer.poll(&mut world);
        streamer.request_load(SceneId(1));

        streamer.unload_all(&mut world);
        assert!(world.is_empty());
        assert!(streamer.loaded_scenes().is_empty());
        assert!(streamer.poll(&mut world).is_empty());
    }
}
