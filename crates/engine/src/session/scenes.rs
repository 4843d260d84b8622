use tracing::{debug, info};

use super::{Session, SessionError};
use crate::collab::PauseOwner;
use crate::snapshot::PLAYER_OBJECT_NAME;
use crate::streaming::SceneEvent;
use crate::world::{Entity, ObjectId, SceneId};

impl Session {
    pub(super) fn handle_scene_event(&mut self, event: SceneEvent) -> Result<(), SessionError> {
        match event {
            SceneEvent::Loaded(scene) => self.on_scene_loaded(scene),
            SceneEvent::Unloaded(scene) => self.on_scene_unloaded(scene),
        }
    }

    fn on_scene_loaded(&mut self, scene: SceneId) -> Result<(), SessionError> {
        self.refresh()?;
        if !self.is_rewinding() {
            self.load_objects_from_scene(scene)?;
        }
        if self.timeline.is_empty() {
            self.save()?;
        }
        if self.pause_for_loading == Some(scene) {
            self.pause_for_loading = None;
            self.collab.time.set_pause(PauseOwner::SceneLoading, false);
        }
        info!(scene = scene.0, tracked = self.registry.len(), "scene_loaded");
        Ok(())
    }

    fn on_scene_unloaded(&mut self, scene: SceneId) -> Result<(), SessionError> {
        self.registry.drop_scene(&self.world, scene);
        self.refresh()?;
        info!(scene = scene.0, tracked = self.registry.len(), "scene_unloaded");
        Ok(())
    }

    /// Brings a freshly loaded scene up to date with the newest state that
    /// saw it open. Spawned entities recorded there but missing from the
    /// scene are recreated. Returns how many entities were restored.
    pub fn load_objects_from_scene(&mut self, scene: SceneId) -> Result<usize, SessionError> {
        let Some(current) = self.current() else {
            return Ok(0);
        };
        let Some(last_seen) = self.scenes.last_seen(scene, current) else {
            return Ok(0);
        };

        let ids: Vec<ObjectId> = self
            .world
            .ids_in_scene(scene)
            .into_iter()
            .filter(|id| self.registry.contains(*id))
            .collect();
        let restored = self.load_objects(&ids, last_seen)?;

        let mut recreated = 0usize;
        if let Some(state) = self.timeline.get(last_seen) {
            for snapshot in &state.states {
                if snapshot.scene == scene
                    && snapshot.is_spawned()
                    && !self.world.contains(snapshot.object_id)
                {
                    self.pending.request(last_seen, snapshot);
                    recreated += 1;
                }
            }
        }
        info!(
            scene = scene.0,
            from_state = last_seen.0,
            restored,
            recreated,
            "objects_backfilled"
        );
        Ok(restored)
    }

    /// Streams chunks in and out around the player. Time pauses while the
    /// chunk the player stands in is still loading.
    pub(super) fn check_scenes(&mut self) {
        let Some(position) = self
            .world
            .find_by_name(PLAYER_OBJECT_NAME)
            .map(Entity::position)
        else {
            return;
        };
        for loader in self.scenes.loaders() {
            if loader.is_position_in_scene(position) {
                if self.streamer.is_loaded(loader.scene) {
                    continue;
                }
                if self.streamer.request_load(loader.scene) {
                    debug!(scene = %loader.name, "scene_requested");
                }
                if self.pause_for_loading.is_none() {
                    self.pause_for_loading = Some(loader.scene);
                    self.collab.time.set_pause(PauseOwner::SceneLoading, true);
                }
            } else if self.streamer.is_loaded(loader.scene) || self.streamer.is_loading(loader.scene) {
                if self.streamer.request_unload(loader.scene) {
                    debug!(scene = %loader.name, "scene_release_requested");
                }
                if self.pause_for_loading == Some(loader.scene) {
                    self.pause_for_loading = None;
                    self.collab.time.set_pause(PauseOwner::SceneLoading, false);
                }
            }
        }
    }
}
