//! The rewind session: one explicit context owning the world, the timeline
//! and every collaborator, driven once per fixed tick.

mod files;
mod ghosts;
mod scenes;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collab::{Collaborators, PauseOwner, PlaybackRate};
use crate::math::Vec2;
use crate::persistence::{PersistenceError, SaveConfig, SettingsBook};
use crate::rewind::{
    DeferredAction, ObserverList, PendingCreations, RewindConfig, RewindDriver, RewindEvent,
    Timeline, TimelineError,
};
use crate::snapshot::{GameState, GameStateId, PrefabCatalog, SnapshotError, TypeCatalog};
use crate::streaming::{SceneBook, SceneStreaming};
use crate::world::{
    Entity, MemoryBook, MemoryObject, ObjectId, ObjectRegistry, RegistryError, SceneId, World,
};

pub use ghosts::{ghost_alpha, TapOutcome};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("object {id:?} does not exist in the world")]
    UnknownEntity { id: ObjectId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub rewind: RewindConfig,
    pub save: SaveConfig,
    /// World-space radius within which a tap selects a player ghost.
    pub ghost_tap_radius: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rewind: RewindConfig::default(),
            save: SaveConfig::default(),
            ghost_tap_radius: 0.5,
        }
    }
}

/// Everything a session is assembled from.
#[derive(Debug)]
pub struct SessionParts {
    pub catalog: TypeCatalog,
    pub prefabs: PrefabCatalog,
    pub streamer: Box<dyn SceneStreaming>,
    pub scenes: SceneBook,
    pub collaborators: Collaborators,
    /// Scenes loaded on start and after a reset; never streamed out.
    pub initial_scenes: Vec<SceneId>,
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    world: World,
    registry: ObjectRegistry,
    memories: MemoryBook,
    settings: SettingsBook,
    timeline: Timeline,
    driver: RewindDriver,
    pending: PendingCreations,
    catalog: TypeCatalog,
    prefabs: PrefabCatalog,
    streamer: Box<dyn SceneStreaming>,
    scenes: SceneBook,
    collab: Collaborators,
    observers: ObserverList<RewindEvent>,
    initial_scenes: Vec<SceneId>,
    pause_for_loading: Option<SceneId>,
    ghosts_shown: bool,
}

impl Session {
    pub fn new(config: SessionConfig, parts: SessionParts) -> Self {
        let mut world = World::default();
        if let Some(max_id) = parts.streamer.max_authored_id() {
            world.reserve_ids_through(max_id);
        }
        Self {
            driver: RewindDriver::new(config.rewind),
            config,
            world,
            registry: ObjectRegistry::default(),
            memories: MemoryBook::default(),
            settings: SettingsBook::default(),
            timeline: Timeline::default(),
            pending: PendingCreations::default(),
            catalog: parts.catalog,
            prefabs: parts.prefabs,
            streamer: parts.streamer,
            scenes: parts.scenes,
            collab: parts.collaborators,
            observers: ObserverList::default(),
            initial_scenes: parts.initial_scenes,
            pause_for_loading: None,
            ghosts_shown: false,
        }
    }

    /// Requests the initial scenes and, outside demo mode, restores the
    /// canonical save file. Returns `true` when a save was restored.
    pub fn start(&mut self) -> Result<bool, SessionError> {
        for scene in self.initial_scenes.clone() {
            self.streamer.request_load(scene);
        }
        if self.config.save.demo_mode {
            info!("demo_mode_skips_save_load");
            return Ok(false);
        }
        self.load_from_file()
    }

    /// One fixed tick: finish scene streaming and pending creations, stream
    /// chunks around the player, then take a rewind step if one is due.
    pub fn update(&mut self, dt: Duration) -> Result<(), SessionError> {
        let events = self.streamer.poll(&mut self.world);
        for event in events {
            self.handle_scene_event(event)?;
        }
        self.pump_pending()?;

        if !self.is_rewinding() {
            self.check_scenes();
            return Ok(());
        }
        if self.driver.tick(dt) {
            let current = self.current().ok_or(TimelineError::Empty)?;
            let next = GameStateId(current.0.saturating_sub(1));
            debug!(from = current.0, to = next.0, "rewind_step");
            self.load(next)?;
        }
        Ok(())
    }

    fn pump_pending(&mut self) -> Result<(), SessionError> {
        if self.pending.is_empty() && !self.pending.has_deferred() {
            return Ok(());
        }
        let report = self.pending.pump(
            &mut self.world,
            self.streamer.as_ref(),
            &self.catalog,
            &self.prefabs,
        )?;
        for id in &report.created {
            if !self.registry.contains(*id) {
                self.registry.add(&self.world, *id)?;
            }
        }
        for action in report.deferred {
            match action {
                DeferredAction::RefreshRegistry => self.refresh()?,
            }
        }
        Ok(())
    }

    /// Snapshots every tracked entity and appends the result. A rewind in
    /// progress stops at the current state first.
    pub fn save(&mut self) -> Result<GameStateId, SessionError> {
        if self.driver.is_rewinding() {
            let current = self.current().ok_or(TimelineError::Empty)?;
            info!(current = current.0, "rewind_stopped_by_save");
            self.timeline.set_target(current)?;
            self.finish_rewind()?;
        }
        self.clean_registry()?;
        let world = &self.world;
        let registry = &self.registry;
        let id = self.timeline.save_with(|id| {
            GameState::capture(id, registry.tracked().filter_map(|object| world.get(object)))
        })?;

        let streamer = &self.streamer;
        self.scenes
            .update_forward(id, |scene| streamer.is_loaded(scene));
        if self.ghosts_shown {
            self.show_player_ghosts(true);
        }
        let object_count = self.timeline.get(id).map_or(0, |state| state.states.len());
        info!(game_state = id.0, object_count, "game_state_saved");
        self.observers.notify(&RewindEvent::GameStateSaved { id });
        Ok(id)
    }

    /// Drops registry entries whose entity vanished from the world.
    fn clean_registry(&mut self) -> Result<(), SessionError> {
        let stale: Vec<ObjectId> = self
            .registry
            .tracked()
            .filter(|id| !self.world.contains(*id))
            .collect();
        for id in stale {
            warn!(object_id = id.0, "registry_entry_cleaned");
            self.registry.remove(id)?;
        }
        Ok(())
    }

    /// Jumps to state `requested` (clamped to the newest state), cutting off
    /// every later state.
    ///
    /// Type tags are checked before anything changes. Spawned entities the
    /// state does not know about are destroyed before the state is applied;
    /// entities that are missing but whose scene is loading are created on a
    /// later tick.
    pub fn load(&mut self, requested: GameStateId) -> Result<(), SessionError> {
        let id = self.timeline.clamp(requested)?;
        let state = self
            .timeline
            .get(id)
            .ok_or(TimelineError::UnknownState { id })?;
        state.validate(&self.catalog)?;
        for snapshot in &state.states {
            match self.world.get(snapshot.object_id) {
                Some(entity) => snapshot.check(entity, &self.catalog)?,
                None => snapshot.check_fields(&self.catalog)?,
            }
        }

        let doomed: Vec<ObjectId> = self
            .registry
            .tracked()
            .filter(|object| !state.contains(*object))
            .filter(|object| self.world.get(*object).is_some_and(Entity::is_spawned))
            .collect();
        for object in &doomed {
            self.registry.destroy(&mut self.world, *object);
        }
        let stale_pending: Vec<ObjectId> = self
            .pending
            .ids()
            .filter(|object| !state.contains(*object))
            .collect();
        for object in stale_pending {
            self.pending.cancel(object);
        }

        let mut restored = 0usize;
        let mut deferred = 0usize;
        for snapshot in state.load_order() {
            match self.world.get_mut(snapshot.object_id) {
                Some(entity) => {
                    snapshot.restore(entity, &self.catalog)?;
                    if !snapshot.active {
                        self.registry.forget(&mut self.world, snapshot.object_id)?;
                    }
                    restored += 1;
                }
                None => {
                    let scene = snapshot.scene;
                    if self.streamer.is_loaded(scene) || self.streamer.is_loading(scene) {
                        self.pending.request(id, snapshot);
                        deferred += 1;
                    }
                }
            }
        }

        let pruned = self.timeline.prune_after(id);
        let pruned_count = pruned.len();
        for removed in pruned {
            if let Some(ghost) = removed.representation {
                self.collab.ghosts.destroy_ghost(ghost);
            }
        }
        self.timeline.set_current(id)?;
        if self.timeline.target().map_or(true, |target| target > id) {
            self.timeline.set_target(id)?;
        }
        debug!(
            game_state = id.0,
            restored,
            deferred,
            destroyed = doomed.len(),
            pruned = pruned_count,
            "game_state_loaded"
        );

        if self.timeline.target() == Some(id) {
            self.finish_rewind()?;
        }
        if self.ghosts_shown {
            self.show_player_ghosts(true);
        }
        Ok(())
    }

    /// Restores each entity from the newest state at or before `upto` that
    /// mentions it. Entities with no record are left alone. Returns how many
    /// were restored.
    pub fn load_objects(
        &mut self,
        ids: &[ObjectId],
        upto: GameStateId,
    ) -> Result<usize, SessionError> {
        let Some(newest) = self.timeline.newest_id() else {
            return Ok(0);
        };
        let upto = upto.min(newest);
        let states = &self.timeline.states()[..=upto.index()];
        let mut matched = Vec::new();
        for id in ids {
            let Some(entity) = self.world.get(*id) else {
                continue;
            };
            let Some(snapshot) = states.iter().rev().find_map(|state| state.get(*id)) else {
                continue;
            };
            snapshot.check(entity, &self.catalog)?;
            matched.push(snapshot);
        }
        for snapshot in &matched {
            if let Some(entity) = self.world.get_mut(snapshot.object_id) {
                snapshot.restore(entity, &self.catalog)?;
            }
        }
        Ok(matched.len())
    }

    /// Starts rewinding `count` states back. Scripted rewinds cannot be
    /// interrupted by the player.
    pub fn rewind(&mut self, count: u32) -> Result<(), SessionError> {
        let current = self.current().ok_or(TimelineError::Empty)?;
        self.rewind_to(GameStateId(current.0.saturating_sub(count)), false)
    }

    pub fn rewind_to_start(&mut self, player_initiated: bool) -> Result<(), SessionError> {
        self.rewind_to(GameStateId(0), player_initiated)
    }

    /// Sets the rewind target. Loading is left to [`Self::update`]. A target
    /// at or after the current state does nothing.
    pub fn rewind_to(
        &mut self,
        target: GameStateId,
        player_initiated: bool,
    ) -> Result<(), SessionError> {
        let current = self.current().ok_or(TimelineError::Empty)?;
        if target >= current {
            debug!(current = current.0, target = target.0, "rewind_ignored");
            return Ok(());
        }
        self.timeline.set_target(target)?;

        let step_count = current.0 - target.0;
        let step_delay = self.driver.begin(step_count, player_initiated);
        self.collab.playback = PlaybackRate::Rewind;
        for scene in self.scenes.scenes_for_rewind(self.timeline.states(), target) {
            if self.streamer.request_load(scene) {
                debug!(scene = scene.0, "rewind_scene_requested");
            }
        }
        self.collab.physics.surrogate_enabled = true;
        self.collab.time.set_pause(PauseOwner::Rewind, true);

        info!(
            from = current.0,
            target = target.0,
            step_count,
            step_delay_ms = step_delay.as_secs_f64() * 1000.0,
            interruptible = player_initiated,
            "rewind_started"
        );
        self.observers.notify(&RewindEvent::RewindStarted {
            from: current,
            target,
            step_count,
        });
        Ok(())
    }

    /// Stops at the current state and reloads it so the world is reconciled.
    pub fn cancel_rewind(&mut self) -> Result<(), SessionError> {
        let current = self.current().ok_or(TimelineError::Empty)?;
        self.timeline.set_target(current)?;
        self.finish_rewind()?;
        self.load(current)
    }

    /// Cancels only rewinds the player started. Returns whether it did.
    pub fn cancel_rewind_by_player(&mut self) -> Result<bool, SessionError> {
        if !self.driver.is_interruptible() {
            return Ok(false);
        }
        self.cancel_rewind()?;
        Ok(true)
    }

    /// Wraps up a load that reached the rewind target: re-clamps scene
    /// bookkeeping and refreshes the registry once pending creations are
    /// done. Rewind-only effects are undone only if a rewind was running.
    fn finish_rewind(&mut self) -> Result<(), SessionError> {
        let current = self.current().ok_or(TimelineError::Empty)?;
        if self.pending.is_empty() {
            self.refresh()?;
        } else {
            self.pending.when_all_created(DeferredAction::RefreshRegistry);
        }
        self.scenes.update_backward(current);

        if !self.driver.is_rewinding() {
            return Ok(());
        }
        self.driver.finish();
        self.collab.playback = PlaybackRate::Normal;
        self.collab.time.set_pause(PauseOwner::Rewind, false);
        self.collab.physics.surrogate_enabled = false;
        info!(current = current.0, "rewind_finished");
        self.observers
            .notify(&RewindEvent::RewindFinished { current });
        Ok(())
    }

    /// Rebuilds the registry from the world and syncs memories.
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        self.registry.refresh(&self.world)?;
        self.memories.sync(&mut self.world);
        Ok(())
    }

    pub fn add_object(&mut self, id: ObjectId) -> Result<(), SessionError> {
        Ok(self.registry.add(&self.world, id)?)
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Result<(), SessionError> {
        Ok(self.registry.remove(id)?)
    }

    pub fn destroy_object(&mut self, id: ObjectId) -> Option<Entity> {
        self.registry.destroy(&mut self.world, id)
    }

    /// Spawns a prefab instance at `position` and starts tracking it.
    pub fn spawn(
        &mut self,
        prefab: &str,
        position: Vec2,
        scene: SceneId,
    ) -> Result<ObjectId, SessionError> {
        let id = self.world.allocate_id();
        let mut entity = self
            .prefabs
            .instantiate(prefab, &format!("_{}", id.0), id, scene)?;
        entity.transform.position = position.into();
        self.world.insert(entity);
        self.registry.add(&self.world, id)?;
        debug!(object_id = id.0, prefab, "entity_spawned");
        Ok(id)
    }

    pub fn forget(&mut self, id: ObjectId) -> Result<(), SessionError> {
        Ok(self.registry.forget(&mut self.world, id)?)
    }

    pub fn remember(&mut self, id: ObjectId) -> Result<(), SessionError> {
        Ok(self.registry.remember(&mut self.world, id)?)
    }

    pub fn save_memory(&mut self, id: ObjectId) -> Result<(), SessionError> {
        if self.memories.save(&self.world, id) {
            Ok(())
        } else {
            Err(SessionError::UnknownEntity { id })
        }
    }

    pub fn memory(&self, id: ObjectId) -> Option<MemoryObject> {
        self.memories.get(id)
    }

    /// Position of the player in the state before the current one.
    pub fn latest_safe_rewind_position(&self) -> Option<Vec2> {
        let current = self.current()?;
        let previous = current.0.checked_sub(1)?;
        self.timeline
            .get(GameStateId(previous))
            .and_then(GameState::player)
            .map(|player| player.position2())
    }

    pub fn is_rewinding(&self) -> bool {
        self.driver.is_rewinding()
    }

    pub fn is_rewind_interruptible(&self) -> bool {
        self.driver.is_interruptible()
    }

    pub fn rewind_step_delay(&self) -> Option<Duration> {
        self.driver.step_delay()
    }

    pub fn current(&self) -> Option<GameStateId> {
        self.timeline.current()
    }

    pub fn target(&self) -> Option<GameStateId> {
        self.timeline.target()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn scenes(&self) -> &SceneBook {
        &self.scenes
    }

    pub fn streamer(&self) -> &dyn SceneStreaming {
        self.streamer.as_ref()
    }

    pub fn streamer_mut(&mut self) -> &mut dyn SceneStreaming {
        self.streamer.as_mut()
    }

    pub fn pending(&self) -> &PendingCreations {
        &self.pending
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    pub fn collaborators_mut(&mut self) -> &mut Collaborators {
        &mut self.collab
    }

    pub fn observers_mut(&mut self) -> &mut ObserverList<RewindEvent> {
        &mut self.observers
    }

    pub fn settings(&self) -> &SettingsBook {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsBook {
        &mut self.settings
    }
}
