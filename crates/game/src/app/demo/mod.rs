//! A small headless level that walks the player through two chunks, spawns
//! props, and rewinds once through a ghost tap.

mod components;

use std::time::Duration;

use rewind_engine::{
    Body, ChunkStreamer, Collaborators, Entity, GameLogic, LoopControl, MemoryObject, ObjectId,
    PauseOwner, PrefabCatalog, PrefabInstance, Rect, SceneBook, SceneId, SceneLoader, Session,
    SessionConfig, SessionError, SessionParts, SnapshotError, TapOutcome, Transform, TypeCatalog,
    Vec2, PLAYER_OBJECT_NAME,
};
use serde::Serialize;
use tracing::{debug, info};

pub(crate) use components::{CrackedPiece, LevelTimer, StickyPad};

pub(crate) const PLAYER: ObjectId = ObjectId(1);
pub(crate) const LEVEL_CLOCK: ObjectId = ObjectId(2);
pub(crate) const BOULDER: ObjectId = ObjectId(10);
pub(crate) const CRYSTAL: ObjectId = ObjectId(20);

pub(crate) const HOME: SceneId = SceneId(0);
pub(crate) const MEADOW: SceneId = SceneId(1);
pub(crate) const CAVERN: SceneId = SceneId(2);

const CAVERN_START_X: f32 = 10.5;
const LEVEL_END_X: f32 = 28.0;

pub(crate) fn type_catalog() -> Result<TypeCatalog, SnapshotError> {
    let mut catalog = TypeCatalog::default();
    catalog.register(StickyPad::TAG, || Box::new(StickyPad::default()))?;
    catalog.register(CrackedPiece::TAG, || Box::new(CrackedPiece::default()))?;
    catalog.register(LevelTimer::TAG, || Box::new(LevelTimer::default()))?;
    Ok(catalog)
}

fn prefab_catalog() -> Result<PrefabCatalog, SnapshotError> {
    let mut prefabs = PrefabCatalog::default();
    prefabs.register("crate", || PrefabInstance {
        body: Some(Body::default()),
        components: Vec::new(),
    })?;
    prefabs.register("sticky_pad", || PrefabInstance {
        body: None,
        components: vec![Box::new(StickyPad::default())],
    })?;
    prefabs.register("cracked_ground", || PrefabInstance {
        body: Some(Body::default()),
        components: vec![Box::new(CrackedPiece::default())],
    })?;
    Ok(prefabs)
}

fn streamer() -> ChunkStreamer {
    let mut streamer = ChunkStreamer::default();
    streamer.register_scene(HOME, "player_scene", || {
        vec![
            Entity::new(PLAYER, PLAYER_OBJECT_NAME, HOME)
                .with_transform(Transform::at(Vec2::new(-8.0, 0.0)))
                .with_body(Body::default()),
            Entity::new(LEVEL_CLOCK, "level_clock", HOME)
                .with_component(Box::new(LevelTimer::default())),
        ]
    });
    streamer.register_scene(MEADOW, "meadow", || {
        vec![Entity::new(BOULDER, "boulder", MEADOW)
            .with_transform(Transform::at(Vec2::new(4.0, 1.0)))
            .with_body(Body::default())]
    });
    streamer.register_scene(CAVERN, "cavern", || {
        vec![Entity::new(CRYSTAL, "crystal", CAVERN)
            .with_transform(Transform::at(Vec2::new(18.0, 2.0)))
            .with_body(Body::default())
            .with_memory(MemoryObject::default())]
    });
    streamer
}

fn scene_book() -> SceneBook {
    SceneBook::new(vec![
        SceneLoader::new(
            MEADOW,
            "meadow",
            Rect::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0)),
        ),
        SceneLoader::new(
            CAVERN,
            "cavern",
            Rect::new(Vec2::new(CAVERN_START_X, -10.0), Vec2::new(30.0, 10.0)),
        ),
    ])
}

pub(crate) fn build_session(config: SessionConfig) -> Result<Session, SnapshotError> {
    Ok(Session::new(
        config,
        SessionParts {
            catalog: type_catalog()?,
            prefabs: prefab_catalog()?,
            streamer: Box::new(streamer()),
            scenes: scene_book(),
            collaborators: Collaborators::default(),
            initial_scenes: vec![HOME],
        },
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScriptConfig {
    pub(crate) walk_speed: f32,
    pub(crate) save_every_ticks: u64,
    pub(crate) spawn_crate_at_tick: u64,
    pub(crate) rewind_at_tick: u64,
    /// Where the player taps the ghost trail to rewind.
    pub(crate) rewind_tap: Vec2,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            walk_speed: 3.0,
            save_every_ticks: 30,
            spawn_crate_at_tick: 60,
            rewind_at_tick: 300,
            rewind_tap: Vec2::new(-5.0, 0.0),
        }
    }
}

/// What a scripted run did, logged once on shutdown.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub(crate) struct DemoReport {
    pub(crate) autosaves: u32,
    pub(crate) spawned: Vec<u64>,
    pub(crate) rewinds: u32,
    pub(crate) crystal_discovered: bool,
    pub(crate) reached_end: bool,
}

/// Scripted player: walks right, autosaves, drops a crate on a sticky pad,
/// cracks the ground and rewinds once by tapping an old ghost.
#[derive(Debug, Default)]
pub(crate) struct DemoScript {
    config: ScriptConfig,
    report: DemoReport,
    rewound: bool,
}

impl DemoScript {
    pub(crate) fn new(config: ScriptConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub(crate) fn report(&self) -> &DemoReport {
        &self.report
    }

    fn walk(&mut self, session: &mut Session, dt: Duration) {
        let step = self.config.walk_speed * dt.as_secs_f32();
        let Some(player) = session.world_mut().get_mut(PLAYER) else {
            return;
        };
        let next_x = (player.transform.position.x + step).min(LEVEL_END_X);
        player.transform.position.x = next_x;
        if let Some(body) = player.body.as_mut() {
            body.velocity = Vec2::new(self.config.walk_speed, 0.0);
        }
        if next_x >= LEVEL_END_X && !self.report.reached_end {
            self.report.reached_end = true;
            info!(x = next_x, "level_end_reached");
        }
        if let Some(timer) = session
            .world_mut()
            .get_mut(LEVEL_CLOCK)
            .and_then(|clock| clock.component_as_mut::<LevelTimer>())
        {
            timer.advance(dt.as_secs_f32());
        }
    }

    fn drop_crate_on_pad(&mut self, session: &mut Session) -> Result<(), SessionError> {
        let at = session
            .world()
            .get(PLAYER)
            .map(Entity::position)
            .unwrap_or(Vec2::ZERO);
        let scene = scene_at(at);
        let crate_id = session.spawn("crate", Vec2::new(at.x + 1.0, at.y), scene)?;
        let pad_id = session.spawn("sticky_pad", Vec2::new(at.x + 1.0, at.y - 0.5), scene)?;
        let crack_id = session.spawn("cracked_ground", Vec2::new(at.x + 2.0, at.y - 1.0), scene)?;

        let crate_name = session
            .world()
            .get(crate_id)
            .map(|entity| entity.name.clone())
            .ok_or(SessionError::UnknownEntity { id: crate_id })?;
        if let Some(pad) = session
            .world_mut()
            .get_mut(pad_id)
            .and_then(|entity| entity.component_as_mut::<StickyPad>())
        {
            if pad.stick(crate_name) {
                debug!(pad_id = pad_id.0, held = pad.len(), "sticky_pad_attached");
            }
        }
        if let Some(piece) = session
            .world_mut()
            .get_mut(crack_id)
            .and_then(|entity| entity.component_as_mut::<CrackedPiece>())
        {
            piece.cracked = true;
        }
        self.report.spawned.extend([crate_id.0, pad_id.0, crack_id.0]);
        info!(crate_id = crate_id.0, pad_id = pad_id.0, "props_spawned");
        Ok(())
    }

    fn check_discoveries(&mut self, session: &mut Session) -> Result<(), SessionError> {
        if self.report.crystal_discovered {
            return Ok(());
        }
        let Some(crystal) = session.world_mut().get_mut(CRYSTAL) else {
            return Ok(());
        };
        if let Some(memory) = crystal.memory.as_mut() {
            memory.discovered = true;
        }
        session.save_memory(CRYSTAL)?;
        self.report.crystal_discovered = true;
        info!("crystal_discovered");
        Ok(())
    }

    fn rewind_by_tap(&mut self, session: &mut Session) -> Result<(), SessionError> {
        session.show_player_ghosts(true);
        let tap = session
            .closest_player_ghost(self.config.rewind_tap)
            .and_then(|id| session.timeline().get(id))
            .and_then(|state| state.player())
            .map(|player| player.position2())
            .unwrap_or(self.config.rewind_tap);
        let outcome = session.process_tap(tap)?;
        session.show_player_ghosts(false);
        if matches!(outcome, TapOutcome::RewindTo(_)) {
            self.report.rewinds += 1;
        }
        self.rewound = true;
        info!(?outcome, "ghost_tap_processed");
        Ok(())
    }
}

impl GameLogic for DemoScript {
    fn tick(
        &mut self,
        session: &mut Session,
        tick: u64,
        dt: Duration,
    ) -> Result<LoopControl, SessionError> {
        if session.is_rewinding() {
            return Ok(LoopControl::Continue);
        }
        if session.collaborators().time.is_paused_by(PauseOwner::SceneLoading) {
            debug!(tick, "waiting_for_scene");
            return Ok(LoopControl::Continue);
        }

        self.walk(session, dt);
        if tick == self.config.spawn_crate_at_tick {
            self.drop_crate_on_pad(session)?;
        }
        if session.world().contains(CRYSTAL) {
            self.check_discoveries(session)?;
        }
        if tick == self.config.rewind_at_tick && !self.rewound {
            self.rewind_by_tap(session)?;
            return Ok(LoopControl::Continue);
        }
        if tick > 0 && tick % self.config.save_every_ticks.max(1) == 0 {
            session.save()?;
            self.report.autosaves += 1;
        }
        Ok(LoopControl::Continue)
    }
}

fn scene_at(position: Vec2) -> SceneId {
    if position.x >= CAVERN_START_X {
        CAVERN
    } else {
        MEADOW
    }
}
