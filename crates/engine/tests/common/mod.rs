#![allow(dead_code)]

use std::any::Any;
use std::path::Path;
use std::time::Duration;

use rewind_engine::{
    Body, ChunkStreamer, Collaborators, Entity, FieldMap, MemoryObject, ObjectId, PrefabCatalog,
    PrefabInstance, Rect, SavableComponent, SaveConfig, SceneBook, SceneId, SceneLoader, Session,
    SessionConfig, SessionParts, SnapshotError, Transform, TypeCatalog, Vec2,
};

pub const TICK: Duration = Duration::from_millis(16);

pub const PLAYER: ObjectId = ObjectId(1);
pub const ROCK: ObjectId = ObjectId(10);
pub const SIGN: ObjectId = ObjectId(11);
pub const LEVER: ObjectId = ObjectId(20);

/// Always loaded; holds the player.
pub const HOME: SceneId = SceneId(0);
/// Chunk covering x in [-10, 10].
pub const MEADOW: SceneId = SceneId(1);
/// Chunk covering x in [10.5, 30].
pub const CAVERN: SceneId = SceneId(2);

#[derive(Debug, Default)]
pub struct Lever {
    pub pulled: bool,
    pub pulls: i64,
}

impl SavableComponent for Lever {
    fn type_tag(&self) -> &'static str {
        "Lever"
    }

    fn capture(&self) -> Result<FieldMap, SnapshotError> {
        let mut fields = FieldMap::new();
        fields.insert("pulled", self.pulled)?;
        fields.insert("pulls", self.pulls)?;
        Ok(fields)
    }

    fn restore(&mut self, fields: &FieldMap) -> Result<(), SnapshotError> {
        self.pulled = fields.get("pulled")?;
        self.pulls = fields.get("pulls")?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Never registered in [`catalog`], so states holding it cannot be loaded.
#[derive(Debug, Default)]
pub struct Graffiti;

impl SavableComponent for Graffiti {
    fn type_tag(&self) -> &'static str {
        "Graffiti"
    }

    fn capture(&self) -> Result<FieldMap, SnapshotError> {
        Ok(FieldMap::new())
    }

    fn restore(&mut self, _fields: &FieldMap) -> Result<(), SnapshotError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::default();
    catalog
        .register("Lever", || Box::new(Lever::default()))
        .expect("register lever");
    catalog
}

fn streamer() -> ChunkStreamer {
    let mut streamer = ChunkStreamer::default();
    streamer.register_scene(HOME, "home", || {
        vec![Entity::new(PLAYER, "merky", HOME)
            .with_transform(Transform::at(Vec2::new(0.0, 0.0)))
            .with_body(Body::default())]
    });
    streamer.register_scene(MEADOW, "meadow", || {
        vec![
            Entity::new(ROCK, "rock", MEADOW)
                .with_transform(Transform::at(Vec2::new(-3.0, 0.0)))
                .with_body(Body::default()),
            Entity::new(SIGN, "sign", MEADOW)
                .with_body(Body::default())
                .with_memory(MemoryObject::default()),
        ]
    });
    streamer.register_scene(CAVERN, "cavern", || {
        vec![Entity::new(LEVER, "lever", CAVERN)
            .with_transform(Transform::at(Vec2::new(20.0, 0.0)))
            .with_component(Box::new(Lever::default()))]
    });
    streamer
}

fn prefabs() -> PrefabCatalog {
    let mut prefabs = PrefabCatalog::default();
    prefabs
        .register("crate", || PrefabInstance {
            body: Some(Body::default()),
            components: Vec::new(),
        })
        .expect("register crate");
    prefabs
}

pub fn scene_book() -> SceneBook {
    SceneBook::new(vec![
        SceneLoader::new(
            MEADOW,
            "meadow",
            Rect::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0)),
        ),
        SceneLoader::new(
            CAVERN,
            "cavern",
            Rect::new(Vec2::new(10.5, -10.0), Vec2::new(30.0, 10.0)),
        ),
    ])
}

pub fn config(save_dir: &Path) -> SessionConfig {
    SessionConfig {
        save: SaveConfig::with_dir(save_dir),
        ..SessionConfig::default()
    }
}

pub fn new_session(save_dir: &Path) -> Session {
    new_session_with(config(save_dir))
}

pub fn new_session_with(config: SessionConfig) -> Session {
    Session::new(
        config,
        SessionParts {
            catalog: catalog(),
            prefabs: prefabs(),
            streamer: Box::new(streamer()),
            scenes: scene_book(),
            collaborators: Collaborators::default(),
            initial_scenes: vec![HOME],
        },
    )
}

pub fn tick(session: &mut Session, count: usize) {
    for _ in 0..count {
        session.update(TICK).expect("update");
    }
}

/// Starts a session with no save file and lets the home scene and the
/// meadow stream in. State 0 is taken when home finishes loading.
pub fn boot(save_dir: &Path) -> Session {
    let mut session = new_session(save_dir);
    assert!(!session.start().expect("start"));
    tick(&mut session, 2);
    session
}

pub fn position_of(session: &Session, id: ObjectId) -> Vec2 {
    session.world().get(id).expect("entity").position()
}

pub fn move_to(session: &mut Session, id: ObjectId, position: Vec2) {
    session
        .world_mut()
        .get_mut(id)
        .expect("entity")
        .transform
        .position = position.into();
}

/// Moves the player and lets chunk streaming settle.
pub fn walk_player(session: &mut Session, position: Vec2) {
    move_to(session, PLAYER, position);
    tick(session, 2);
}
