use serde::{Deserialize, Serialize};

use crate::math::{Rect, Vec2};
use crate::snapshot::{GameState, GameStateId};
use crate::world::SceneId;

/// One streamable chunk of the level and the range of game states during
/// which it was known to be open.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLoader {
    pub scene: SceneId,
    pub name: String,
    pub bounds: Rect,
    pub first_open: Option<GameStateId>,
    pub last_open: Option<GameStateId>,
}

impl SceneLoader {
    pub fn new(scene: SceneId, name: impl Into<String>, bounds: Rect) -> Self {
        Self {
            scene,
            name: name.into(),
            bounds,
            first_open: None,
            last_open: None,
        }
    }

    pub fn is_position_in_scene(&self, position: Vec2) -> bool {
        self.bounds.contains(position)
    }

    fn forget_history(&mut self) {
        self.first_open = None;
        self.last_open = None;
    }
}

/// Persisted open-range bookkeeping for one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub scene: SceneId,
    pub first_open: Option<GameStateId>,
    pub last_open: Option<GameStateId>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SceneBook {
    loaders: Vec<SceneLoader>,
}

impl SceneBook {
    pub fn new(loaders: Vec<SceneLoader>) -> Self {
        Self { loaders }
    }

    pub fn loaders(&self) -> &[SceneLoader] {
        &self.loaders
    }

    pub fn get(&self, scene: SceneId) -> Option<&SceneLoader> {
        self.loaders.iter().find(|loader| loader.scene == scene)
    }

    pub fn contains(&self, scene: SceneId) -> bool {
        self.get(scene).is_some()
    }

    /// Marks every open scene as seen in `id`.
    pub fn update_forward(&mut self, id: GameStateId, is_open: impl Fn(SceneId) -> bool) {
        for loader in &mut self.loaders {
            if !is_open(loader.scene) {
                continue;
            }
            if loader.first_open.map_or(true, |first| first > id) {
                loader.first_open = Some(id);
            }
            loader.last_open = Some(id);
        }
    }

    /// Scenes the player passes through while rewinding from the newest
    /// state in `states` down to `target`. Open ranges are not consulted: a
    /// chunk the player stood in while it was still loading counts too.
    pub fn scenes_for_rewind(&self, states: &[GameState], target: GameStateId) -> Vec<SceneId> {
        let path: Vec<Vec2> = states
            .iter()
            .rev()
            .take_while(|state| state.id >= target)
            .filter_map(GameState::player)
            .map(|player| player.position2())
            .collect();
        self.loaders
            .iter()
            .filter(|loader| path.iter().any(|at| loader.is_position_in_scene(*at)))
            .map(|loader| loader.scene)
            .collect()
    }

    /// Clamps the open ranges after the timeline was cut back to `id`.
    pub fn update_backward(&mut self, id: GameStateId) {
        for loader in &mut self.loaders {
            if loader.last_open.is_some_and(|last| last > id) {
                loader.last_open = Some(id);
            }
            if loader.first_open.is_some_and(|first| first > id) {
                loader.forget_history();
            }
        }
    }

    /// The newest state a freshly loaded scene can be backfilled from.
    pub fn last_seen(&self, scene: SceneId, current: GameStateId) -> Option<GameStateId> {
        self.get(scene)
            .and_then(|loader| loader.last_open)
            .map(|last| last.min(current))
    }

    pub fn reset(&mut self) {
        for loader in &mut self.loaders {
            loader.forget_history();
        }
    }

    pub fn records(&self) -> Vec<SceneRecord> {
        self.loaders
            .iter()
            .map(|loader| SceneRecord {
                scene: loader.scene,
                first_open: loader.first_open,
                last_open: loader.last_open,
            })
            .collect()
    }

    /// Applies persisted ranges; records for unknown scenes are ignored.
    pub fn apply_records(&mut self, records: &[SceneRecord]) {
        for record in records {
            if let Some(loader) = self
                .loaders
                .iter_mut()
                .find(|loader| loader.scene == record.scene)
            {
                loader.first_open = record.first_open;
                loader.last_open = record.last_open;
            }
        }
    }
}
