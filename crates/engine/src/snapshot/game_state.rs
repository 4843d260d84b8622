use std::cell::OnceCell;

use serde::{Deserialize, Serialize};

use crate::collab::GhostId;
use crate::world::{Entity, ObjectId};

use super::catalog::TypeCatalog;
use super::object_state::ObjectState;
use super::SnapshotError;

pub const PLAYER_OBJECT_NAME: &str = "merky";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameStateId(pub u32);

impl GameStateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
pub struct GameStateIdAllocator {
    next: u32,
}

impl GameStateIdAllocator {
    pub fn allocate(&mut self) -> GameStateId {
        let id = GameStateId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    pub fn peek(&self) -> GameStateId {
        GameStateId(self.next)
    }

    pub fn reset_to(&mut self, next: u32) {
        self.next = next;
    }
}

/// A snapshot of every tracked entity at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub id: GameStateId,
    pub states: Vec<ObjectState>,
    #[serde(skip)]
    player: OnceCell<Option<usize>>,
    /// Ghost shown for this state, created on demand.
    #[serde(skip)]
    pub representation: Option<GhostId>,
}

impl GameState {
    pub fn new(id: GameStateId, states: Vec<ObjectState>) -> Self {
        Self {
            id,
            states,
            player: OnceCell::new(),
            representation: None,
        }
    }

    /// Captures every entity in iteration order. A capture error aborts the
    /// whole snapshot.
    pub fn capture<'a>(
        id: GameStateId,
        entities: impl IntoIterator<Item = &'a Entity>,
    ) -> Result<Self, SnapshotError> {
        let states = entities
            .into_iter()
            .map(ObjectState::capture)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(id, states))
    }

    /// The player's snapshot, looked up once and cached.
    pub fn player(&self) -> Option<&ObjectState> {
        let index = self.player.get_or_init(|| {
            self.states
                .iter()
                .position(|state| state.name == PLAYER_OBJECT_NAME)
        });
        index.and_then(|index| self.states.get(index))
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectState> {
        self.states.iter().find(|state| state.object_id == id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// States sorted by descending priority; ties keep capture order.
    pub fn load_order(&self) -> Vec<&ObjectState> {
        let mut ordered: Vec<&ObjectState> = self.states.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));
        ordered
    }

    pub fn validate(&self, catalog: &TypeCatalog) -> Result<(), SnapshotError> {
        for state in &self.states {
            state.validate(catalog)?;
        }
        Ok(())
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.states.iter().all(ObjectState::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::world::{Body, SceneId, Transform};

    #[test]
    fn allocator_ids_strictly_increase_until_reset() {
        let mut allocator = GameStateIdAllocator::default();
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert!(b > a);
        allocator.reset_to(1);
        assert_eq!(allocator.allocate(), GameStateId(1));
    }

    #[test]
    fn empty_capture_is_legal() {
        let state = GameState::capture(GameStateId(0), std::iter::empty()).expect("capture");
        assert!(state.states.is_empty());
        assert!(state.player().is_none());
    }

    #[test]
    fn player_lookup_finds_merky() {
        let merky = Entity::new(ObjectId(0), PLAYER_OBJECT_NAME, SceneId(0))
            .with_transform(Transform::at(Vec2::new(4.0, 1.0)))
            .with_body(Body::default());
        let rock = Entity::new(ObjectId(1), "rock", SceneId(0)).with_body(Body::default());
        let state = GameState::capture(GameStateId(3), [&rock, &merky]).expect("capture");

        let player = state.player().expect("player");
        assert_eq!(player.position2(), Vec2::new(4.0, 1.0));
        assert!(state.contains(ObjectId(1)));
    }

    #[test]
    fn load_order_prefers_higher_priority() {
        let mut low = ObjectState::capture(
            &Entity::new(ObjectId(1), "box", SceneId(0)).with_body(Body::default()),
        )
        .expect("capture");
        low.priority = 0;
        let mut high = low.clone();
        high.object_id = ObjectId(2);
        high.priority = 5;

        let state = GameState::new(GameStateId(0), vec![low, high]);
        let order: Vec<ObjectId> = state.load_order().iter().map(|s| s.object_id).collect();
        assert_eq!(order, vec![ObjectId(2), ObjectId(1)]);
    }

    #[test]
    fn player_cache_is_not_serialized() {
        let merky = Entity::new(ObjectId(0), PLAYER_OBJECT_NAME, SceneId(0)).with_body(Body::default());
        let state = GameState::capture(GameStateId(0), [&merky]).expect("capture");
        assert!(state.player().is_some());

        let json = serde_json::to_string(&state).expect("json");
        let decoded: GameState = serde_json::from_str(&json).expect("decode");
        assert_eq!(decoded.player().map(|p| p.object_id), Some(ObjectId(0)));
    }
}
