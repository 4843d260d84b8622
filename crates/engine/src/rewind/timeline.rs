use thiserror::Error;

use crate::snapshot::{GameState, GameStateId, GameStateIdAllocator};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("timeline has no game states")]
    Empty,
    #[error("game state {id:?} is not in the timeline")]
    UnknownState { id: GameStateId },
}

/// The ordered game states plus the current and rewind-target positions.
///
/// A state's id always equals its index: saving appends `len()` and loading
/// state `i` cuts the timeline back to `i + 1` entries.
#[derive(Debug, Default)]
pub struct Timeline {
    states: Vec<GameState>,
    ids: GameStateIdAllocator,
    current: Option<GameStateId>,
    target: Option<GameStateId>,
}

impl Timeline {
    /// Appends the state built by `capture`. Nothing changes if `capture`
    /// fails.
    pub fn save_with<E>(
        &mut self,
        capture: impl FnOnce(GameStateId) -> Result<GameState, E>,
    ) -> Result<GameStateId, E> {
        let id = self.ids.peek();
        let state = capture(id)?;
        self.ids.allocate();
        self.states.push(state);
        self.current = Some(id);
        self.target = Some(id);
        Ok(id)
    }

    /// Clamps `id` to the newest state.
    pub fn clamp(&self, id: GameStateId) -> Result<GameStateId, TimelineError> {
        let newest = self.newest_id().ok_or(TimelineError::Empty)?;
        Ok(id.min(newest))
    }

    /// Removes every state after `id` and returns them oldest first. The id
    /// counter restarts at `id + 1`.
    pub fn prune_after(&mut self, id: GameStateId) -> Vec<GameState> {
        let keep = id.index().saturating_add(1).min(self.states.len());
        let pruned = self.states.split_off(keep);
        self.ids.reset_to(id.0.saturating_add(1));
        pruned
    }

    pub fn set_current(&mut self, id: GameStateId) -> Result<(), TimelineError> {
        if self.get(id).is_none() {
            return Err(TimelineError::UnknownState { id });
        }
        self.current = Some(id);
        Ok(())
    }

    pub fn set_target(&mut self, id: GameStateId) -> Result<(), TimelineError> {
        if self.get(id).is_none() {
            return Err(TimelineError::UnknownState { id });
        }
        self.target = Some(id);
        Ok(())
    }

    pub fn current(&self) -> Option<GameStateId> {
        self.current
    }

    pub fn target(&self) -> Option<GameStateId> {
        self.target
    }

    pub fn get(&self, id: GameStateId) -> Option<&GameState> {
        self.states.get(id.index()).filter(|state| state.id == id)
    }

    pub fn states(&self) -> &[GameState] {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut [GameState] {
        &mut self.states
    }

    pub fn newest_id(&self) -> Option<GameStateId> {
        self.states.last().map(|state| state.id)
    }

    pub fn next_id(&self) -> GameStateId {
        self.ids.peek()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drops every state and restarts ids at zero.
    pub fn clear(&mut self) -> Vec<GameState> {
        self.ids.reset_to(0);
        self.current = None;
        self.target = None;
        std::mem::take(&mut self.states)
    }

    /// Installs states read back from a save file; ids must already match
    /// their positions.
    pub fn replace_states(&mut self, states: Vec<GameState>) -> Vec<GameState> {
        let previous = std::mem::replace(&mut self.states, states);
        let newest = self.newest_id();
        self.current = newest;
        self.target = newest;
        self.ids
            .reset_to(newest.map_or(0, |id| id.0.saturating_add(1)));
        previous
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn save_empty(timeline: &mut Timeline) -> GameStateId {
        timeline
            .save_with(|id| Ok::<_, Infallible>(GameState::new(id, Vec::new())))
            .expect("save")
    }

    #[test]
    fn save_advances_current_and_target_together() {
        let mut timeline = Timeline::default();
        assert_eq!(save_empty(&mut timeline), GameStateId(0));
        assert_eq!(save_empty(&mut timeline), GameStateId(1));
        assert_eq!(timeline.current(), Some(GameStateId(1)));
        assert_eq!(timeline.target(), Some(GameStateId(1)));
    }

    #[test]
    fn failed_capture_leaves_timeline_untouched() {
        let mut timeline = Timeline::default();
        save_empty(&mut timeline);
        let result = timeline.save_with(|_| Err("boom"));
        assert_eq!(result, Err("boom"));
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.next_id(), GameStateId(1));
    }

    #[test]
    fn prune_restarts_ids_after_kept_state() {
        let mut timeline = Timeline::default();
        for _ in 0..5 {
            save_empty(&mut timeline);
        }
        let pruned = timeline.prune_after(GameStateId(2));
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned[0].id, GameStateId(3));
        assert_eq!(timeline.len(), 3);
        assert_eq!(save_empty(&mut timeline), GameStateId(3));
    }

    #[test]
    fn clamp_limits_to_newest_state() {
        let mut timeline = Timeline::default();
        assert_eq!(timeline.clamp(GameStateId(4)), Err(TimelineError::Empty));
        save_empty(&mut timeline);
        save_empty(&mut timeline);
        assert_eq!(timeline.clamp(GameStateId(9)), Ok(GameStateId(1)));
    }

    #[test]
    fn target_must_name_an_existing_state() {
        let mut timeline = Timeline::default();
        for _ in 0..3 {
            save_empty(&mut timeline);
        }
        timeline.set_target(GameStateId(0)).expect("target");
        assert_eq!(timeline.target(), Some(GameStateId(0)));
        assert_eq!(
            timeline.set_target(GameStateId(7)),
            Err(TimelineError::UnknownState { id: GameStateId(7) })
        );
    }
}
