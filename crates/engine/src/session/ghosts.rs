use tracing::debug;

use super::{Session, SessionError};
use crate::math::Vec2;
use crate::snapshot::{GameState, GameStateId};

/// Opacity of a ghost `age` states older than the current one.
pub fn ghost_alpha(age: u32) -> f32 {
    if age < 10 {
        1.0
    } else if age < 100 {
        0.9
    } else {
        0.5
    }
}

/// What a tap on the player ghosts led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Missed,
    Reloaded(GameStateId),
    RewindTo(GameStateId),
}

impl Session {
    /// Shows every state's ghost, faded by age, or hides them all. Ghosts
    /// are created the first time they are shown.
    pub fn show_player_ghosts(&mut self, show: bool) {
        self.ghosts_shown = show;
        let current = self.current().map_or(0, |id| id.0);
        for state in self.timeline.states_mut() {
            if !show {
                if let Some(ghost) = state.representation {
                    self.collab.ghosts.update_ghost(ghost, false, 1.0);
                }
                continue;
            }
            let ghost = match state.representation {
                Some(ghost) => ghost,
                None => {
                    let Some(position) = state.player().map(|player| player.position2()) else {
                        continue;
                    };
                    let ghost = self.collab.ghosts.spawn_ghost(state.id, position);
                    state.representation = Some(ghost);
                    ghost
                }
            };
            let age = current.saturating_sub(state.id.0);
            self.collab.ghosts.update_ghost(ghost, true, ghost_alpha(age));
        }
    }

    pub fn ghosts_shown(&self) -> bool {
        self.ghosts_shown
    }

    /// The state whose player ghost is nearest to `position`.
    pub fn closest_player_ghost(&self, position: Vec2) -> Option<GameStateId> {
        self.timeline
            .states()
            .iter()
            .filter_map(|state| Some((state.id, state.player()?.position2().distance(position))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Picks a point in history from a tap at `position`.
    ///
    /// The newest ghost under the tap wins. Tapping the current state's ghost
    /// selects the one beneath it, or reloads the current state when there
    /// is none. A tight pass runs first and a wider one only if it misses.
    pub fn process_tap(&mut self, position: Vec2) -> Result<TapOutcome, SessionError> {
        let radius = self.config.ghost_tap_radius;
        let (mut picked, mut previous) = pick_ghosts(self.timeline.states(), position, radius);
        if picked.is_none() {
            (picked, previous) = pick_ghosts(self.timeline.states(), position, radius * 2.0);
        }
        let Some(picked) = picked else {
            return Ok(TapOutcome::Missed);
        };
        debug!(picked = picked.0, previous = previous.map(|id| id.0), "ghost_tapped");

        if Some(picked) != self.current() {
            self.rewind_to(picked, true)?;
            return Ok(TapOutcome::RewindTo(picked));
        }
        match previous {
            Some(previous) => {
                self.rewind_to(previous, true)?;
                Ok(TapOutcome::RewindTo(previous))
            }
            None => {
                self.load(picked)?;
                Ok(TapOutcome::Reloaded(picked))
            }
        }
    }
}

/// Newest and second-newest states whose player lies within `radius`.
fn pick_ghosts(
    states: &[GameState],
    position: Vec2,
    radius: f32,
) -> (Option<GameStateId>, Option<GameStateId>) {
    let mut hits = states
        .iter()
        .filter(|state| {
            state
                .player()
                .is_some_and(|player| player.position2().distance(position) <= radius)
        })
        .map(|state| state.id)
        .rev();
    (hits.next(), hits.next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_fades_with_age() {
        assert_eq!(ghost_alpha(0), 1.0);
        assert_eq!(ghost_alpha(9), 1.0);
        assert_eq!(ghost_alpha(10), 0.9);
        assert_eq!(ghost_alpha(99), 0.9);
        assert_eq!(ghost_alpha(100), 0.5);
    }
}
