//! Contracts for the systems the rewind engine drives but does not own:
//! time scale, the physics surrogate, music playback rate and ghost visuals.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::math::Vec2;
use crate::snapshot::GameStateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PauseOwner {
    Rewind,
    SceneLoading,
    Menu,
}

/// Pause requested independently by several owners; time runs only when no
/// owner holds a pause.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimeControl {
    holders: BTreeSet<PauseOwner>,
}

impl TimeControl {
    pub fn set_pause(&mut self, owner: PauseOwner, paused: bool) {
        if paused {
            self.holders.insert(owner);
        } else {
            self.holders.remove(&owner);
        }
    }

    pub fn is_paused(&self) -> bool {
        !self.holders.is_empty()
    }

    pub fn is_paused_by(&self, owner: PauseOwner) -> bool {
        self.holders.contains(&owner)
    }

    pub fn clear(&mut self) {
        self.holders.clear();
    }
}

/// While enabled, live physics integration is replaced by a surrogate so
/// entities can be teleported back in time without collisions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PhysicsGate {
    pub surrogate_enabled: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackRate {
    #[default]
    Normal,
    Rewind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GhostId(pub u64);

/// Draws the translucent player stand-ins used to pick a point in history.
pub trait GhostRenderer: fmt::Debug {
    fn spawn_ghost(&mut self, state: GameStateId, position: Vec2) -> GhostId;

    fn update_ghost(&mut self, ghost: GhostId, visible: bool, alpha: f32);

    fn destroy_ghost(&mut self, ghost: GhostId);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostSprite {
    pub state: GameStateId,
    pub position: Vec2,
    pub visible: bool,
    pub alpha: f32,
}

/// Renderer that keeps ghosts in memory; used by headless runs.
#[derive(Debug, Default)]
pub struct HeadlessGhosts {
    next: u64,
    sprites: BTreeMap<GhostId, GhostSprite>,
}

impl HeadlessGhosts {
    pub fn sprite(&self, ghost: GhostId) -> Option<&GhostSprite> {
        self.sprites.get(&ghost)
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.sprites.values().filter(|sprite| sprite.visible).count()
    }
}

impl GhostRenderer for HeadlessGhosts {
    fn spawn_ghost(&mut self, state: GameStateId, position: Vec2) -> GhostId {
        let ghost = GhostId(self.next);
        self.next = self.next.saturating_add(1);
        self.sprites.insert(
            ghost,
            GhostSprite {
                state,
                position,
                visible: false,
                alpha: 1.0,
            },
        );
        ghost
    }

    fn update_ghost(&mut self, ghost: GhostId, visible: bool, alpha: f32) {
        if let Some(sprite) = self.sprites.get_mut(&ghost) {
            sprite.visible = visible;
            sprite.alpha = alpha;
        }
    }

    fn destroy_ghost(&mut self, ghost: GhostId) {
        self.sprites.remove(&ghost);
    }
}

/// Everything the session drives on rewind phase changes.
#[derive(Debug)]
pub struct Collaborators {
    pub time: TimeControl,
    pub physics: PhysicsGate,
    pub playback: PlaybackRate,
    pub ghosts: Box<dyn GhostRenderer>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::with_ghosts(Box::<HeadlessGhosts>::default())
    }
}

impl Collaborators {
    pub fn with_ghosts(ghosts: Box<dyn GhostRenderer>) -> Self {
        Self {
            time: TimeControl::default(),
            physics: PhysicsGate::default(),
            playback: PlaybackRate::Normal,
            ghosts,
        }
    }
}
