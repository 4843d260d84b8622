use std::path::PathBuf;

use tracing::{info, warn};

use super::{Session, SessionError};
use crate::collab::{PauseOwner, PlaybackRate};
use crate::persistence::{delete_save, read_save, write_save, SaveBody, SettingsBook};
use crate::world::MemoryBook;

impl Session {
    /// Writes memories, states, scene ranges and settings to disk.
    pub fn save_to_file(&self) -> Result<PathBuf, SessionError> {
        let body = SaveBody {
            memories: self.memories.to_entries(),
            states: self.timeline.states().to_vec(),
            scenes: self.scenes.records(),
            settings: self.settings.to_entries(),
        };
        let path = self.config.save.write_path();
        write_save(&path, &body)?;
        Ok(path)
    }

    /// Restores the canonical save file and loads its newest state. A file
    /// that fails to read or validate is deleted and the game restarts
    /// fresh; that case returns `Ok(false)` like a missing file.
    pub fn load_from_file(&mut self) -> Result<bool, SessionError> {
        let path = self.config.save.canonical_path();
        let body = match read_save(&path, &self.catalog) {
            Ok(Some(body)) => body,
            Ok(None) => return Ok(false),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "save_file_discarded");
                delete_save(&path)?;
                self.reset_game(false)?;
                return Ok(false);
            }
        };

        self.memories = MemoryBook::from_entries(&body.memories);
        self.settings = SettingsBook::from_entries(&body.settings);
        self.scenes.apply_records(&body.scenes);
        let state_count = body.states.len();
        for previous in self.timeline.replace_states(body.states) {
            if let Some(ghost) = previous.representation {
                self.collab.ghosts.destroy_ghost(ghost);
            }
        }
        if let Some(newest) = self.timeline.newest_id() {
            self.load(newest)?;
        }
        self.memories.apply(&mut self.world);
        info!(path = %path.display(), state_count, "save_file_loaded");
        Ok(true)
    }

    /// Snapshots the present and writes it out; call when the app quits or
    /// is sent to the background.
    pub fn on_suspend(&mut self) -> Result<PathBuf, SessionError> {
        self.save()?;
        self.save_to_file()
    }

    pub fn on_quit(&mut self) -> Result<PathBuf, SessionError> {
        self.on_suspend()
    }

    /// Starts over from an empty timeline with the initial scenes reloaded.
    /// With `save_previous`, the abandoned run is saved to disk first.
    pub fn reset_game(&mut self, save_previous: bool) -> Result<(), SessionError> {
        if save_previous {
            self.on_suspend()?;
        }
        self.streamer.unload_all(&mut self.world);
        self.world.clear();
        self.registry.clear();
        self.memories.clear();
        self.pending.clear();
        self.scenes.reset();
        for state in self.timeline.clear() {
            if let Some(ghost) = state.representation {
                self.collab.ghosts.destroy_ghost(ghost);
            }
        }
        self.driver.finish();
        self.collab.time.set_pause(PauseOwner::Rewind, false);
        self.collab.time.set_pause(PauseOwner::SceneLoading, false);
        self.collab.physics.surrogate_enabled = false;
        self.collab.playback = PlaybackRate::Normal;
        self.pause_for_loading = None;

        for scene in self.initial_scenes.clone() {
            self.streamer.request_load(scene);
        }
        info!(save_previous, "game_reset");
        Ok(())
    }
}
