//! Whole-timeline save files.

mod atomic_io;
mod hashing;
mod save_file;
mod settings;

pub use save_file::{
    delete_save, read_save, write_save, PersistenceError, SaveBody, SaveConfig, SAVE_VERSION,
};
pub use settings::{SettingObject, SettingsBook};
