use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod collab;
pub mod math;
pub mod persistence;
pub mod rewind;
pub mod session;
pub mod snapshot;
pub mod streaming;
pub mod world;

pub use app::{
    run_session, run_session_with_metrics, GameLogic, LoopConfig, LoopControl, LoopError,
    LoopMetricsSnapshot, LoopSummary, MetricsHandle,
};
pub use collab::{
    Collaborators, GhostId, GhostRenderer, GhostSprite, HeadlessGhosts, PauseOwner, PhysicsGate,
    PlaybackRate, TimeControl,
};
pub use math::{Quat, Rect, Vec2, Vec3};
pub use persistence::{PersistenceError, SaveBody, SaveConfig, SettingObject, SettingsBook};
pub use rewind::{RewindConfig, RewindEvent, RewindPhase, Timeline, TimelineError};
pub use session::{Session, SessionConfig, SessionError, SessionParts, TapOutcome};
pub use snapshot::{
    FieldMap, GameState, GameStateId, ObjectState, PrefabCatalog, PrefabInstance,
    SavableComponent, SavableObject, SavedValue, SnapshotError, TypeCatalog, PLAYER_OBJECT_NAME,
};
pub use streaming::{ChunkStreamer, SceneBook, SceneEvent, SceneLoader, SceneStreaming};
pub use world::{Body, Entity, MemoryObject, ObjectId, ObjectRegistry, SceneId, Transform, World};

pub const ROOT_ENV_VAR: &str = "REWIND_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub cache_dir: PathBuf,
    pub saves_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "REWIND_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and crates/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and crates/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/rewind\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_under(root)
}

fn app_paths_under(root: PathBuf) -> Result<AppPaths, StartupError> {
    let cache_dir = root.join("cache");
    let saves_dir = cache_dir.join("saves");

    fs::create_dir_all(&saves_dir).map_err(|source| StartupError::CreateSaveDir {
        path: saves_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        cache_dir,
        saves_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => root_from_override(Path::new(&value)),
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;
            find_root_above(exe_dir)
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn root_from_override(raw: &Path) -> Result<PathBuf, StartupError> {
    let root = normalize_path(raw);
    if is_repo_marker(&root) {
        Ok(root)
    } else {
        Err(StartupError::InvalidEnvRoot { path: root })
    }
}

fn find_root_above(start: &Path) -> Result<PathBuf, StartupError> {
    start
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
        .ok_or_else(|| StartupError::RootNotFound {
            start_dir: normalize_path(start),
            env_var: ROOT_ENV_VAR,
        })
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("crates").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
