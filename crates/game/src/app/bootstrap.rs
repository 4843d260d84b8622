use rewind_engine::{
    resolve_app_paths, LoopConfig, SaveConfig, Session, SessionConfig, SnapshotError,
    StartupError,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::demo::{self, DemoScript, ScriptConfig};

const DEMO_MODE_ENV_VAR: &str = "REWIND_DEMO_MODE";
const MAX_TICKS_ENV_VAR: &str = "REWIND_MAX_TICKS";
const HEADLESS_ENV_VAR: &str = "REWIND_HEADLESS";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Paths(#[from] StartupError),
    #[error("failed to build the demo level: {0}")]
    Level(#[from] SnapshotError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) session: Session,
    pub(crate) script: DemoScript,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Rewind Demo Startup ===");

    let paths = resolve_app_paths()?;
    let save = SaveConfig {
        demo_mode: read_flag(DEMO_MODE_ENV_VAR),
        ..SaveConfig::with_dir(paths.saves_dir.clone())
    };
    info!(
        root = %paths.root.display(),
        saves_dir = %paths.saves_dir.display(),
        demo_mode = save.demo_mode,
        "app_paths_resolved"
    );

    let session = demo::build_session(SessionConfig {
        save,
        ..SessionConfig::default()
    })?;
    let config = LoopConfig {
        max_ticks: read_max_ticks(std::env::var(MAX_TICKS_ENV_VAR).ok().as_deref()),
        real_time: !read_flag(HEADLESS_ENV_VAR),
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        session,
        script: DemoScript::new(ScriptConfig::default()),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn read_flag(var: &'static str) -> bool {
    parse_flag(var, std::env::var(var).ok().as_deref())
}

fn parse_flag(var: &'static str, raw: Option<&str>) -> bool {
    let Some(raw) = raw else {
        return false;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "" | "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = var, value = raw, "invalid flag value; falling back to off");
            false
        }
    }
}

fn read_max_ticks(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => {
            warn!(
                env_var = MAX_TICKS_ENV_VAR,
                value = raw,
                "invalid tick budget; running until quit"
            );
            None
        }
        Ok(ticks) => Some(ticks),
    }
}
