use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::session::{Session, SessionError};
use crate::snapshot::GameStateId;

use super::metrics::MetricsAccumulator;
use super::MetricsHandle;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stop after this many ticks; `None` runs until the game asks to quit.
    pub max_ticks: Option<u64>,
    /// Pace frames against the wall clock. When off, every frame advances
    /// exactly one fixed step, which keeps runs reproducible.
    pub real_time: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: None,
            real_time: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// Gameplay driven by the loop. Runs before the session's own update on
/// every fixed tick.
pub trait GameLogic {
    fn tick(
        &mut self,
        session: &mut Session,
        tick: u64,
        dt: Duration,
    ) -> Result<LoopControl, SessionError>;
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("session failed during startup: {0}")]
    Start(#[source] SessionError),
    #[error("session failed on tick {tick}: {source}")]
    Tick {
        tick: u64,
        #[source]
        source: SessionError,
    },
    #[error("failed to save on shutdown: {0}")]
    Shutdown(#[source] SessionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub final_state: Option<GameStateId>,
    pub save_path: PathBuf,
}

pub fn run_session(
    config: &LoopConfig,
    session: &mut Session,
    logic: &mut dyn GameLogic,
) -> Result<LoopSummary, LoopError> {
    run_session_with_metrics(config, session, logic, &MetricsHandle::default())
}

/// Starts the session, runs fixed ticks until the game quits or the tick
/// budget runs out, then saves on the way out.
pub fn run_session_with_metrics(
    config: &LoopConfig,
    session: &mut Session,
    logic: &mut dyn GameLogic,
    metrics_handle: &MetricsHandle,
) -> Result<LoopSummary, LoopError> {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        max_ticks = ?config.max_ticks,
        real_time = config.real_time,
        "loop_config"
    );
    let restored = session.start().map_err(LoopError::Start)?;
    info!(restored, "session_started");

    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut accumulator = Duration::ZERO;
    let mut last_frame = Instant::now();
    let mut ticks = 0u64;

    'frames: loop {
        let now = Instant::now();
        let frame_dt = if config.real_time {
            clamp_frame_delta(now.saturating_duration_since(last_frame), max_frame_delta)
        } else {
            fixed_dt
        };
        last_frame = now;
        accumulator = accumulator.saturating_add(frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if config.max_ticks.is_some_and(|max| ticks >= max) {
                break 'frames;
            }
            let tick_started = Instant::now();
            let control = logic
                .tick(session, ticks, fixed_dt)
                .map_err(|source| LoopError::Tick { tick: ticks, source })?;
            session
                .update(fixed_dt)
                .map_err(|source| LoopError::Tick { tick: ticks, source })?;
            ticks = ticks.saturating_add(1);
            metrics_accumulator.record_tick(tick_started.elapsed());
            if control == LoopControl::Quit {
                info!(tick = ticks, "quit_requested");
                break 'frames;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(
            Instant::now(),
            session.timeline().len(),
            session.is_rewinding(),
        ) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                game_state_count = snapshot.game_state_count,
                rewinding = snapshot.rewinding,
                entity_count = session.world().len(),
                "loop_metrics"
            );
        }

        if config.real_time {
            let elapsed = Instant::now().saturating_duration_since(now);
            if elapsed < fixed_dt {
                thread::sleep(fixed_dt - elapsed);
            }
        }
    }

    let save_path = session.on_quit().map_err(LoopError::Shutdown)?;
    let final_state = session.current();
    info!(
        ticks,
        final_state = final_state.map(|id| id.0),
        save_path = %save_path.display(),
        "shutdown"
    );
    Ok(LoopSummary {
        ticks,
        final_state,
        save_path,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(50), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(2));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn zero_durations_fall_back() {
        assert_eq!(
            normalize_non_zero_duration(Duration::ZERO, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
        assert_eq!(
            normalize_non_zero_duration(Duration::from_millis(5), Duration::from_secs(1)),
            Duration::from_millis(5)
        );
    }
}
