mod loop_runner;
mod metrics;

pub use loop_runner::{
    run_session, run_session_with_metrics, GameLogic, LoopConfig, LoopControl, LoopError,
    LoopSummary,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
