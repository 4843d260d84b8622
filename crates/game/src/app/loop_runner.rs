use std::process::ExitCode;

use rewind_engine::{run_session_with_metrics, MetricsHandle};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut session,
        mut script,
    } = app;
    let metrics = MetricsHandle::default();

    if let Err(err) = run_session_with_metrics(&config, &mut session, &mut script, &metrics) {
        error!(error = %err, "session_failed");
        return ExitCode::FAILURE;
    }

    let last = metrics.snapshot();
    info!(
        tps = last.tps,
        tick_time_ms = last.tick_time_ms,
        game_state_count = last.game_state_count,
        "final_loop_metrics"
    );
    match serde_json::to_string(script.report()) {
        Ok(report) => info!(%report, "demo_report"),
        Err(err) => error!(error = %err, "demo_report_unserializable"),
    }
    ExitCode::SUCCESS
}
