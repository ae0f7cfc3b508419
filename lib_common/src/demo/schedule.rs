use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::scenario::run_iteration;
use crate::configs::config_env::ConnectorConfig;

/// Default pause between two iterations.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// How often the scenario repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoSchedule {
    /// Pause after each iteration.
    pub interval: Duration,
    /// Stop after this many iterations; `None` runs until cancelled.
    pub iterations: Option<u64>,
}

impl Default for DemoSchedule {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            iterations: None,
        }
    }
}

impl DemoSchedule {
    fn is_done(&self, completed: u64) -> bool {
        self.iterations.is_some_and(|limit| completed >= limit)
    }
}

/// Repeats [`run_iteration`] until the schedule is exhausted or `token` is
/// cancelled, and returns the number of completed iterations.
///
/// Cancellation is observed before each iteration and during the pause; an
/// iteration that already started runs to the end so its handles get closed.
///
/// # Arguments
/// * `config` - Settings for the three services.
/// * `schedule` - Pause length and optional iteration bound.
/// * `workdir` - Directory for the upload and download files.
/// * `token` - Cancels the loop, usually from a Ctrl-C handler.
pub async fn run_loop(
    config: &ConnectorConfig,
    schedule: &DemoSchedule,
    workdir: &Path,
    token: CancellationToken,
) -> u64 {
    let mut completed = 0;

    while !schedule.is_done(completed) {
        if token.is_cancelled() {
            break;
        }

        let report = run_iteration(config, workdir).await;
        completed += 1;
        debug!("Iteration {} finished: {:?}", completed, report);

        if schedule.is_done(completed) {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(schedule.interval) => {}
        }
    }

    info!("Demo loop stopped after {} iteration(s)", completed);
    completed
}
