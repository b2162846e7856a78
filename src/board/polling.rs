//! Periodic board refresh

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::store::TaskStore;

use super::BoardManager;

/// Spawn a background task that refreshes the board every `poll_interval`.
///
/// The first refresh runs immediately. `BoardManager::request_refresh` cuts the
/// current wait short; to stop, set `stop` and request a refresh so the loop
/// notices without waiting out the interval.
pub fn spawn_board_poller<S>(
    manager: Arc<BoardManager<S>>,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    S: TaskStore + 'static,
{
    let wake = manager.refresh_signal();

    tokio::spawn(async move {
        let poll_interval_ms = poll_interval.as_millis() as u64;

        while !stop.load(Ordering::Relaxed) {
            // Failures are already logged and broadcast by the manager.
            if let Ok(task_count) = manager.refresh().await {
                debug!(
                    project_id = manager.project_id(),
                    task_count, poll_interval_ms, "board poll cycle complete"
                );
            }

            if stop.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = wake.notified() => {
                    debug!(project_id = manager.project_id(), "board refresh requested");
                }
            }
        }

        debug!(project_id = manager.project_id(), "board poller stopped");
    })
}
