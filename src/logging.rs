use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL_ENV: &str = "KANBAN_BOARD_LOG_LEVEL";
const LOG_FILE_PREFIX: &str = "kanban-board-";
const KEPT_LOG_FILES: usize = 10;

/// Keeps the background log writer alive; drop it last to flush.
pub struct LogHandle {
    pub path: PathBuf,
    _guard: WorkerGuard,
}

pub fn init_logging() -> Result<LogHandle, Box<dyn std::error::Error>> {
    let log_dir = get_log_directory()?;
    fs::create_dir_all(&log_dir)?;
    prune_old_logs(&log_dir, KEPT_LOG_FILES.saturating_sub(1));

    let log_file_path = get_log_file_path(&log_dir);

    let file = fs::File::create(&log_file_path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let env_filter = build_log_filter(std::env::var(LOG_LEVEL_ENV).ok().as_deref());

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()?;

    tracing::info!("Logging initialized. Log file: {}", log_file_path.display());

    Ok(LogHandle {
        path: log_file_path,
        _guard: guard,
    })
}

fn build_log_filter(raw_level: Option<&str>) -> EnvFilter {
    let level = raw_level.and_then(normalize_log_level).unwrap_or("warn");
    EnvFilter::new(format!("{level},kanban_board={level}"))
}

fn normalize_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        "off" | "none" => Some("off"),
        _ => None,
    }
}

pub fn get_log_directory() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let data_dir = dirs::data_local_dir().ok_or("Failed to determine local data directory")?;
    Ok(data_dir.join("kanban-board").join("logs"))
}

pub fn get_log_file_path(log_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    log_dir.join(format!("{LOG_FILE_PREFIX}{timestamp}.log"))
}

fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log"))
}

/// Deletes all but the `keep` most recent log files. Best effort.
fn prune_old_logs(log_dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };

    let mut logs = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_log_file(path))
        .collect::<Vec<_>>();

    // Timestamped names sort chronologically.
    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    for path in logs.into_iter().take(excess) {
        let _ = fs::remove_file(path);
    }
}
