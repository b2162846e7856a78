use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::HttpStoreConfig;
use crate::store::http::DEFAULT_API_URL;

pub const API_URL_ENV: &str = "KANBAN_BOARD_API_URL";
const MIN_POLL_INTERVAL_MS: u64 = 1_000;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 15_000;
const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_id: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("kanban-board");
        path.push("settings.toml");
        Some(path)
    }

    /// Reads the config file, then applies `KANBAN_BOARD_API_URL`.
    pub fn load() -> Self {
        let mut settings = match Self::config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Self::default(),
        };
        settings.apply_env_override(std::env::var(API_URL_ENV).ok());
        settings
    }

    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(mut settings) => {
                    settings.validate();
                    settings
                }
                Err(error) => {
                    warn!(
                        "failed to parse settings config '{}': {}",
                        path.display(),
                        error
                    );
                    Self::default()
                }
            },
            Err(error) => {
                warn!(
                    "failed to read settings config '{}': {}",
                    path.display(),
                    error
                );
                Self::default()
            }
        }
    }

    fn apply_env_override(&mut self, api_url: Option<String>) {
        if let Some(api_url) = api_url.filter(|value| !value.trim().is_empty()) {
            self.api_url = api_url;
            self.validate();
        }
    }

    /// Writes the validated settings through a sibling temp file, then renames it into place.
    pub fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
            bail!("invalid settings path '{}'", path.display());
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;

        let mut normalized = self.clone();
        normalized.validate();
        let contents = toml::to_string_pretty(&normalized).context("failed to encode settings")?;

        let staging = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));
        fs::write(&staging, contents)
            .with_context(|| format!("failed to write '{}'", staging.display()))?;
        fs::rename(&staging, path)
            .with_context(|| format!("failed to move settings into '{}'", path.display()))
    }

    pub fn clamp_poll_interval_ms(interval_ms: u64) -> u64 {
        interval_ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn store_config(&self) -> HttpStoreConfig {
        HttpStoreConfig {
            base_url: self.api_url.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn validate(&mut self) {
        self.poll_interval_ms = Self::clamp_poll_interval_ms(self.poll_interval_ms);
        self.request_timeout_ms = self
            .request_timeout_ms
            .clamp(MIN_REQUEST_TIMEOUT_MS, MAX_REQUEST_TIMEOUT_MS);

        let api_url = self.api_url.trim().trim_end_matches('/');
        self.api_url = if api_url.starts_with("http://") || api_url.starts_with("https://") {
            api_url.to_string()
        } else {
            warn!(
                "invalid api_url '{}' in settings config; falling back to {}",
                self.api_url, DEFAULT_API_URL
            );
            DEFAULT_API_URL.to_string()
        };

        if let Some(user_id) = self.user_id
            && user_id <= 0
        {
            warn!("ignoring non-positive user_id {user_id} in settings config");
            self.user_id = None;
        }
    }
}
