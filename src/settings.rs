use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::notification::NotificationConfig;
use crate::segmentation::BucketConfig;

pub const DATA_DIR_ENV: &str = "SIDEKICK_DATA_DIR";
const DEFAULT_DIR_NAME: &str = ".local-sidekick";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "history.db";

/// Engine tunables. Missing keys in `config.json` take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub integration_interval_secs: u64,
    pub notification_interval_secs: u64,

    pub llm_enabled: bool,
    pub llm_timeout_secs: u64,

    pub bucket_minutes: u32,
    pub max_entry_duration_secs: f64,
    pub last_entry_secs: f64,

    pub drowsy_trigger_buckets: usize,
    pub distracted_trigger_buckets: usize,
    pub over_focus_window_buckets: usize,
    pub over_focus_min_focused_buckets: usize,
    pub drowsy_cooldown_minutes: u32,
    pub distracted_cooldown_minutes: u32,
    pub over_focus_cooldown_minutes: u32,
    pub max_notifications_per_day: u32,

    pub focus_block_min_minutes: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let buckets = BucketConfig::default();
        let notifications = NotificationConfig::default();
        Self {
            integration_interval_secs: 5,
            notification_interval_secs: 300,
            llm_enabled: true,
            llm_timeout_secs: 10,
            bucket_minutes: buckets.bucket_minutes,
            max_entry_duration_secs: buckets.max_entry_duration_secs,
            last_entry_secs: buckets.last_entry_secs,
            drowsy_trigger_buckets: notifications.drowsy_trigger_buckets,
            distracted_trigger_buckets: notifications.distracted_trigger_buckets,
            over_focus_window_buckets: notifications.over_focus_window_buckets,
            over_focus_min_focused_buckets: notifications.over_focus_min_focused_buckets,
            drowsy_cooldown_minutes: notifications.drowsy_cooldown_minutes,
            distracted_cooldown_minutes: notifications.distracted_cooldown_minutes,
            over_focus_cooldown_minutes: notifications.over_focus_cooldown_minutes,
            max_notifications_per_day: notifications.max_notifications_per_day,
            focus_block_min_minutes: 5.0,
        }
    }
}

impl EngineConfig {
    pub fn bucket_config(&self) -> BucketConfig {
        BucketConfig {
            bucket_minutes: self.bucket_minutes.max(1),
            max_entry_duration_secs: self.max_entry_duration_secs,
            last_entry_secs: self.last_entry_secs,
        }
    }

    pub fn notification_config(&self) -> NotificationConfig {
        NotificationConfig {
            bucket_minutes: self.bucket_minutes.max(1),
            drowsy_trigger_buckets: self.drowsy_trigger_buckets,
            distracted_trigger_buckets: self.distracted_trigger_buckets,
            over_focus_window_buckets: self.over_focus_window_buckets,
            over_focus_min_focused_buckets: self.over_focus_min_focused_buckets,
            drowsy_cooldown_minutes: self.drowsy_cooldown_minutes,
            distracted_cooldown_minutes: self.distracted_cooldown_minutes,
            over_focus_cooldown_minutes: self.over_focus_cooldown_minutes,
            max_notifications_per_day: self.max_notifications_per_day,
        }
    }

    pub fn integration_interval(&self) -> Duration {
        Duration::from_secs(self.integration_interval_secs.max(1))
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_secs.max(1))
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Trailing history the notification loop loads: the longest trigger
    /// lookback in buckets times the bucket width, so every trigger can see
    /// all the buckets it counts.
    pub fn notification_window(&self) -> chrono::Duration {
        let buckets = self
            .over_focus_window_buckets
            .max(self.drowsy_trigger_buckets)
            .max(self.distracted_trigger_buckets)
            .max(1);
        chrono::Duration::minutes(buckets as i64 * i64::from(self.bucket_minutes.max(1)))
    }
}

/// `$SIDEKICK_DATA_DIR`, else `$HOME/.local-sidekick`, else a relative
/// `.local-sidekick`.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join(DEFAULT_DIR_NAME),
        None => PathBuf::from(DEFAULT_DIR_NAME),
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineConfig>,
}

impl SettingsStore {
    /// Load `path`, falling back to defaults when the file is missing or
    /// unreadable as JSON.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!(
                        "Ignoring malformed settings at {}: {err}",
                        path.display()
                    );
                    EngineConfig::default()
                }
            }
        } else {
            EngineConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> EngineConfig {
        self.read().clone()
    }

    pub fn update(&self, config: EngineConfig) -> Result<()> {
        let mut guard = self.write();
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &EngineConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineConfig> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineConfig> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
