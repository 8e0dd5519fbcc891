use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_CLOSE_HOURS: u64 = 24;
pub const DEFAULT_WARN_HOURS: u64 = 6;
pub const DEFAULT_WARN_MINUTES: u64 = 30;

/// Upper bound for every window: ten years.
pub const MAX_WINDOW_HOURS: u64 = 10 * 365 * 24;
pub const MAX_WINDOW_MINUTES: u64 = MAX_WINDOW_HOURS * 60;

/// Sweep cadence. Not configurable: it bounds the precision of warning and
/// close timing and must stay well below the short warning window.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Timing knobs of the inactivity state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoCloseConfig {
    pub close_hours: u64,
    pub warn_hours: u64,
    pub warn_minutes: u64,
    pub sweep_interval: Duration,
}

impl Default for AutoCloseConfig {
    fn default() -> Self {
        Self {
            close_hours: DEFAULT_CLOSE_HOURS,
            warn_hours: DEFAULT_WARN_HOURS,
            warn_minutes: DEFAULT_WARN_MINUTES,
            sweep_interval: SWEEP_INTERVAL,
        }
    }
}

impl AutoCloseConfig {
    /// Build from a key lookup. Missing, zero, oversized or unparsable values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let window = |key: &str, default: u64, max: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|v| (1..=max).contains(v))
                .unwrap_or(default)
        };

        Self {
            close_hours: window("AUTOCLOSE_CLOSE_HOURS", DEFAULT_CLOSE_HOURS, MAX_WINDOW_HOURS),
            warn_hours: window("AUTOCLOSE_WARN_HOURS", DEFAULT_WARN_HOURS, MAX_WINDOW_HOURS),
            warn_minutes: window(
                "AUTOCLOSE_WARN_MINUTES",
                DEFAULT_WARN_MINUTES,
                MAX_WINDOW_MINUTES,
            ),
            sweep_interval: SWEEP_INTERVAL,
        }
    }

    pub fn close_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.close_hours.min(MAX_WINDOW_HOURS) as i64)
    }

    pub fn long_warning_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.warn_hours.min(MAX_WINDOW_HOURS) as i64)
    }

    pub fn short_warning_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.warn_minutes.min(MAX_WINDOW_MINUTES) as i64)
    }

    /// Non-fatal inconsistencies worth telling the operator about.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.long_warning_window() >= self.close_window() {
            warnings.push(format!(
                "long warning window ({}h) is not shorter than the close window ({}h); threads will warn immediately",
                self.warn_hours, self.close_hours
            ));
        }
        if self.short_warning_window() >= self.long_warning_window() {
            warnings.push(format!(
                "short warning window ({}m) is not shorter than the long warning window ({}h); the long warning will be skipped",
                self.warn_minutes, self.warn_hours
            ));
        }
        if Duration::from_secs(self.warn_minutes.saturating_mul(60)) < self.sweep_interval {
            warnings.push(format!(
                "short warning window ({}m) is shorter than the sweep interval ({}s)",
                self.warn_minutes,
                self.sweep_interval.as_secs()
            ));
        }
        warnings
    }
}

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub inbox_chat_id: i64,
    pub command_prefix: String,

    // Timing
    pub autoclose: AutoCloseConfig,

    // Persistence
    pub data_dir: PathBuf,
    pub data_suffix: String,

    // Host ticket table
    pub tickets_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let inbox_chat_id = env_str("INBOX_CHAT_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                Error::Config("INBOX_CHAT_ID environment variable is required".to_string())
            })?;

        let command_prefix = env_str("COMMAND_PREFIX")
            .and_then(non_empty)
            .unwrap_or_else(|| "/".to_string());

        let autoclose = AutoCloseConfig::from_lookup(env_str);

        // Suffix disambiguates the data file when several instances share a directory.
        let data_dir = env_path("AUTOCLOSE_DATA_DIR").unwrap_or_else(|| PathBuf::from("."));
        let data_suffix = env_str("AUTOCLOSE_SUFFIX").unwrap_or_default();
        let tickets_file =
            env_path("TICKETS_FILE").unwrap_or_else(|| PathBuf::from("./threads.json"));

        Ok(Self {
            telegram_bot_token,
            inbox_chat_id,
            command_prefix,
            autoclose,
            data_dir,
            data_suffix,
            tickets_file,
        })
    }

    /// Path of the AutoClose state file.
    pub fn state_file(&self) -> PathBuf {
        state_file_path(&self.data_dir, &self.data_suffix)
    }
}

pub fn state_file_path(dir: &Path, suffix: &str) -> PathBuf {
    dir.join(format!("AutoCloseData{suffix}.json"))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return &s[1..s.len() - 1];
    }
    s
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
