use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{set_aside, write_private, ConfigStore};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredSettings")]
pub struct Settings {
    /// Seconds before a copied secret is wiped from the clipboard; 0 keeps it.
    pub clipboard_clear_seconds: u64,
    pub search_debounce_ms: u64,
    pub max_search_results: usize,
    /// 0 means the session lasts until the vault is closed.
    pub session_timeout_hours: u64,
    #[serde(rename = "default_database_path")]
    pub default_vault_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clipboard_clear_seconds: 30,
            search_debounce_ms: 100,
            max_search_results: 50,
            session_timeout_hours: 0,
            default_vault_path: String::new(),
        }
    }
}

/// Settings as written on disk. Numbers are signed so that one negative
/// value only resets that field instead of failing the whole file.
#[derive(Deserialize)]
#[serde(default)]
struct StoredSettings {
    clipboard_clear_seconds: i64,
    search_debounce_ms: i64,
    max_search_results: i64,
    session_timeout_hours: i64,
    default_database_path: String,
}

impl Default for StoredSettings {
    fn default() -> Self {
        let defaults = Settings::default();
        Self {
            clipboard_clear_seconds: defaults.clipboard_clear_seconds as i64,
            search_debounce_ms: defaults.search_debounce_ms as i64,
            max_search_results: defaults.max_search_results as i64,
            session_timeout_hours: defaults.session_timeout_hours as i64,
            default_database_path: defaults.default_vault_path,
        }
    }
}

impl From<StoredSettings> for Settings {
    fn from(stored: StoredSettings) -> Self {
        let defaults = Settings::default();
        Self {
            clipboard_clear_seconds: non_negative(
                "clipboard_clear_seconds",
                stored.clipboard_clear_seconds,
                defaults.clipboard_clear_seconds,
            ),
            search_debounce_ms: non_negative(
                "search_debounce_ms",
                stored.search_debounce_ms,
                defaults.search_debounce_ms,
            ),
            max_search_results: non_negative(
                "max_search_results",
                stored.max_search_results,
                defaults.max_search_results,
            ),
            session_timeout_hours: non_negative(
                "session_timeout_hours",
                stored.session_timeout_hours,
                defaults.session_timeout_hours,
            ),
            default_vault_path: stored.default_database_path,
        }
    }
}

fn non_negative<T: TryFrom<i64>>(name: &str, value: i64, default: T) -> T {
    T::try_from(value).unwrap_or_else(|_| {
        warn!("Ignoring {} = {}, using the default", name, value);
        default
    })
}

impl Settings {
    pub fn clipboard_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.clipboard_clear_seconds)
    }

    pub fn search_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.search_debounce_ms)
    }

    pub fn session_timeout(&self) -> Option<std::time::Duration> {
        (self.session_timeout_hours > 0).then(|| {
            std::time::Duration::from_secs(self.session_timeout_hours.saturating_mul(3600))
        })
    }
}

impl ConfigStore {
    /// Load settings, writing the defaults on first run.
    ///
    /// A malformed file is moved aside and reported as an error; callers
    /// fall back to `Settings::default()`.
    pub fn load_settings(&self) -> Result<Settings> {
        let path = self.settings_path();

        if !path.exists() {
            info!("No settings file, writing defaults to {:?}", path);
            let settings = Settings::default();
            self.save_settings(&settings)?;
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| set_aside(&path, e))
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        write_private(&self.settings_path(), content.as_bytes())
    }
}
