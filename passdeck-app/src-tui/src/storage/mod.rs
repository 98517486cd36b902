//! Plain-JSON persistence for settings and the vault registry.

mod config;
mod registry;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PassDeckError, Result};

pub use config::Settings;
pub use registry::{VaultDescriptor, VaultRegistry};

const APP_DIR_NAME: &str = "passdeck";
const SETTINGS_FILE: &str = "config.json";
const REGISTRY_FILE: &str = "databases.json";
const LOG_FILE: &str = "passdeck.log";

/// Owns the configuration directory and the files inside it.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Open `<config_dir>/passdeck`, creating it if needed.
    pub fn open_default() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            PassDeckError::Config("Could not determine configuration directory".into())
        })?;
        Self::open(base.join(APP_DIR_NAME))
    }

    /// Open a configuration directory at an explicit location, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&dir)?.permissions();
            perms.set_mode(0o750);
            std::fs::set_permissions(&dir, perms)?;
        }

        debug!("Using configuration directory {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    fn registry_path(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE)
    }
}

/// Write a file atomically (temp file + rename) with owner-only permissions.
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }

    Ok(())
}

/// Move an unreadable file to `<name>.bak` so the next save cannot destroy
/// it, and describe the failure.
fn set_aside(path: &Path, err: serde_json::Error) -> PassDeckError {
    let backup = path.with_extension("json.bak");
    match std::fs::rename(path, &backup) {
        Ok(()) => {
            warn!("Moved unreadable {:?} to {:?}", path, backup);
            PassDeckError::Config(format!(
                "Failed to parse {}: {} (original kept as {})",
                path.display(),
                err,
                backup.display()
            ))
        }
        Err(e) => {
            warn!("Could not back up unreadable {:?}: {}", path, e);
            PassDeckError::Config(format!("Failed to parse {}: {}", path.display(), err))
        }
    }
}
