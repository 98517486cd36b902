use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{set_aside, write_private, ConfigStore};
use crate::error::Result;

/// A registered vault file. Identified by `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultDescriptor {
    pub name: String,
    pub path: String,
    #[serde(default = "unix_epoch")]
    pub last_accessed: DateTime<Utc>,
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

impl VaultDescriptor {
    /// Describe a vault file, naming it after the file.
    pub fn from_path(path: impl Into<String>, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());
        Self {
            name,
            path,
            last_accessed: now,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRegistry {
    #[serde(default, rename = "databases")]
    pub vaults: Vec<VaultDescriptor>,
    /// Path of the vault unlocked most recently, empty if none.
    #[serde(default)]
    pub last_used: String,
}

impl VaultRegistry {
    pub fn find(&self, path: &str) -> Option<&VaultDescriptor> {
        self.vaults.iter().find(|v| v.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Append a descriptor unless its path is already registered.
    pub fn add(&mut self, descriptor: VaultDescriptor) -> bool {
        if self.contains(&descriptor.path) {
            return false;
        }
        self.vaults.push(descriptor);
        true
    }

    /// Remove the descriptor at `index`. Forgets `last_used` if it pointed there.
    pub fn remove(&mut self, index: usize) -> Option<VaultDescriptor> {
        if index >= self.vaults.len() {
            return None;
        }
        let removed = self.vaults.remove(index);
        if self.last_used == removed.path {
            self.last_used.clear();
        }
        Some(removed)
    }

    /// Record a successful unlock of `path`.
    pub fn mark_used(&mut self, path: &str, now: DateTime<Utc>) {
        if let Some(v) = self.vaults.iter_mut().find(|v| v.path == path) {
            v.last_accessed = now;
        }
        self.last_used = path.to_string();
    }

    /// The descriptor to unlock silently at startup.
    ///
    /// `last_used` wins; otherwise `fallback_path` (the configured default
    /// vault) is used when it is registered.
    pub fn startup_target(&self, fallback_path: &str) -> Option<&VaultDescriptor> {
        if !self.last_used.is_empty() {
            return self.find(&self.last_used);
        }
        if fallback_path.is_empty() {
            return None;
        }
        self.find(fallback_path)
    }
}

impl ConfigStore {
    /// Load the registry, writing an empty one on first run.
    ///
    /// A malformed file is moved to `databases.json.bak` before the error is
    /// returned, so saving a fresh registry never overwrites it.
    pub fn load_registry(&self) -> Result<VaultRegistry> {
        let path = self.registry_path();

        if !path.exists() {
            info!("No vault registry, creating {:?}", path);
            let registry = VaultRegistry::default();
            self.save_registry(&registry)?;
            return Ok(registry);
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| set_aside(&path, e))
    }

    pub fn save_registry(&self, registry: &VaultRegistry) -> Result<()> {
        let content = serde_json::to_string_pretty(registry)?;
        write_private(&self.registry_path(), content.as_bytes())
    }
}
