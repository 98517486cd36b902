//! Resolving a vault's secret and opening it.
//!
//! An empty supplied secret means "try the cache". A stale cached secret is
//! reported as [`UnlockOutcome::NeedsManualEntry`], never as a failure, so it
//! does not count against the attempt limit.

use std::path::Path;
use std::sync::Arc;

use passdeck_secret::SecretCache;
use tracing::{debug, info, warn};

use crate::storage::VaultDescriptor;
use crate::vault::{CredentialEntry, VaultError, VaultLoader, VaultResult};

#[derive(Debug)]
pub enum UnlockOutcome {
    Success(Vec<CredentialEntry>),
    /// No usable cached secret; the user has to type one.
    NeedsManualEntry,
    /// A typed secret did not open the vault.
    Failed(VaultError),
}

#[derive(Clone)]
pub struct UnlockOrchestrator {
    loader: Arc<dyn VaultLoader>,
    cache: Arc<SecretCache>,
}

impl UnlockOrchestrator {
    pub fn new(loader: Arc<dyn VaultLoader>, cache: Arc<SecretCache>) -> Self {
        Self { loader, cache }
    }

    pub fn cache(&self) -> &SecretCache {
        &self.cache
    }

    /// Blocking: runs key derivation and secret store I/O.
    pub fn unlock(&self, vault: &VaultDescriptor, supplied: &str) -> UnlockOutcome {
        if supplied.is_empty() {
            self.unlock_from_cache(vault)
        } else {
            self.unlock_manual(vault, supplied)
        }
    }

    /// Drop the cached secret for a vault that is no longer registered.
    pub fn forget(&self, path: &str) -> passdeck_secret::Result<()> {
        match self.cache.remove(path) {
            Ok(()) => {
                debug!("Forgot cached secret for {}", path);
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn unlock_manual(&self, vault: &VaultDescriptor, supplied: &str) -> UnlockOutcome {
        match self.open(&vault.path, supplied.as_bytes()) {
            Ok(entries) => {
                if let Err(e) = self.cache.store(&vault.path, supplied.as_bytes()) {
                    warn!("Could not cache secret for {}: {}", vault.name, e);
                }
                info!("Unlocked {} ({} entries)", vault.name, entries.len());
                UnlockOutcome::Success(entries)
            }
            Err(e) => {
                debug!("Manual unlock of {} failed: {}", vault.name, e.code());
                UnlockOutcome::Failed(e)
            }
        }
    }

    fn unlock_from_cache(&self, vault: &VaultDescriptor) -> UnlockOutcome {
        let cached = match self.cache.get(&vault.path) {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => {
                debug!("No cached secret for {}", vault.name);
                return UnlockOutcome::NeedsManualEntry;
            }
            Err(e) => {
                debug!("Secret cache unavailable for {}: {}", vault.name, e);
                return UnlockOutcome::NeedsManualEntry;
            }
        };

        match self.open(&vault.path, &cached) {
            Ok(entries) => {
                info!(
                    "Unlocked {} with cached secret ({} entries)",
                    vault.name,
                    entries.len()
                );
                UnlockOutcome::Success(entries)
            }
            Err(e) => {
                info!(
                    "Cached secret for {} no longer opens it ({}), prompting",
                    vault.name,
                    e.code()
                );
                UnlockOutcome::NeedsManualEntry
            }
        }
    }

    /// Load, extract, close. The handle is closed on every path.
    fn open(&self, path: &str, secret: &[u8]) -> VaultResult<Vec<CredentialEntry>> {
        let mut handle = self.loader.load(Path::new(path), secret)?;
        let entries = handle.entries();
        if let Err(e) = handle.close() {
            warn!("Failed to close vault {}: {}", path, e);
        }
        entries
    }
}
