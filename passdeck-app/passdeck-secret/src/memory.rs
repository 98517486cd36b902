//! Process-local secret store.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::SecretStore;

/// Keeps secrets in memory for the lifetime of the process.
///
/// Used where no OS keyring is wanted, and by tests that need a cache they
/// can inspect.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a secret is cached under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().map(|s| s.contains_key(key)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Zeroizing<Vec<u8>>>>> {
        self.secrets
            .lock()
            .map_err(|_| Error::Internal("Secret map lock poisoned".into()))
    }
}

impl SecretStore for MemorySecretStore {
    fn store(&self, key: &str, secret: &[u8]) -> Result<()> {
        debug!("Caching {} byte secret in memory for {}", secret.len(), key);
        self.lock()?
            .insert(key.to_string(), Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or(Error::SecretNotFound)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
