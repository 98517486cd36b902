//! Cached vault master secrets.
//!
//! [`SecretStore`] is the keyed Store/Get/Remove contract. [`SecretCache`]
//! is what the application holds: either an active backend or an explicit
//! disabled state when the OS keyring could not be reached.

use std::sync::Arc;

use tracing::{debug, warn};
use zeroize::Zeroizing;

mod error;
mod keyring_store;
mod memory;

pub use error::{Error, Result};
pub use keyring_store::KeyringSecretStore;
pub use memory::MemorySecretStore;

/// Keyed storage for secrets.
///
/// `get` must return [`Error::SecretNotFound`] when nothing is stored under the
/// key, and a different variant when the backend itself failed.
pub trait SecretStore: Send + Sync {
    fn store(&self, key: &str, secret: &[u8]) -> Result<()>;
    fn get(&self, key: &str) -> Result<Zeroizing<Vec<u8>>>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    fn store(&self, key: &str, secret: &[u8]) -> Result<()> {
        (**self).store(key, secret)
    }

    fn get(&self, key: &str) -> Result<Zeroizing<Vec<u8>>> {
        (**self).get(key)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// The secret cache the application runs with.
///
/// `Disabled` is a real state rather than a missing backend: every lookup
/// misses and nothing is ever written.
pub enum SecretCache {
    Active(Box<dyn SecretStore>),
    Disabled { reason: String },
}

impl SecretCache {
    /// Open the OS keyring, degrading to `Disabled` if it cannot be reached.
    pub fn open_keyring() -> Self {
        match KeyringSecretStore::open() {
            Ok(store) => SecretCache::Active(Box::new(store)),
            Err(e) => {
                warn!("Secret caching disabled: {}", e);
                SecretCache::Disabled {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn active(store: impl SecretStore + 'static) -> Self {
        SecretCache::Active(Box::new(store))
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        SecretCache::Disabled {
            reason: reason.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, SecretCache::Active(_))
    }

    /// Why caching is off, if it is.
    pub fn disabled_reason(&self) -> Option<&str> {
        match self {
            SecretCache::Active(_) => None,
            SecretCache::Disabled { reason } => Some(reason),
        }
    }

    pub fn store(&self, key: &str, secret: &[u8]) -> Result<()> {
        match self {
            SecretCache::Active(store) => store.store(key, secret),
            SecretCache::Disabled { .. } => {
                debug!("Secret caching disabled, not storing secret for {}", key);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            SecretCache::Active(store) => store.get(key),
            SecretCache::Disabled { reason } => Err(Error::NotAvailable(reason.clone())),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match self {
            SecretCache::Active(store) => store.remove(key),
            SecretCache::Disabled { .. } => Ok(()),
        }
    }
}

impl std::fmt::Debug for SecretCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretCache::Active(_) => f.write_str("SecretCache::Active"),
            SecretCache::Disabled { reason } => f
                .debug_struct("SecretCache::Disabled")
                .field("reason", reason)
                .finish(),
        }
    }
}
