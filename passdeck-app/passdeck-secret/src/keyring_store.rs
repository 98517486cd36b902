//! OS keyring backend.
//!
//! Secrets are kept in the platform-native keyring:
//! - **macOS**: Keychain Access
//! - **Windows**: Credential Manager
//! - **Linux**: Secret Service API (GNOME Keyring, KWallet)

use keyring::Entry;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::SecretStore;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "passdeck";

/// Prefix for every account name so our entries are easy to spot in keyring UIs.
const KEY_PREFIX: &str = "vault_";

/// Account used to probe whether the keyring answers at all.
const PROBE_ACCOUNT: &str = "availability-probe";

#[cfg(target_os = "macos")]
const PLATFORM_BACKEND: &str = "macOS Keychain";
#[cfg(target_os = "windows")]
const PLATFORM_BACKEND: &str = "Windows Credential Manager";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM_BACKEND: &str = "Secret Service";

/// Secret store backed by the OS keyring.
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    _private: (),
}

impl KeyringSecretStore {
    /// Check that the OS keyring can be reached and return a handle to it.
    ///
    /// A missing probe entry still counts as available; only failures to talk
    /// to the backend make this return an error.
    pub fn open() -> Result<Self> {
        debug!(
            "Checking keyring availability for service: {}",
            SERVICE_NAME
        );

        let entry = Entry::new(SERVICE_NAME, PROBE_ACCOUNT).map_err(|e| {
            warn!("Keyring not available: {}", e);
            Error::NotAvailable(format!("OS keyring not available: {}", e))
        })?;
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => {
                debug!("Keyring available ({})", PLATFORM_BACKEND);
                Ok(Self { _private: () })
            }
            Err(e) => {
                warn!("Keyring not accessible: {:?}", e);
                Err(Error::NotAvailable(format!(
                    "OS keyring not accessible: {}",
                    e
                )))
            }
        }
    }

    fn entry(key: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &account_name(key)).map_err(|e| {
            error!("Failed to create keyring entry: {}", e);
            Self::map_keyring_error(e)
        })
    }

    /// Map keyring errors to our error type.
    fn map_keyring_error(err: keyring::Error) -> Error {
        match err {
            keyring::Error::NoEntry => Error::SecretNotFound,
            keyring::Error::Ambiguous(_) => {
                Error::Internal("Multiple keyring entries found".into())
            }
            keyring::Error::NoStorageAccess(e) => {
                warn!("Keyring access denied: {:?}", e);
                Error::AccessDenied
            }
            keyring::Error::PlatformFailure(e) => {
                let msg = format!("{:?}", e);
                if msg.contains("Dbus") || msg.contains("dbus") || msg.contains("D-Bus") {
                    Error::NotAvailable(format!(
                        "System keyring not available (D-Bus error): {}",
                        msg
                    ))
                } else {
                    Error::Internal(format!("Keyring error: {:?}", e))
                }
            }
            keyring::Error::BadEncoding(_) => {
                Error::Internal("Keyring entry is not valid UTF-8".into())
            }
            _ => Error::Internal(format!("Keyring error: {}", err)),
        }
    }
}

impl SecretStore for KeyringSecretStore {
    /// The secret is stored base64-encoded since keyring APIs expect strings.
    fn store(&self, key: &str, secret: &[u8]) -> Result<()> {
        debug!("Storing {} byte secret in keyring for {}", secret.len(), key);

        let entry = Self::entry(key)?;
        let encoded = Zeroizing::new(base64_encode(secret));

        entry.set_password(&encoded).map_err(|e| {
            error!("Failed to store secret in keyring: {:?}", e);
            Self::map_keyring_error(e)
        })?;

        // Read back through a fresh Entry so we are not looking at a cached value.
        let readback = Self::entry(key)?.get_password().map_err(|e| {
            error!("Secret verification failed - cannot read back: {:?}", e);
            Error::Internal(format!(
                "Keyring verification failed: set_password() succeeded but get_password() failed: {:?}",
                e
            ))
        })?;
        let readback = Zeroizing::new(readback);

        if *readback != *encoded {
            error!("Secret verification failed - stored data doesn't match!");
            return Err(Error::Internal(
                "Keyring verification failed: data mismatch".into(),
            ));
        }

        info!("Secret stored in OS keyring for {}", key);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Zeroizing<Vec<u8>>> {
        debug!("Retrieving secret from keyring for {}", key);

        let encoded = match Self::entry(key)?.get_password() {
            Ok(password) => Zeroizing::new(password),
            Err(keyring::Error::NoEntry) => {
                debug!("No cached secret for {}", key);
                return Err(Error::SecretNotFound);
            }
            Err(e) => {
                error!("Failed to retrieve secret from keyring: {:?}", e);
                return Err(Self::map_keyring_error(e));
            }
        };

        let secret = base64_decode(&encoded).map_err(|e| {
            error!("Failed to decode secret from base64: {}", e);
            Error::Internal(format!("Failed to decode secret: {}", e))
        })?;

        debug!("Secret retrieved from OS keyring ({} bytes)", secret.len());
        Ok(secret)
    }

    /// Deleting a missing entry succeeds.
    fn remove(&self, key: &str) -> Result<()> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) => {
                info!("Secret deleted from OS keyring for {}", key);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!("No secret to delete for {} (already gone)", key);
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete secret from keyring: {:?}", e);
                Err(Self::map_keyring_error(e))
            }
        }
    }
}

fn account_name(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn base64_decode(encoded: &str) -> std::result::Result<Zeroizing<Vec<u8>>, String> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map(Zeroizing::new)
        .map_err(|e| e.to_string())
}
