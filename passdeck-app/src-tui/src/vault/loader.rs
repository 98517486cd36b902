//! Opening vault containers.
//!
//! [`VaultLoader`] is the seam the unlock flow talks to. A loaded vault is a
//! [`VaultHandle`]: entries are read out of it, then it is closed, which
//! drops the decrypted payload.

use std::path::Path;

use tracing::debug;

use super::error::{VaultError, VaultResult};
use super::model::{CredentialEntry, VaultPayload};
use super::storage::read_container;

/// Opens an encrypted container with a secret.
pub trait VaultLoader: Send + Sync {
    fn load(&self, path: &Path, secret: &[u8]) -> VaultResult<Box<dyn VaultHandle>>;
}

/// An opened vault.
pub trait VaultHandle: Send {
    /// Flat snapshot of every entry, in container order.
    fn entries(&self) -> VaultResult<Vec<CredentialEntry>>;

    /// Scrub decrypted material. Further `entries` calls fail with
    /// [`VaultError::Closed`]; closing twice is harmless.
    fn close(&mut self) -> VaultResult<()>;
}

/// Loader for PassDeck container files on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileVaultLoader;

impl FileVaultLoader {
    pub fn new() -> Self {
        Self
    }
}

impl VaultLoader for FileVaultLoader {
    fn load(&self, path: &Path, secret: &[u8]) -> VaultResult<Box<dyn VaultHandle>> {
        debug!("Opening vault {:?}", path);
        let payload = read_container(path, secret)?;
        Ok(Box::new(OpenVault {
            payload: Some(payload),
        }))
    }
}

/// A decrypted container held in memory until closed.
pub struct OpenVault {
    payload: Option<VaultPayload>,
}

impl OpenVault {
    pub fn new(payload: VaultPayload) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.payload.is_none()
    }
}

impl VaultHandle for OpenVault {
    fn entries(&self) -> VaultResult<Vec<CredentialEntry>> {
        self.payload
            .as_ref()
            .map(VaultPayload::flatten)
            .ok_or(VaultError::Closed)
    }

    fn close(&mut self) -> VaultResult<()> {
        // Stored entries zeroize their fields on drop
        self.payload = None;
        Ok(())
    }
}

impl Drop for OpenVault {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
