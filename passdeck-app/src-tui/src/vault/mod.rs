//! Encrypted credential vaults.
//!
//! A vault is a single file holding a JSON group tree encrypted with
//! AES-256-GCM under a key derived from the master secret with Argon2id.
//! The rest of the application only sees [`VaultLoader`] and the flat
//! [`CredentialEntry`] snapshots it produces.

pub mod error;
pub mod loader;
pub mod model;
pub mod storage;

pub use error::{VaultError, VaultResult};
pub use loader::{FileVaultLoader, OpenVault, VaultHandle, VaultLoader};
pub use model::{CredentialEntry, Group, StoredEntry, VaultPayload};
pub use storage::{read_container, write_container, KdfParams};
