//! Vault-specific error types for container operations.
//!
//! These errors are specific enough for the unlock flow to tell a wrong
//! secret apart from a missing or damaged file.

use thiserror::Error;

/// Errors that can occur while opening or writing a vault container.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Decryption failed: the secret is wrong or the ciphertext was tampered with.
    #[error("Invalid master password or corrupted vault")]
    InvalidSecret,

    /// The vault file does not exist.
    #[error("Vault file not found: {0}")]
    NotFound(String),

    /// The file exists but is not a readable container.
    #[error("Vault data is corrupted: {0}")]
    Corrupted(String),

    /// An error occurred in the encryption layer.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Key derivation failed (Argon2 error).
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// The handle was already closed and its entries scrubbed.
    #[error("Vault is closed")]
    Closed,

    /// An I/O error occurred (file access, permissions, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Stable code for logs and status lines.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::InvalidSecret => "INVALID_SECRET",
            VaultError::NotFound(_) => "NOT_FOUND",
            VaultError::Corrupted(_) => "CORRUPTED",
            VaultError::Encryption(_) => "ENCRYPTION_ERROR",
            VaultError::KeyDerivation(_) => "KEY_DERIVATION_ERROR",
            VaultError::Closed => "CLOSED",
            VaultError::Io(_) => "IO_ERROR",
            VaultError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Result type alias for vault operations.
pub type VaultResult<T> = std::result::Result<T, VaultError>;
