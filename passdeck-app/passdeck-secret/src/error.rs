//! Error types for secret storage.

/// Result type alias for secret store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during secret storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Secure storage is not available on this machine (no keyring daemon,
    /// D-Bus missing, or caching disabled).
    #[error("Secure storage not available: {0}")]
    NotAvailable(String),

    /// No secret is stored under the requested key.
    #[error("No secret found in secure storage")]
    SecretNotFound,

    /// Access to secure storage was denied by the OS.
    #[error("Access denied to secure storage")]
    AccessDenied,

    /// Platform-specific internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error only means "nothing cached for this key".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::SecretNotFound)
    }
}
