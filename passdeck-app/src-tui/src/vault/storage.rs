//! Encrypted container file format.
//!
//! Layout:
//! `[4-byte magic "PDV1"][u32 memory KiB][u32 iterations][u32 lanes]`
//! `[16-byte salt][12-byte nonce][AES-256-GCM ciphertext + 16-byte tag]`
//!
//! All integers are little-endian. The plaintext is the JSON-serialized
//! [`VaultPayload`]. The key is derived from the master secret with Argon2id.

use std::path::Path;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::error::{VaultError, VaultResult};
use super::model::VaultPayload;

const MAGIC: &[u8; 4] = b"PDV1";
const SALT_SIZE: usize = 16;
/// Nonce size for AES-GCM (96 bits = 12 bytes)
const NONCE_SIZE: usize = 12;
const HEADER_SIZE: usize = MAGIC.len() + 12 + SALT_SIZE + NONCE_SIZE;
const KEY_LEN: usize = 32; // 256-bit key for AES-256

/// Upper bound on the memory cost accepted from a file header (1 GiB).
const MAX_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ITERATIONS: u32 = 64;
const MAX_LANES: u32 = 16;

/// Argon2id cost parameters, stored in the container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl Default for KdfParams {
    /// 64 MB, 3 iterations, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            lanes: 4,
        }
    }
}

impl KdfParams {
    /// Cheapest parameters Argon2 accepts. Only for tests and fixtures.
    pub const fn insecure_fast() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            lanes: 1,
        }
    }

    fn validate(&self) -> VaultResult<()> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations == 0
            || self.iterations > MAX_ITERATIONS
            || self.lanes == 0
            || self.lanes > MAX_LANES
        {
            return Err(VaultError::Corrupted(format!(
                "Unreasonable key derivation parameters: {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// A 256-bit encryption key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; KEY_LEN],
}

impl VaultKey {
    /// Derive the key from the master secret.
    pub fn derive(secret: &[u8], salt: &[u8; SALT_SIZE], params: KdfParams) -> VaultResult<Self> {
        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.lanes,
            Some(KEY_LEN),
        )
        .map_err(|e| VaultError::KeyDerivation(format!("Invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(secret, salt, &mut key)
            .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;

        let derived = Self { key };
        key.zeroize();
        Ok(derived)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("VaultKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt `payload` under `secret` and write it to `path`.
///
/// The file is written atomically and restricted to the owner on Unix.
pub fn write_container(
    path: &Path,
    secret: &[u8],
    payload: &VaultPayload,
    params: KdfParams,
) -> VaultResult<()> {
    params.validate()?;

    let mut salt = [0u8; SALT_SIZE];
    rand::rng().fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let key = VaultKey::derive(secret, &salt, params)?;
    let plaintext = Zeroizing::new(serde_json::to_vec(payload)?);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(format!("Invalid key: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_ref())
        .map_err(|e| VaultError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut output = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    output.extend_from_slice(MAGIC);
    output.extend_from_slice(&params.memory_kib.to_le_bytes());
    output.extend_from_slice(&params.iterations.to_le_bytes());
    output.extend_from_slice(&params.lanes.to_le_bytes());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&nonce_bytes);
    output.extend(ciphertext);

    // Write atomically (write to temp file, then rename)
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, &output)?;
    std::fs::rename(&temp_path, path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }

    debug!("Wrote vault container {:?} ({} bytes)", path, output.len());
    Ok(())
}

/// Read and decrypt the container at `path`.
///
/// A wrong secret and a tampered ciphertext are indistinguishable and both
/// yield [`VaultError::InvalidSecret`].
pub fn read_container(path: &Path, secret: &[u8]) -> VaultResult<VaultPayload> {
    let encrypted = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(VaultError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if encrypted.len() < HEADER_SIZE {
        return Err(VaultError::Corrupted("Vault file too short".into()));
    }
    if &encrypted[..MAGIC.len()] != MAGIC {
        return Err(VaultError::Corrupted("Not a PassDeck vault".into()));
    }

    let (header, ciphertext) = encrypted.split_at(HEADER_SIZE);
    let params = KdfParams {
        memory_kib: read_u32(header, 4),
        iterations: read_u32(header, 8),
        lanes: read_u32(header, 12),
    };
    params.validate()?;

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&header[16..16 + SALT_SIZE]);
    let nonce = Nonce::from_slice(&header[16 + SALT_SIZE..HEADER_SIZE]);

    let key = VaultKey::derive(secret, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(format!("Invalid key: {}", e)))?;

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::InvalidSecret)?,
    );

    serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::Corrupted(format!("Vault payload unreadable: {}", e)))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}
