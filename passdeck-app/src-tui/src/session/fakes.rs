//! Test doubles for the unlock path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::vault::{CredentialEntry, VaultError, VaultHandle, VaultLoader, VaultResult};

/// Opens a single in-memory vault when given the right secret.
#[derive(Clone)]
pub struct FakeLoader {
    secret: Arc<Mutex<String>>,
    entries: Vec<CredentialEntry>,
    loads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    pub last_path: Arc<Mutex<Option<PathBuf>>>,
}

impl FakeLoader {
    pub fn new(secret: &str, entries: Vec<CredentialEntry>) -> Self {
        Self {
            secret: Arc::new(Mutex::new(secret.to_string())),
            entries,
            loads: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            last_path: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_titles(secret: &str, titles: &[&str]) -> Self {
        let entries = titles
            .iter()
            .map(|t| CredentialEntry::new(*t, format!("{t}-user"), format!("{t}-pw")))
            .collect();
        Self::new(secret, entries)
    }

    /// Simulate a master password change.
    pub fn rotate_secret(&self, secret: &str) {
        *self.secret.lock().unwrap() = secret.to_string();
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl VaultLoader for FakeLoader {
    fn load(&self, path: &Path, secret: &[u8]) -> VaultResult<Box<dyn VaultHandle>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(path.to_path_buf());
        if secret != self.secret.lock().unwrap().as_bytes() {
            return Err(VaultError::InvalidSecret);
        }
        Ok(Box::new(FakeHandle {
            entries: Some(self.entries.clone()),
            closes: self.closes.clone(),
        }))
    }
}

struct FakeHandle {
    entries: Option<Vec<CredentialEntry>>,
    closes: Arc<AtomicUsize>,
}

impl VaultHandle for FakeHandle {
    fn entries(&self) -> VaultResult<Vec<CredentialEntry>> {
        self.entries.clone().ok_or(VaultError::Closed)
    }

    fn close(&mut self) -> VaultResult<()> {
        if self.entries.take().is_some() {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
