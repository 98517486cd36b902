use std::time::Instant;

use crossterm::event::KeyEvent;
use zeroize::Zeroizing;

use super::unlock::UnlockOutcome;
use crate::clipboard::ExpiryOutcome;
use crate::storage::VaultDescriptor;

/// Everything the event loop feeds into the controller.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Paste(String),
    Tick(Instant),
    /// Exactly one per [`UnlockRequest`], tagged with its generation.
    UnlockFinished {
        generation: u64,
        outcome: UnlockOutcome,
    },
    SecretForgotten {
        path: String,
        result: passdeck_secret::Result<()>,
    },
    ClipboardExpired(ExpiryOutcome),
}

/// Side effects the controller asks the runtime to perform.
#[derive(Debug)]
pub enum Command {
    Unlock(UnlockRequest),
    ForgetSecret { path: String },
    Quit,
}

pub struct UnlockRequest {
    pub generation: u64,
    pub vault: VaultDescriptor,
    /// Empty for a cache-first attempt.
    pub secret: Zeroizing<String>,
}

impl UnlockRequest {
    /// Whether the user typed the secret.
    pub fn is_manual(&self) -> bool {
        !self.secret.is_empty()
    }
}

impl std::fmt::Debug for UnlockRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockRequest")
            .field("generation", &self.generation)
            .field("vault", &self.vault.path)
            .field("manual", &self.is_manual())
            .finish()
    }
}
