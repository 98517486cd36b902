use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use subtle::ConstantTimeEq;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::backend::ClipboardBackend;
use crate::error::{PassDeckError, Result};

/// What an expiry timer did when it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// The clipboard still held the leased secret and was wiped.
    Cleared,
    /// The clipboard content had changed, or the lease was replaced.
    Skipped,
    /// The clipboard could not be read or written.
    Failed,
}

/// Public view of the current lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseInfo {
    pub created_at: Instant,
    pub ttl: Duration,
    pub armed: bool,
}

impl LeaseInfo {
    pub fn deadline(&self) -> Option<Instant> {
        self.armed.then(|| self.created_at + self.ttl)
    }
}

/// Bookkeeping for the secret most recently copied.
struct ClipboardLease {
    id: u64,
    snapshot: Arc<Zeroizing<String>>,
    created_at: Instant,
    ttl: Duration,
    timer: Option<JoinHandle<()>>,
}

impl ClipboardLease {
    fn armed(&self) -> bool {
        self.timer.is_some()
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct LeaseSlot {
    next_id: u64,
    current: Option<ClipboardLease>,
}

struct Shared {
    backend: Arc<dyn ClipboardBackend>,
    slot: Mutex<LeaseSlot>,
    expiry_tx: Option<mpsc::UnboundedSender<ExpiryOutcome>>,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, LeaseSlot>> {
        self.slot
            .lock()
            .map_err(|_| PassDeckError::Clipboard("Lease lock poisoned".into()))
    }

    fn holds(&self, snapshot: &str) -> Result<bool> {
        let current = Zeroizing::new(self.backend.get_text()?);
        Ok(bool::from(current.as_bytes().ct_eq(snapshot.as_bytes())))
    }

    /// Runs when lease `id` reaches its deadline.
    fn expire(&self, id: u64, snapshot: &str) -> ExpiryOutcome {
        let outcome = self.expire_lease(id, snapshot);
        debug!("Clipboard lease {} expired: {:?}", id, outcome);
        if let Some(tx) = &self.expiry_tx {
            let _ = tx.send(outcome);
        }
        outcome
    }

    fn expire_lease(&self, id: u64, snapshot: &str) -> ExpiryOutcome {
        let mut slot = match self.lock() {
            Ok(slot) => slot,
            Err(e) => {
                warn!("Clipboard expiry skipped: {}", e);
                return ExpiryOutcome::Failed;
            }
        };

        // A timer that woke while the lock was held outlives its abort. Only
        // the current, still armed lease may clear, even if a newer copy wrote
        // the same text.
        let Some(lease) = slot.current.as_mut().filter(|lease| lease.id == id) else {
            debug!("Clipboard lease {} was replaced before expiry", id);
            return ExpiryOutcome::Skipped;
        };
        if !lease.armed() {
            debug!("Clipboard lease {} was cancelled before expiry", id);
            return ExpiryOutcome::Skipped;
        }
        // Running in this timer's own task; nothing to abort.
        lease.timer = None;

        let outcome = match self.holds(snapshot) {
            Ok(true) => match self.backend.clear() {
                Ok(()) => ExpiryOutcome::Cleared,
                Err(e) => {
                    warn!("Failed to clear clipboard on expiry: {}", e);
                    ExpiryOutcome::Failed
                }
            },
            Ok(false) => ExpiryOutcome::Skipped,
            Err(e) => {
                warn!("Failed to read clipboard on expiry: {}", e);
                ExpiryOutcome::Failed
            }
        };

        if outcome == ExpiryOutcome::Cleared {
            slot.current = None;
        }
        outcome
    }
}

/// Copies secrets to the clipboard and wipes them again after a deadline.
///
/// At most one lease is armed at a time. Copying, clearing and a firing timer
/// all serialize on the lease lock, and a timer only ever compares the
/// clipboard against the text it was armed with.
///
/// Arming a timer spawns a tokio task, so `copy` must run inside a runtime.
#[derive(Clone)]
pub struct ClipboardGuard {
    shared: Arc<Shared>,
}

impl ClipboardGuard {
    pub fn new(backend: Arc<dyn ClipboardBackend>) -> Self {
        Self::build(backend, None)
    }

    /// Like [`ClipboardGuard::new`], reporting every timer firing on `tx`.
    pub fn with_expiry_notifier(
        backend: Arc<dyn ClipboardBackend>,
        tx: mpsc::UnboundedSender<ExpiryOutcome>,
    ) -> Self {
        Self::build(backend, Some(tx))
    }

    fn build(
        backend: Arc<dyn ClipboardBackend>,
        expiry_tx: Option<mpsc::UnboundedSender<ExpiryOutcome>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                slot: Mutex::new(LeaseSlot::default()),
                expiry_tx,
            }),
        }
    }

    /// Write `secret` to the clipboard and start a new lease.
    ///
    /// The previous lease's timer is retired without touching the clipboard.
    /// A zero `ttl` leaves the secret in place until something else clears it.
    pub fn copy(&self, secret: &str, ttl: Duration) -> Result<()> {
        let mut slot = self.shared.lock()?;

        self.shared.backend.set_text(secret)?;

        if let Some(mut previous) = slot.current.take() {
            previous.disarm();
        }

        slot.next_id += 1;
        let id = slot.next_id;
        let snapshot = Arc::new(Zeroizing::new(secret.to_owned()));

        let timer = (!ttl.is_zero()).then(|| {
            let shared = self.shared.clone();
            let snapshot = snapshot.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                shared.expire(id, &snapshot);
            })
        });

        debug!(
            "Clipboard lease {} started (ttl {:?}, armed: {})",
            id,
            ttl,
            timer.is_some()
        );
        slot.current = Some(ClipboardLease {
            id,
            snapshot,
            created_at: Instant::now(),
            ttl,
            timer,
        });
        Ok(())
    }

    /// Cancel any pending expiry and wipe the clipboard unconditionally.
    pub fn clear(&self) -> Result<()> {
        let mut slot = self.shared.lock()?;
        if let Some(mut lease) = slot.current.take() {
            lease.disarm();
        }
        self.shared.backend.clear()?;
        info!("Clipboard cleared");
        Ok(())
    }

    /// Current clipboard text.
    pub fn get(&self) -> Result<String> {
        self.shared.backend.get_text()
    }

    /// Stop the pending timer, leaving the clipboard untouched.
    ///
    /// The lease is kept, so a later [`ClipboardGuard::revoke`] still
    /// recognizes the secret.
    pub fn cancel_pending_expiry(&self) -> Result<()> {
        let mut slot = self.shared.lock()?;
        cancel_expiry(&mut slot);
        Ok(())
    }

    /// End the current lease, wiping the clipboard only if it still holds
    /// the leased secret. Returns whether anything was wiped.
    pub fn revoke(&self) -> Result<bool> {
        let mut slot = self.shared.lock()?;
        let Some(mut lease) = slot.current.take() else {
            return Ok(false);
        };
        lease.disarm();

        if self.shared.holds(&lease.snapshot)? {
            self.shared.backend.clear()?;
            info!("Clipboard lease {} revoked, clipboard wiped", lease.id);
            Ok(true)
        } else {
            debug!("Clipboard lease {} revoked, content already changed", lease.id);
            Ok(false)
        }
    }

    pub fn lease(&self) -> Option<LeaseInfo> {
        let slot = self.shared.lock().ok()?;
        slot.current.as_ref().map(|lease| LeaseInfo {
            created_at: lease.created_at,
            ttl: lease.ttl,
            armed: lease.armed(),
        })
    }

    pub fn is_armed(&self) -> bool {
        self.lease().is_some_and(|lease| lease.armed)
    }
}

fn cancel_expiry(slot: &mut LeaseSlot) {
    if let Some(lease) = slot.current.as_mut() {
        if lease.armed() {
            debug!("Clipboard lease {} expiry cancelled", lease.id);
        }
        lease.disarm();
    }
}
