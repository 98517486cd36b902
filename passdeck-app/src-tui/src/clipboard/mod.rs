//! Short-lived clipboard exposure of secrets.

pub mod backend;
pub mod guard;

pub use backend::{ClipboardBackend, MemoryClipboard, SystemClipboard};
pub use guard::{ClipboardGuard, ExpiryOutcome, LeaseInfo};
