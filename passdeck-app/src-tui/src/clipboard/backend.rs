use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{PassDeckError, Result};

/// Read/write access to a text clipboard.
pub trait ClipboardBackend: Send + Sync {
    fn get_text(&self) -> Result<String>;
    fn set_text(&self, text: &str) -> Result<()>;

    /// Write empty content.
    fn clear(&self) -> Result<()> {
        self.set_text("")
    }
}

/// The OS clipboard via `arboard`.
///
/// The handle is opened on first use and kept for the life of the process:
/// on X11 and Wayland the content disappears with the owning handle.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_clipboard<T>(
        &self,
        f: impl FnOnce(&mut arboard::Clipboard) -> std::result::Result<T, arboard::Error>,
    ) -> Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| PassDeckError::Clipboard("Clipboard lock poisoned".into()))?;

        if guard.is_none() {
            debug!("Opening system clipboard");
            let clipboard =
                arboard::Clipboard::new().map_err(|e| PassDeckError::Clipboard(e.to_string()))?;
            *guard = Some(clipboard);
        }

        match guard.as_mut() {
            Some(clipboard) => f(clipboard).map_err(|e| PassDeckError::Clipboard(e.to_string())),
            None => Err(PassDeckError::Clipboard("Clipboard not available".into())),
        }
    }
}

impl ClipboardBackend for SystemClipboard {
    fn get_text(&self) -> Result<String> {
        self.with_clipboard(|c| match c.get_text() {
            Ok(text) => Ok(text),
            // Empty or non-text content
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(e),
        })
    }

    fn set_text(&self, text: &str) -> Result<()> {
        self.with_clipboard(|c| c.set_text(text.to_owned()))
    }

    fn clear(&self) -> Result<()> {
        self.with_clipboard(|c| c.clear())
    }
}

/// In-process clipboard for tests.
#[derive(Default)]
pub struct MemoryClipboard {
    content: Mutex<String>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes, clears included.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent operation fail, as an absent display server would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PassDeckError::Clipboard("Clipboard not available".into()));
        }
        Ok(())
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn get_text(&self) -> Result<String> {
        self.check_available()?;
        let content = self
            .content
            .lock()
            .map_err(|_| PassDeckError::Clipboard("Clipboard lock poisoned".into()))?;
        Ok(content.clone())
    }

    fn set_text(&self, text: &str) -> Result<()> {
        self.check_available()?;
        let mut content = self
            .content
            .lock()
            .map_err(|_| PassDeckError::Clipboard("Clipboard lock poisoned".into()))?;
        *content = text.to_owned();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
