use std::time::{Duration, Instant};

/// How long a status message stays visible.
pub const STATUS_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
    pub set_at: Instant,
}

/// The one-line message area under every screen.
#[derive(Debug, Default)]
pub struct StatusLine {
    current: Option<StatusMessage>,
}

impl StatusLine {
    pub fn set(&mut self, kind: StatusKind, text: impl Into<String>, now: Instant) {
        self.current = Some(StatusMessage {
            kind,
            text: text.into(),
            set_at: now,
        });
    }

    pub fn info(&mut self, text: impl Into<String>, now: Instant) {
        self.set(StatusKind::Info, text, now);
    }

    pub fn success(&mut self, text: impl Into<String>, now: Instant) {
        self.set(StatusKind::Success, text, now);
    }

    pub fn warning(&mut self, text: impl Into<String>, now: Instant) {
        self.set(StatusKind::Warning, text, now);
    }

    pub fn error(&mut self, text: impl Into<String>, now: Instant) {
        self.set(StatusKind::Error, text, now);
    }

    /// Drop the message once it is older than [`STATUS_TTL`].
    pub fn expire(&mut self, now: Instant) {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|m| now.saturating_duration_since(m.set_at) >= STATUS_TTL);
        if expired {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }
}
