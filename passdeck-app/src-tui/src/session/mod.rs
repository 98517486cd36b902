//! The session state machine.
//!
//! [`SessionController`] owns the current screen, the attempt counter and
//! the registry. It never blocks: unlocking and secret store I/O are
//! returned as [`Command`]s for the runtime to run in the background, and
//! their results come back as [`AppEvent`]s tagged with a generation so
//! late results can be recognized and dropped.

pub mod event;
pub mod screen;
pub mod search;
pub mod status;
pub mod unlock;

#[cfg(test)]
pub(crate) mod fakes;

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, error, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::clipboard::{ClipboardGuard, ExpiryOutcome};
use crate::storage::{ConfigStore, Settings, VaultDescriptor, VaultRegistry};
use crate::vault::VaultError;

pub use event::{AppEvent, Command, UnlockRequest};
pub use screen::{BrowseState, Screen, SelectState, UnlockState, ViewState};
pub use status::{StatusKind, StatusLine, StatusMessage};
pub use unlock::{UnlockOrchestrator, UnlockOutcome};

/// Failed manual attempts before the user is sent back to vault selection.
pub const MAX_ATTEMPTS: u32 = 3;

pub struct SessionController {
    screen: Screen,
    config: ConfigStore,
    settings: Settings,
    registry: VaultRegistry,
    clipboard: ClipboardGuard,
    status: StatusLine,
    attempts: u32,
    generation: u64,
    cache_warning: Option<String>,
}

impl SessionController {
    pub fn new(
        config: ConfigStore,
        settings: Settings,
        registry: VaultRegistry,
        clipboard: ClipboardGuard,
    ) -> Self {
        Self {
            screen: Screen::default(),
            config,
            settings,
            registry,
            clipboard,
            status: StatusLine::default(),
            attempts: 0,
            generation: 0,
            cache_warning: None,
        }
    }

    /// Note that secrets will not be cached, shown on the selection screen.
    pub fn with_cache_warning(mut self, warning: Option<String>) -> Self {
        self.cache_warning = warning;
        self
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn registry(&self) -> &VaultRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts
    }

    pub fn cache_warning(&self) -> Option<&str> {
        self.cache_warning.as_deref()
    }

    /// Show a message in the status line.
    pub fn notify(&mut self, kind: StatusKind, text: impl Into<String>, now: Instant) {
        self.status.set(kind, text, now);
    }

    /// Begin the silent cache unlock of the startup vault, if there is one.
    pub fn start(&mut self, now: Instant) -> Option<Command> {
        if let Some(reason) = &self.cache_warning {
            let text = format!("Password caching disabled: {}", reason);
            self.status.warning(text, now);
        }

        let target = self
            .registry
            .startup_target(&self.settings.default_vault_path)
            .cloned()?;
        info!("Unlocking {} from cache at startup", target.name);
        let (screen, command) = self.begin_unlock(target);
        self.screen = screen;
        Some(command)
    }

    pub fn handle(&mut self, event: AppEvent) -> Option<Command> {
        self.handle_at(event, Instant::now())
    }

    /// Process one event as of `now`.
    pub fn handle_at(&mut self, event: AppEvent, now: Instant) -> Option<Command> {
        let screen = std::mem::take(&mut self.screen);
        let (screen, command) = match event {
            AppEvent::Key(key) if key.kind == KeyEventKind::Release => (screen, None),
            AppEvent::Key(key) => self.on_key(screen, key, now),
            AppEvent::Paste(text) => (self.on_paste(screen, &text, now), None),
            AppEvent::Tick(at) => (self.on_tick(screen, at), None),
            AppEvent::UnlockFinished {
                generation,
                outcome,
            } => (self.on_unlock_finished(screen, generation, outcome, now), None),
            AppEvent::SecretForgotten { path, result } => {
                match result {
                    Ok(()) => debug!("Cached secret for {} forgotten", path),
                    Err(e) => {
                        warn!("Could not forget cached secret for {}: {}", path, e);
                        self.status
                            .warning(format!("Could not forget cached password: {}", e), now);
                    }
                }
                (screen, None)
            }
            AppEvent::ClipboardExpired(outcome) => {
                match outcome {
                    ExpiryOutcome::Cleared => self.status.info("Clipboard cleared", now),
                    ExpiryOutcome::Failed => self.status.warning("Could not clear clipboard", now),
                    ExpiryOutcome::Skipped => {}
                }
                (screen, None)
            }
        };
        self.screen = screen;
        command
    }

    fn on_key(&mut self, screen: Screen, key: KeyEvent, now: Instant) -> (Screen, Option<Command>) {
        match screen {
            Screen::Selecting(state) if state.adding.is_some() => {
                (self.adding_key(state, key, now), None)
            }
            Screen::Selecting(state) => self.select_key(state, key, now),
            Screen::Unlocking(state) => self.unlock_key(state, key),
            Screen::Browsing(state) => (self.browse_key(state, key, now), None),
            Screen::Viewing(state) => (self.view_key(state, key, now), None),
        }
    }

    fn on_paste(&mut self, screen: Screen, text: &str, now: Instant) -> Screen {
        let text = text.trim_end_matches(['\r', '\n']);
        match screen {
            Screen::Selecting(mut state) => {
                if let Some(path) = state.adding.as_mut() {
                    path.push_str(text);
                }
                Screen::Selecting(state)
            }
            Screen::Unlocking(mut state) => {
                if state.prompt_visible && state.pending.is_none() {
                    state.input.push_str(text);
                }
                Screen::Unlocking(state)
            }
            Screen::Browsing(mut state) => {
                state.push_query(text, now);
                self.refilter_if_due(&mut state, now);
                Screen::Browsing(state)
            }
            other => other,
        }
    }

    // ---------------------------------------------------------------------
    // Selecting
    // ---------------------------------------------------------------------

    fn select_key(
        &mut self,
        mut state: SelectState,
        key: KeyEvent,
        now: Instant,
    ) -> (Screen, Option<Command>) {
        let len = self.registry.vaults.len();
        match key.code {
            KeyCode::Esc => return (Screen::Selecting(state), Some(self.quit())),
            KeyCode::Char('c') if is_ctrl(&key) => {
                return (Screen::Selecting(state), Some(self.quit()))
            }
            KeyCode::Up | KeyCode::Char('k') => state.move_up(),
            KeyCode::Down | KeyCode::Char('j') => state.move_down(len),
            KeyCode::Char('a') => state.adding = Some(String::new()),
            KeyCode::Char('d') => {
                let command = self.unregister(&mut state, now);
                return (Screen::Selecting(state), command);
            }
            KeyCode::Enter => match self.registry.vaults.get(state.selected).cloned() {
                Some(vault) => {
                    let (screen, command) = self.begin_unlock(vault);
                    return (screen, Some(command));
                }
                None => self
                    .status
                    .warning("No vault registered, press 'a' to add one", now),
            },
            _ => {}
        }
        (Screen::Selecting(state), None)
    }

    fn adding_key(&mut self, mut state: SelectState, key: KeyEvent, now: Instant) -> Screen {
        match key.code {
            KeyCode::Esc => state.adding = None,
            KeyCode::Enter => {
                if let Some(input) = state.adding.take() {
                    self.register(&input, &mut state, now);
                }
            }
            KeyCode::Backspace => {
                if let Some(path) = state.adding.as_mut() {
                    path.pop();
                }
            }
            KeyCode::Char(c) if !is_ctrl(&key) => {
                if let Some(path) = state.adding.as_mut() {
                    path.push(c);
                }
            }
            _ => {}
        }
        Screen::Selecting(state)
    }

    fn register(&mut self, input: &str, state: &mut SelectState, now: Instant) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }
        let path = expand_home(input);
        if !Path::new(&path).is_file() {
            self.status.error(format!("File not found: {}", path), now);
            return;
        }

        let descriptor = VaultDescriptor::from_path(path, Utc::now());
        let name = descriptor.name.clone();
        if !self.registry.add(descriptor) {
            self.status.warning(format!("{} is already registered", name), now);
            return;
        }

        info!("Registered vault {}", name);
        state.selected = self.registry.vaults.len() - 1;
        self.persist_registry(now);
        self.status.success(format!("Added {}", name), now);
    }

    fn unregister(&mut self, state: &mut SelectState, now: Instant) -> Option<Command> {
        let removed = self.registry.remove(state.selected)?;
        state.clamp(self.registry.vaults.len());

        info!("Removed vault {}", removed.name);
        self.persist_registry(now);
        self.status.success(format!("Removed {}", removed.name), now);
        Some(Command::ForgetSecret { path: removed.path })
    }

    fn quit(&mut self) -> Command {
        info!("Quitting");
        self.revoke_clipboard();
        Command::Quit
    }

    // ---------------------------------------------------------------------
    // Unlocking
    // ---------------------------------------------------------------------

    /// Enter `Unlocking` for `vault` and request a cache-first unlock.
    fn begin_unlock(&mut self, vault: VaultDescriptor) -> (Screen, Command) {
        self.attempts = 0;
        let generation = self.next_generation();
        debug!("Unlock of {} requested (generation {})", vault.name, generation);

        let state = UnlockState::new(vault.clone(), generation);
        let request = UnlockRequest {
            generation,
            vault,
            secret: Zeroizing::new(String::new()),
        };
        (Screen::Unlocking(state), Command::Unlock(request))
    }

    fn unlock_key(&mut self, mut state: UnlockState, key: KeyEvent) -> (Screen, Option<Command>) {
        if key.code == KeyCode::Esc {
            debug!("Unlock of {} abandoned", state.vault.name);
            self.attempts = 0;
            return (self.selecting_at(&state.vault.path), None);
        }
        if !state.prompt_visible || state.pending.is_some() {
            return (Screen::Unlocking(state), None);
        }

        match key.code {
            KeyCode::Enter if !state.input.is_empty() => {
                let generation = self.next_generation();
                state.pending = Some(generation);
                let request = UnlockRequest {
                    generation,
                    vault: state.vault.clone(),
                    secret: state.take_input(),
                };
                return (Screen::Unlocking(state), Some(Command::Unlock(request)));
            }
            KeyCode::Char('l') if is_ctrl(&key) => state.input.zeroize(),
            KeyCode::Backspace => {
                state.input.pop();
            }
            KeyCode::Char(c) if !is_ctrl(&key) => state.input.push(c),
            _ => {}
        }
        (Screen::Unlocking(state), None)
    }

    fn on_unlock_finished(
        &mut self,
        screen: Screen,
        generation: u64,
        outcome: UnlockOutcome,
        now: Instant,
    ) -> Screen {
        let mut state = match screen {
            Screen::Unlocking(state) if state.awaits(generation) => state,
            other => {
                // Entries in a dropped outcome zeroize themselves.
                debug!(
                    "Dropping unlock result for generation {} on {} screen",
                    generation,
                    other.name()
                );
                return other;
            }
        };

        match outcome {
            UnlockOutcome::Success(entries) => {
                self.registry.mark_used(&state.vault.path, Utc::now());
                self.persist_registry(now);
                self.status.success(
                    format!("Unlocked {} ({} entries)", state.vault.name, entries.len()),
                    now,
                );
                Screen::Browsing(BrowseState::new(
                    state.vault,
                    entries,
                    self.settings.max_search_results,
                    now,
                ))
            }
            UnlockOutcome::NeedsManualEntry => {
                state.show_prompt();
                Screen::Unlocking(state)
            }
            // Only typed secrets produce `Failed`.
            UnlockOutcome::Failed(e) => {
                self.attempts += 1;
                if self.attempts >= MAX_ATTEMPTS {
                    info!(
                        "{} failed attempts on {}, returning to vault selection",
                        self.attempts, state.vault.name
                    );
                    self.status
                        .warning("Too many failed attempts, vault locked", now);
                    return self.selecting_at(&state.vault.path);
                }

                let text = match e {
                    VaultError::InvalidSecret => format!(
                        "Wrong password (attempt {} of {})",
                        self.attempts, MAX_ATTEMPTS
                    ),
                    other => format!("Could not open vault: {}", other),
                };
                self.status.error(text, now);
                state.show_prompt();
                Screen::Unlocking(state)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Browsing and viewing
    // ---------------------------------------------------------------------

    fn browse_key(&mut self, mut state: BrowseState, key: KeyEvent, now: Instant) -> Screen {
        match key.code {
            KeyCode::Esc => return self.close_vault(state),
            KeyCode::Enter => {
                if let Some(index) = state.selected_index() {
                    return Screen::Viewing(ViewState::new(state, index));
                }
            }
            KeyCode::Up => state.move_up(),
            KeyCode::Down => state.move_down(),
            KeyCode::Char('b') if is_ctrl(&key) => {
                if let Some(entry) = state.selected_entry() {
                    self.copy_to_clipboard("Username", &entry.username, now);
                }
            }
            KeyCode::Char('c') if is_ctrl(&key) => {
                if let Some(entry) = state.selected_entry() {
                    self.copy_to_clipboard("Password", &entry.secret, now);
                }
            }
            KeyCode::Char('x') if is_ctrl(&key) => self.clear_clipboard(now),
            KeyCode::Char('l') if is_ctrl(&key) => {
                state.clear_query(self.settings.max_search_results)
            }
            KeyCode::Backspace => {
                state.pop_query(now);
                self.refilter_if_due(&mut state, now);
            }
            KeyCode::Char(c) if !is_ctrl(&key) => {
                state.push_query(c.encode_utf8(&mut [0u8; 4]), now);
                self.refilter_if_due(&mut state, now);
            }
            _ => {}
        }
        Screen::Browsing(state)
    }

    fn view_key(&mut self, mut state: ViewState, key: KeyEvent, now: Instant) -> Screen {
        match key.code {
            KeyCode::Esc => return Screen::Browsing(state.browse),
            KeyCode::Char('p') if is_ctrl(&key) => state.revealed = !state.revealed,
            KeyCode::Char('b') if is_ctrl(&key) => {
                if let Some(entry) = state.entry() {
                    self.copy_to_clipboard("Username", &entry.username, now);
                }
            }
            KeyCode::Char('c') if is_ctrl(&key) => {
                if let Some(entry) = state.entry() {
                    self.copy_to_clipboard("Password", &entry.secret, now);
                }
            }
            KeyCode::Char('x') if is_ctrl(&key) => self.clear_clipboard(now),
            KeyCode::Up | KeyCode::Char('k') => state.scroll_up(),
            KeyCode::Down | KeyCode::Char('j') => state.scroll_down(),
            _ => {}
        }
        Screen::Viewing(state)
    }

    fn refilter_if_due(&self, state: &mut BrowseState, now: Instant) {
        state.refilter_if_due(
            self.settings.search_debounce(),
            self.settings.max_search_results,
            now,
        );
    }

    fn copy_to_clipboard(&mut self, label: &str, value: &str, now: Instant) {
        if value.is_empty() {
            self.status.warning(format!("{} is empty", label), now);
            return;
        }

        let ttl = self.settings.clipboard_ttl();
        match self.clipboard.copy(value, ttl) {
            Ok(()) if ttl.is_zero() => self.status.success(format!("{} copied", label), now),
            Ok(()) => self.status.success(
                format!("{} copied, clears in {}s", label, ttl.as_secs()),
                now,
            ),
            Err(e) => {
                warn!("Copy to clipboard failed: {}", e);
                self.status.error(format!("Clipboard unavailable: {}", e), now);
            }
        }
    }

    fn clear_clipboard(&mut self, now: Instant) {
        match self.clipboard.clear() {
            Ok(()) => self.status.success("Clipboard cleared", now),
            Err(e) => {
                warn!("Clearing clipboard failed: {}", e);
                self.status.error(format!("Clipboard unavailable: {}", e), now);
            }
        }
    }

    fn revoke_clipboard(&self) {
        if let Err(e) = self.clipboard.revoke() {
            warn!("Could not revoke clipboard lease: {}", e);
        }
    }

    /// Scrub the entries, revoke any copied secret and return to selection.
    fn close_vault(&mut self, state: BrowseState) -> Screen {
        let path = state.vault.path.clone();
        info!("Closing vault {}", state.vault.name);
        state.close();
        self.revoke_clipboard();
        self.selecting_at(&path)
    }

    fn on_tick(&mut self, screen: Screen, now: Instant) -> Screen {
        self.status.expire(now);

        let browse = match &screen {
            Screen::Browsing(state) => Some(state),
            Screen::Viewing(state) => Some(&state.browse),
            _ => None,
        };
        let timed_out = match (browse, self.settings.session_timeout()) {
            (Some(state), Some(timeout)) => state.is_expired(timeout, now),
            _ => false,
        };

        match screen {
            Screen::Browsing(state) if timed_out => self.expire_session(state, now),
            Screen::Viewing(state) if timed_out => self.expire_session(state.browse, now),
            Screen::Browsing(mut state) => {
                self.refilter_if_due(&mut state, now);
                Screen::Browsing(state)
            }
            other => other,
        }
    }

    fn expire_session(&mut self, state: BrowseState, now: Instant) -> Screen {
        info!("Session for {} timed out", state.vault.name);
        let screen = self.close_vault(state);
        self.status.warning("Session expired, vault locked", now);
        screen
    }

    fn selecting_at(&self, path: &str) -> Screen {
        let index = self
            .registry
            .vaults
            .iter()
            .position(|v| v.path == path)
            .unwrap_or(0);
        Screen::Selecting(SelectState::at(index))
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn persist_registry(&mut self, now: Instant) {
        if let Err(e) = self.config.save_registry(&self.registry) {
            error!("Failed to save vault registry: {}", e);
            self.status
                .error(format!("Could not save vault list: {}", e), now);
        }
    }
}

fn is_ctrl(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardBackend, MemoryClipboard};
    use fakes::FakeLoader;
    use passdeck_secret::{MemorySecretStore, SecretCache, SecretStore};
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        _tmp: tempfile::TempDir,
        config: ConfigStore,
        controller: SessionController,
        orchestrator: UnlockOrchestrator,
        loader: FakeLoader,
        store: Arc<MemorySecretStore>,
        clipboard: Arc<MemoryClipboard>,
        now: Instant,
    }

    impl Harness {
        fn new(vaults: &[(&str, &str)], last_used: &str) -> Self {
            Self::with_settings(vaults, last_used, Settings::default())
        }

        fn with_settings(vaults: &[(&str, &str)], last_used: &str, settings: Settings) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let config = ConfigStore::open(tmp.path()).unwrap();
            let registry = VaultRegistry {
                vaults: vaults
                    .iter()
                    .map(|(name, path)| VaultDescriptor {
                        name: name.to_string(),
                        path: path.to_string(),
                        last_accessed: Default::default(),
                    })
                    .collect(),
                last_used: last_used.to_string(),
            };
            config.save_registry(&registry).unwrap();

            let loader = FakeLoader::with_titles("master", &["mail", "vpn", "bank"]);
            let store = Arc::new(MemorySecretStore::new());
            let orchestrator = UnlockOrchestrator::new(
                Arc::new(loader.clone()),
                Arc::new(SecretCache::active(store.clone())),
            );
            let clipboard = Arc::new(MemoryClipboard::new());
            let controller = SessionController::new(
                config.clone(),
                settings,
                registry,
                ClipboardGuard::new(clipboard.clone()),
            );

            Self {
                _tmp: tmp,
                config,
                controller,
                orchestrator,
                loader,
                store,
                clipboard,
                now: Instant::now(),
            }
        }

        fn send(&mut self, event: AppEvent) -> Option<Command> {
            self.controller.handle_at(event, self.now)
        }

        fn key(&mut self, code: KeyCode) -> Option<Command> {
            self.send(AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
        }

        fn ctrl(&mut self, c: char) -> Option<Command> {
            self.send(AppEvent::Key(KeyEvent::new(
                KeyCode::Char(c),
                KeyModifiers::CONTROL,
            )))
        }

        fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                assert!(self.key(KeyCode::Char(c)).is_none());
            }
        }

        fn start(&mut self) -> Option<Command> {
            self.controller.start(self.now)
        }

        /// Run an unlock request the way the runtime would and deliver its result.
        fn run(&mut self, command: Option<Command>) -> Option<Command> {
            match command {
                Some(Command::Unlock(request)) => {
                    let outcome = self.orchestrator.unlock(&request.vault, &request.secret);
                    self.send(AppEvent::UnlockFinished {
                        generation: request.generation,
                        outcome,
                    })
                }
                other => other,
            }
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
            let now = self.now;
            self.send(AppEvent::Tick(now));
        }

        fn screen(&self) -> &'static str {
            self.controller.screen().name()
        }

        fn unlock_state(&self) -> &UnlockState {
            match self.controller.screen() {
                Screen::Unlocking(state) => state,
                _ => panic!("not unlocking: {}", self.screen()),
            }
        }

        fn browse_state(&self) -> &BrowseState {
            self.controller.screen().browse().expect("vault not open")
        }

        fn status_text(&self) -> String {
            self.controller
                .status()
                .current()
                .map(|m| m.text.clone())
                .unwrap_or_default()
        }

        fn submit(&mut self, secret: &str) {
            self.type_text(secret);
            let command = self.key(KeyCode::Enter);
            match &command {
                Some(Command::Unlock(request)) => assert!(request.is_manual()),
                other => panic!("expected manual unlock, got {:?}", other),
            }
            assert!(self.run(command).is_none());
        }
    }

    #[test]
    fn test_three_wrong_passwords_lock_out() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "");
        assert!(h.start().is_none());
        assert_eq!(h.screen(), "selecting");

        let command = h.key(KeyCode::Enter);
        match &command {
            Some(Command::Unlock(request)) => {
                assert!(!request.is_manual());
                assert_eq!(request.vault.path, "/v/work");
            }
            other => panic!("expected unlock, got {:?}", other),
        }
        h.run(command);
        assert!(h.unlock_state().prompt_visible);
        assert_eq!(h.controller.attempt_count(), 0);

        h.submit("wrong");
        assert_eq!(h.controller.attempt_count(), 1);
        assert_eq!(h.screen(), "unlocking");
        assert!(h.unlock_state().input.is_empty());
        assert!(h.unlock_state().prompt_visible);

        h.submit("wrong");
        assert_eq!(h.controller.attempt_count(), 2);
        assert_eq!(h.screen(), "unlocking");

        h.submit("wrong");
        assert_eq!(h.controller.attempt_count(), 3);
        assert_eq!(h.screen(), "selecting");
        assert!(h.status_text().contains("Too many"));

        // Selecting the vault again starts a fresh count
        let command = h.key(KeyCode::Enter);
        h.run(command);
        assert_eq!(h.controller.attempt_count(), 0);
        h.submit("master");
        assert_eq!(h.screen(), "browsing");
    }

    #[test]
    fn test_cached_unlock_never_shows_prompt() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "/v/work");
        h.store.store("/v/work", b"master").unwrap();

        let command = h.start();
        assert!(command.is_some());
        assert!(!h.unlock_state().prompt_visible);

        h.run(command);
        assert_eq!(h.screen(), "browsing");
        assert_eq!(h.browse_state().entries().len(), 3);
        assert_eq!(h.loader.closes(), 1);

        let saved = h.config.load_registry().unwrap();
        assert_eq!(saved.last_used, "/v/work");
        assert!(saved.vaults[0].last_accessed > chrono::DateTime::<Utc>::default());
    }

    #[test]
    fn test_stale_cache_prompts_without_penalty() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "/v/work");
        h.store.store("/v/work", b"old master").unwrap();

        let command = h.start();
        h.run(command);
        assert_eq!(h.screen(), "unlocking");
        assert!(h.unlock_state().prompt_visible);
        assert_eq!(h.controller.attempt_count(), 0);

        h.submit("master");
        assert_eq!(h.screen(), "browsing");
        assert_eq!(h.store.get("/v/work").unwrap().as_slice(), b"master");
    }

    #[test]
    fn test_default_vault_is_startup_fallback() {
        let settings = Settings {
            default_vault_path: "/v/home".into(),
            ..Settings::default()
        };
        let mut h = Harness::with_settings(
            &[("work.vault", "/v/work"), ("home.vault", "/v/home")],
            "",
            settings,
        );
        match h.start() {
            Some(Command::Unlock(request)) => assert_eq!(request.vault.path, "/v/home"),
            other => panic!("expected unlock, got {:?}", other),
        }
    }

    #[test]
    fn test_prompt_ignores_keys_while_pending() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "");
        let first = h.key(KeyCode::Enter);
        h.type_text("typed too early");
        assert!(h.unlock_state().input.is_empty());
        h.run(first);

        h.type_text("abc");
        h.key(KeyCode::Backspace);
        assert_eq!(h.unlock_state().input.as_str(), "ab");
        h.ctrl('l');
        assert!(h.unlock_state().input.is_empty());
        assert!(h.key(KeyCode::Enter).is_none());
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "");
        h.store.store("/v/work", b"master").unwrap();

        let first = h.key(KeyCode::Enter);
        h.key(KeyCode::Esc);
        assert_eq!(h.screen(), "selecting");
        let second = h.key(KeyCode::Enter);

        h.run(first);
        assert_eq!(h.screen(), "unlocking");
        assert!(!h.unlock_state().prompt_visible);

        h.run(second);
        assert_eq!(h.screen(), "browsing");
    }

    #[test]
    fn test_result_after_escape_is_discarded() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "");
        h.store.store("/v/work", b"master").unwrap();

        let command = h.key(KeyCode::Enter);
        h.key(KeyCode::Esc);
        h.run(command);
        assert_eq!(h.screen(), "selecting");
        assert!(h.controller.registry().last_used.is_empty());
        assert_eq!(h.loader.closes(), 1);
    }

    #[test]
    fn test_escape_walks_back_and_quits_only_from_selecting() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "/v/work");
        h.store.store("/v/work", b"master").unwrap();
        let command = h.start();
        h.run(command);

        assert!(h.key(KeyCode::Enter).is_none());
        assert_eq!(h.screen(), "viewing");
        h.ctrl('p');
        match h.controller.screen() {
            Screen::Viewing(view) => {
                assert!(view.revealed);
                assert_eq!(view.entry().unwrap().title, "mail");
            }
            _ => unreachable!(),
        }

        assert!(h.key(KeyCode::Esc).is_none());
        assert_eq!(h.screen(), "browsing");
        assert!(h.key(KeyCode::Esc).is_none());
        assert_eq!(h.screen(), "selecting");
        assert!(matches!(h.key(KeyCode::Esc), Some(Command::Quit)));
    }

    #[tokio::test]
    async fn test_closing_vault_revokes_copied_secret() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "/v/work");
        h.store.store("/v/work", b"master").unwrap();
        let command = h.start();
        h.run(command);

        h.ctrl('c');
        assert_eq!(h.clipboard.get_text().unwrap(), "mail-pw");
        assert!(h.status_text().contains("clears in 30s"));

        h.key(KeyCode::Esc);
        assert_eq!(h.screen(), "selecting");
        assert_eq!(h.clipboard.get_text().unwrap(), "");
    }

    #[tokio::test]
    async fn test_closing_vault_keeps_foreign_clipboard_content() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "/v/work");
        h.store.store("/v/work", b"master").unwrap();
        let command = h.start();
        h.run(command);

        h.ctrl('b');
        assert_eq!(h.clipboard.get_text().unwrap(), "mail-user");
        h.clipboard.set_text("my own text").unwrap();

        h.key(KeyCode::Esc);
        assert_eq!(h.clipboard.get_text().unwrap(), "my own text");
    }

    #[tokio::test]
    async fn test_explicit_clear_and_unavailable_clipboard() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "/v/work");
        h.store.store("/v/work", b"master").unwrap();
        let command = h.start();
        h.run(command);

        h.ctrl('c');
        h.ctrl('x');
        assert_eq!(h.clipboard.get_text().unwrap(), "");

        h.clipboard.set_unavailable(true);
        h.ctrl('c');
        assert!(h.status_text().contains("Clipboard unavailable"));
        assert_eq!(h.screen(), "browsing");
    }

    #[test]
    fn test_search_is_debounced_until_tick() {
        let mut h = Harness::new(&[("work.vault", "/v/work")], "/v/work");
        h.store.store("/v/work", b"master").unwrap();
        let command = h.start();
        h.run(command);

        h.type_text("vp");
        assert_eq!(h.browse_state().results().len(), 3);

        h.advance(Duration::from_millis(150));
        assert_eq!(h.browse_state().results(), &[1]);
        assert_eq!(h.browse_state().selected_entry().unwrap().title, "vpn");

        h.ctrl('l');
        assert_eq!(h.browse_state().results().len(), 3);
    }

    #[test]
    fn test_session_timeout_locks_vault() {
        let settings = Settings {
            session_timeout_hours: 1,
            ..Settings::default()
        };
        let mut h = Harness::with_settings(&[("work.vault", "/v/work")], "/v/work", settings);
        h.store.store("/v/work", b"master").unwrap();
        let command = h.start();
        h.run(command);
        h.key(KeyCode::Enter);

        h.advance(Duration::from_secs(1800));
        assert_eq!(h.screen(), "viewing");

        h.advance(Duration::from_secs(1801));
        assert_eq!(h.screen(), "selecting");
        assert!(h.status_text().contains("Session expired"));
    }

    #[test]
    fn test_status_message_expires() {
        let mut h = Harness::new(&[], "");
        h.key(KeyCode::Enter);
        assert!(h.status_text().contains("No vault registered"));

        h.advance(Duration::from_secs(1));
        assert!(!h.status_text().is_empty());
        h.advance(Duration::from_secs(3));
        assert!(h.status_text().is_empty());
    }

    #[test]
    fn test_add_and_remove_vaults() {
        let mut h = Harness::new(&[], "");
        let vault_file = h._tmp.path().join("personal.vault");
        std::fs::write(&vault_file, b"PDV1").unwrap();
        let vault_path = vault_file.to_string_lossy().to_string();

        h.key(KeyCode::Char('a'));
        h.type_text("/does/not/exist");
        h.key(KeyCode::Enter);
        assert!(h.status_text().contains("File not found"));
        assert!(h.controller.registry().vaults.is_empty());

        h.key(KeyCode::Char('a'));
        h.send(AppEvent::Paste(format!("{}\n", vault_path)));
        h.key(KeyCode::Enter);
        assert_eq!(h.controller.registry().vaults.len(), 1);
        assert_eq!(h.controller.registry().vaults[0].name, "personal.vault");
        assert_eq!(h.config.load_registry().unwrap().vaults.len(), 1);

        h.key(KeyCode::Char('a'));
        h.type_text(&vault_path);
        h.key(KeyCode::Enter);
        assert!(h.status_text().contains("already registered"));
        assert_eq!(h.controller.registry().vaults.len(), 1);

        match h.key(KeyCode::Char('d')) {
            Some(Command::ForgetSecret { path }) => assert_eq!(path, vault_path),
            other => panic!("expected forget, got {:?}", other),
        }
        assert!(h.controller.registry().vaults.is_empty());
        assert!(h.config.load_registry().unwrap().vaults.is_empty());
        assert!(h.key(KeyCode::Char('d')).is_none());
    }

    #[test]
    fn test_forget_failure_is_reported() {
        let mut h = Harness::new(&[], "");
        h.send(AppEvent::SecretForgotten {
            path: "/v/work".into(),
            result: Err(passdeck_secret::Error::AccessDenied),
        });
        assert!(h.status_text().contains("Could not forget"));
    }

    #[test]
    fn test_cache_warning_is_shown_at_start() {
        let mut h = Harness::new(&[], "");
        h.controller = SessionController::new(
            h.config.clone(),
            Settings::default(),
            VaultRegistry::default(),
            ClipboardGuard::new(h.clipboard.clone()),
        )
        .with_cache_warning(Some("no keyring".into()));

        assert!(h.start().is_none());
        assert!(h.status_text().contains("no keyring"));
        assert_eq!(h.controller.cache_warning(), Some("no keyring"));
    }

    #[test]
    fn test_clipboard_expiry_reported() {
        let mut h = Harness::new(&[], "");
        h.send(AppEvent::ClipboardExpired(ExpiryOutcome::Skipped));
        assert!(h.status_text().is_empty());
        h.send(AppEvent::ClipboardExpired(ExpiryOutcome::Cleared));
        assert_eq!(h.status_text(), "Clipboard cleared");
    }

    #[test]
    fn test_selection_moves_with_arrows_and_vim_keys() {
        let mut h = Harness::new(
            &[("a.vault", "/v/a"), ("b.vault", "/v/b"), ("c.vault", "/v/c")],
            "",
        );
        h.key(KeyCode::Down);
        h.key(KeyCode::Char('j'));
        h.key(KeyCode::Char('j'));
        h.key(KeyCode::Char('k'));
        match h.key(KeyCode::Enter) {
            Some(Command::Unlock(request)) => assert_eq!(request.vault.path, "/v/b"),
            other => panic!("expected unlock, got {:?}", other),
        }
    }
}
