//! Per-screen state.
//!
//! Decrypted entries only exist inside [`BrowseState`], and [`ViewState`]
//! owns the browse state it returns to, so no other screen can hold them.

use std::time::{Duration, Instant};

use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use super::search;
use crate::storage::VaultDescriptor;
use crate::vault::CredentialEntry;

pub enum Screen {
    Selecting(SelectState),
    Unlocking(UnlockState),
    Browsing(BrowseState),
    Viewing(ViewState),
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Selecting(_) => "selecting",
            Screen::Unlocking(_) => "unlocking",
            Screen::Browsing(_) => "browsing",
            Screen::Viewing(_) => "viewing",
        }
    }

    /// Browse state of an unlocked vault, on either screen that has one.
    pub fn browse(&self) -> Option<&BrowseState> {
        match self {
            Screen::Browsing(browse) => Some(browse),
            Screen::Viewing(view) => Some(&view.browse),
            _ => None,
        }
    }
}

impl Default for Screen {
    fn default() -> Self {
        Screen::Selecting(SelectState::default())
    }
}

#[derive(Debug, Default)]
pub struct SelectState {
    pub selected: usize,
    /// Path being typed after `a`, `None` when not adding.
    pub adding: Option<String>,
}

impl SelectState {
    pub fn at(selected: usize) -> Self {
        Self {
            selected,
            adding: None,
        }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self, len: usize) {
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    /// Keep the selection inside a list of `len` items.
    pub fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

pub struct UnlockState {
    pub vault: VaultDescriptor,
    /// Generation of the in-flight request, if any.
    pub pending: Option<u64>,
    /// The password field is shown once the cache could not be used.
    pub prompt_visible: bool,
    pub input: Zeroizing<String>,
}

impl UnlockState {
    pub fn new(vault: VaultDescriptor, generation: u64) -> Self {
        Self {
            vault,
            pending: Some(generation),
            prompt_visible: false,
            input: Zeroizing::new(String::new()),
        }
    }

    pub fn awaits(&self, generation: u64) -> bool {
        self.pending == Some(generation)
    }

    pub fn show_prompt(&mut self) {
        self.pending = None;
        self.prompt_visible = true;
        self.input.zeroize();
    }

    /// Take the typed secret, leaving the field empty.
    pub fn take_input(&mut self) -> Zeroizing<String> {
        std::mem::replace(&mut self.input, Zeroizing::new(String::new()))
    }
}

pub struct BrowseState {
    pub vault: VaultDescriptor,
    entries: Vec<CredentialEntry>,
    query: String,
    results: Vec<usize>,
    selected: usize,
    /// When the query last changed without the results being recomputed.
    query_changed_at: Option<Instant>,
    unlocked_at: Instant,
}

impl BrowseState {
    pub fn new(
        vault: VaultDescriptor,
        entries: Vec<CredentialEntry>,
        max_results: usize,
        now: Instant,
    ) -> Self {
        let mut state = Self {
            vault,
            entries,
            query: String::new(),
            results: Vec::new(),
            selected: 0,
            query_changed_at: None,
            unlocked_at: now,
        };
        state.refilter(max_results);
        state
    }

    pub fn entries(&self) -> &[CredentialEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&CredentialEntry> {
        self.entries.get(index)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Entry indices currently listed, best match first.
    pub fn results(&self) -> &[usize] {
        &self.results
    }

    /// Position of the highlight within [`BrowseState::results`].
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Entry index under the highlight.
    pub fn selected_index(&self) -> Option<usize> {
        self.results.get(self.selected).copied()
    }

    pub fn selected_entry(&self) -> Option<&CredentialEntry> {
        self.selected_index().and_then(|i| self.entries.get(i))
    }

    pub fn unlocked_at(&self) -> Instant {
        self.unlocked_at
    }

    pub fn push_query(&mut self, text: &str, now: Instant) {
        self.query.push_str(text);
        self.query_changed_at = Some(now);
    }

    pub fn pop_query(&mut self, now: Instant) {
        if self.query.pop().is_some() {
            self.query_changed_at = Some(now);
        }
    }

    pub fn clear_query(&mut self, max_results: usize) {
        self.query.clear();
        self.refilter(max_results);
    }

    /// Recompute results if the query has been idle for `debounce`.
    pub fn refilter_if_due(&mut self, debounce: Duration, max_results: usize, now: Instant) -> bool {
        match self.query_changed_at {
            Some(changed) if now.saturating_duration_since(changed) >= debounce => {
                self.refilter(max_results);
                true
            }
            _ => false,
        }
    }

    pub fn refilter(&mut self, max_results: usize) {
        self.results = search::rank(
            &self.query,
            self.entries.iter().map(|e| e.title.as_str()),
            max_results,
        );
        self.selected = 0;
        self.query_changed_at = None;
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.results.len() {
            self.selected += 1;
        }
    }

    pub fn is_expired(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.unlocked_at) >= timeout
    }

    /// Scrub every decrypted entry.
    pub fn close(mut self) {
        debug!(
            "Scrubbing {} entries of {}",
            self.entries.len(),
            self.vault.name
        );
        self.entries.zeroize();
        self.results.clear();
    }
}

pub struct ViewState {
    pub browse: BrowseState,
    /// Index into the browse state's entries.
    pub index: usize,
    pub revealed: bool,
    pub scroll: u16,
}

impl ViewState {
    pub fn new(browse: BrowseState, index: usize) -> Self {
        Self {
            browse,
            index,
            revealed: false,
            scroll: 0,
        }
    }

    pub fn entry(&self) -> Option<&CredentialEntry> {
        self.browse.entry(self.index)
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll = self.scroll.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn browse(titles: &[&str], now: Instant) -> BrowseState {
        let entries = titles
            .iter()
            .map(|t| CredentialEntry::new(*t, "user", "pw"))
            .collect();
        BrowseState::new(
            VaultDescriptor::from_path("/v/work.vault", Utc::now()),
            entries,
            50,
            now,
        )
    }

    #[test]
    fn test_browse_starts_with_all_entries() {
        let state = browse(&["mail", "vpn", "bank"], Instant::now());
        assert_eq!(state.results(), &[0, 1, 2]);
        assert_eq!(state.selected_entry().unwrap().title, "mail");
    }

    #[test]
    fn test_query_is_debounced() {
        let start = Instant::now();
        let mut state = browse(&["mail", "vpn", "bank"], start);
        let debounce = Duration::from_millis(100);

        state.push_query("vp", start);
        assert!(!state.refilter_if_due(debounce, 50, start + Duration::from_millis(50)));
        assert_eq!(state.results().len(), 3);

        assert!(state.refilter_if_due(debounce, 50, start + Duration::from_millis(100)));
        assert_eq!(state.results(), &[1]);
        assert!(!state.refilter_if_due(debounce, 50, start + Duration::from_secs(1)));
    }

    #[test]
    fn test_selection_stays_in_bounds() {
        let mut state = browse(&["a", "b"], Instant::now());
        state.move_up();
        assert_eq!(state.selected(), 0);
        state.move_down();
        state.move_down();
        assert_eq!(state.selected(), 1);
        assert_eq!(state.selected_index(), Some(1));
    }

    #[test]
    fn test_no_matches_means_no_selection() {
        let start = Instant::now();
        let mut state = browse(&["mail"], start);
        state.push_query("zzz", start);
        state.refilter(50);
        assert!(state.results().is_empty());
        assert!(state.selected_entry().is_none());

        state.clear_query(50);
        assert_eq!(state.results(), &[0]);
    }

    #[test]
    fn test_unlock_prompt_input_is_taken() {
        let mut state = UnlockState::new(VaultDescriptor::from_path("/v/w", Utc::now()), 7);
        assert!(state.awaits(7));
        state.show_prompt();
        assert!(!state.awaits(7));
        state.input.push_str("secret");
        assert_eq!(state.take_input().as_str(), "secret");
        assert!(state.input.is_empty());
    }

    #[test]
    fn test_select_state_clamps() {
        let mut state = SelectState::at(4);
        state.clamp(2);
        assert_eq!(state.selected, 1);
        state.clamp(0);
        assert_eq!(state.selected, 0);
        state.move_down(3);
        state.move_down(3);
        state.move_down(3);
        assert_eq!(state.selected, 2);
    }
}
