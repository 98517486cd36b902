use std::io::Stdout;

use crossterm::{
    cursor::{Hide, Show},
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::error::{PassDeckError, Result};

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Raw mode, alternate screen, bracketed paste.
pub fn init() -> Result<Tui> {
    enable_raw_mode().map_err(terminal_error)?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste, Hide).map_err(terminal_error)?;

    // Leave the terminal usable if something panics while it is in raw mode
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        reset();
        default_hook(info);
    }));

    Terminal::new(CrosstermBackend::new(stdout)).map_err(terminal_error)
}

pub fn restore(terminal: &mut Tui) {
    reset();
    terminal.show_cursor().ok();
}

fn reset() {
    disable_raw_mode().ok();
    execute!(
        std::io::stdout(),
        LeaveAlternateScreen,
        DisableBracketedPaste,
        Show
    )
    .ok();
}

fn terminal_error(e: std::io::Error) -> PassDeckError {
    PassDeckError::Terminal(e.to_string())
}
