pub mod clipboard;
pub mod error;
pub mod session;
pub mod storage;
pub mod ui;
pub mod vault;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use passdeck_secret::SecretCache;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipboard::{ClipboardGuard, ExpiryOutcome, SystemClipboard};
use session::{AppEvent, Command, SessionController, StatusKind, UnlockOrchestrator};
use storage::{ConfigStore, Settings, VaultRegistry};
use ui::terminal::Tui;
use vault::FileVaultLoader;

pub use error::{PassDeckError, Result};

/// Drives status expiry, search debounce and the session timeout.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Run the interactive session until the user quits.
///
/// Errors returned from here are initialization failures the process
/// cannot continue without.
pub async fn run() -> anyhow::Result<()> {
    let config = ConfigStore::open_default().context("Cannot create configuration directory")?;
    init_tracing(&config.log_path()).context("Cannot open log file")?;

    info!("Starting PassDeck...");

    let mut startup_errors = Vec::new();
    let settings = config.load_settings().unwrap_or_else(|e| {
        error!("Failed to load settings, using defaults: {}", e);
        startup_errors.push(format!("Settings reset to defaults: {}", e));
        Settings::default()
    });
    let registry = config.load_registry().unwrap_or_else(|e| {
        error!("Failed to load vault registry, starting empty: {}", e);
        startup_errors.push(format!("Vault list could not be read: {}", e));
        VaultRegistry::default()
    });

    // Probing the keyring may block on D-Bus
    let cache = tokio::task::spawn_blocking(SecretCache::open_keyring)
        .await
        .context("Secret store probe panicked")?;
    let cache_warning = cache.disabled_reason().map(str::to_string);
    let orchestrator = UnlockOrchestrator::new(Arc::new(FileVaultLoader::new()), Arc::new(cache));

    let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
    let clipboard = ClipboardGuard::with_expiry_notifier(Arc::new(SystemClipboard::new()), expiry_tx);

    let mut controller = SessionController::new(config, settings, registry, clipboard)
        .with_cache_warning(cache_warning);
    let now = Instant::now();
    for message in startup_errors {
        controller.notify(StatusKind::Error, message, now);
    }

    let mut terminal = ui::terminal::init().context("Cannot initialize terminal")?;
    let result = event_loop(&mut terminal, controller, orchestrator, expiry_rx).await;
    ui::terminal::restore(&mut terminal);

    match &result {
        Ok(()) => info!("PassDeck exited"),
        Err(e) => error!("PassDeck exited with error: {:#}", e),
    }
    result
}

fn init_tracing(log_path: &Path) -> anyhow::Result<()> {
    // The terminal belongs to the UI, so logs go to a file
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passdeck_app_lib=debug,passdeck_secret=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

async fn event_loop(
    terminal: &mut Tui,
    mut controller: SessionController,
    orchestrator: UnlockOrchestrator,
    mut expiry_rx: mpsc::UnboundedReceiver<ExpiryOutcome>,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let mut input = EventStream::new();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if let Some(command) = controller.start(Instant::now()) {
        execute(command, &orchestrator, &tx);
    }

    loop {
        terminal.draw(|frame| ui::draw(frame, &controller))?;

        let event = tokio::select! {
            maybe = input.next() => match maybe {
                Some(Ok(Event::Key(key))) => AppEvent::Key(key),
                Some(Ok(Event::Paste(text))) => AppEvent::Paste(text),
                // Resize and focus changes only need a redraw
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                None => break,
            },
            Some(event) = rx.recv() => event,
            Some(outcome) = expiry_rx.recv() => AppEvent::ClipboardExpired(outcome),
            _ = ticker.tick() => AppEvent::Tick(Instant::now()),
        };

        if let Some(command) = controller.handle(event) {
            if execute(command, &orchestrator, &tx) == Flow::Quit {
                break;
            }
        }
    }

    Ok(())
}

/// Run a command off the event loop. Each background task posts exactly one
/// completion event.
fn execute(
    command: Command,
    orchestrator: &UnlockOrchestrator,
    tx: &mpsc::UnboundedSender<AppEvent>,
) -> Flow {
    match command {
        Command::Unlock(request) => {
            debug!("Running {:?}", request);
            let orchestrator = orchestrator.clone();
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || {
                let outcome = orchestrator.unlock(&request.vault, &request.secret);
                let _ = tx.send(AppEvent::UnlockFinished {
                    generation: request.generation,
                    outcome,
                });
            });
            Flow::Continue
        }
        Command::ForgetSecret { path } => {
            let orchestrator = orchestrator.clone();
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || {
                let result = orchestrator.forget(&path);
                let _ = tx.send(AppEvent::SecretForgotten { path, result });
            });
            Flow::Continue
        }
        Command::Quit => Flow::Quit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fakes::FakeLoader;
    use crate::session::UnlockOutcome;
    use crate::storage::VaultDescriptor;
    use chrono::Utc;
    use zeroize::Zeroizing;

    fn orchestrator() -> UnlockOrchestrator {
        UnlockOrchestrator::new(
            Arc::new(FakeLoader::with_titles("master", &["mail"])),
            Arc::new(SecretCache::disabled("test")),
        )
    }

    #[tokio::test]
    async fn test_unlock_command_posts_one_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = session::UnlockRequest {
            generation: 7,
            vault: VaultDescriptor::from_path("/v/work", Utc::now()),
            secret: Zeroizing::new("master".to_string()),
        };

        let flow = execute(Command::Unlock(request), &orchestrator(), &tx);
        assert_eq!(flow, Flow::Continue);

        match rx.recv().await {
            Some(AppEvent::UnlockFinished {
                generation,
                outcome: UnlockOutcome::Success(entries),
            }) => {
                assert_eq!(generation, 7);
                assert_eq!(entries.len(), 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forget_command_reports_result() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let flow = execute(
            Command::ForgetSecret {
                path: "/v/work".into(),
            },
            &orchestrator(),
            &tx,
        );
        assert_eq!(flow, Flow::Continue);

        match rx.recv().await {
            Some(AppEvent::SecretForgotten { path, result }) => {
                assert_eq!(path, "/v/work");
                assert!(result.is_ok());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_quit_command_stops_loop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(execute(Command::Quit, &orchestrator(), &tx), Flow::Quit);
    }
}
