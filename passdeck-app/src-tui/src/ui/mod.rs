//! Rendering. Everything drawn is derived from the controller's state.

pub mod terminal;

use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::session::{
    BrowseState, Screen, SelectState, SessionController, StatusKind, UnlockState, ViewState,
    MAX_ATTEMPTS,
};

const MASK: &str = "••••••••";

pub fn draw(frame: &mut Frame, controller: &SessionController) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_header(frame, chunks[0], controller);

    match controller.screen() {
        Screen::Selecting(state) => draw_select(frame, chunks[1], controller, state),
        Screen::Unlocking(state) => draw_unlock(frame, chunks[1], controller, state),
        Screen::Browsing(state) => draw_browse(frame, chunks[1], state),
        Screen::Viewing(state) => draw_view(frame, chunks[1], state),
    }

    draw_status(frame, chunks[2], controller);
    frame.render_widget(
        Paragraph::new(help_text(controller.screen())).style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}

fn draw_header(frame: &mut Frame, area: Rect, controller: &SessionController) {
    let mut spans = vec![Span::styled(
        "PassDeck",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];

    let vault = match controller.screen() {
        Screen::Unlocking(state) => Some(&state.vault),
        screen => screen.browse().map(|b| &b.vault),
    };
    if let Some(vault) = vault {
        spans.push(Span::raw(format!("  {}", vault.name)));
    }
    if let (Screen::Selecting(_), Some(reason)) = (controller.screen(), controller.cache_warning())
    {
        spans.push(Span::styled(
            format!("  (password caching off: {})", reason),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_select(frame: &mut Frame, area: Rect, controller: &SessionController, state: &SelectState) {
    let (list_area, input_area) = match state.adding {
        Some(_) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(1), Constraint::Length(3)])
                .split(area);
            (parts[0], Some(parts[1]))
        }
        None => (area, None),
    };

    let vaults = &controller.registry().vaults;
    let block = Block::default().borders(Borders::ALL).title(" Vaults ");
    if vaults.is_empty() {
        frame.render_widget(
            Paragraph::new("No vaults registered. Press 'a' to add one.").block(block),
            list_area,
        );
    } else {
        let items: Vec<ListItem> = vaults
            .iter()
            .map(|v| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<24}", v.name),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!(" {}  ", v.path)),
                    Span::styled(
                        last_accessed(&v.last_accessed),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();
        let mut list_state = ListState::default();
        list_state.select(Some(state.selected));
        frame.render_stateful_widget(
            highlighted(List::new(items).block(block)),
            list_area,
            &mut list_state,
        );
    }

    if let (Some(path), Some(input_area)) = (&state.adding, input_area) {
        frame.render_widget(
            Paragraph::new(format!("{}_", path))
                .block(Block::default().borders(Borders::ALL).title(" Vault path ")),
            input_area,
        );
    }
}

fn draw_unlock(frame: &mut Frame, area: Rect, controller: &SessionController, state: &UnlockState) {
    let mut lines = Vec::new();

    if !state.prompt_visible {
        lines.push(Line::from(format!("Unlocking {}...", state.vault.name)));
    } else {
        lines.push(Line::from(format!("Master password for {}", state.vault.name)));
        lines.push(Line::from(""));
        let masked = "•".repeat(state.input.chars().count());
        lines.push(Line::from(vec![
            Span::raw("> "),
            Span::styled(masked, Style::default().fg(Color::Yellow)),
            Span::raw(if state.pending.is_some() { "" } else { "_" }),
        ]));
        if state.pending.is_some() {
            lines.push(Line::from(""));
            lines.push(Line::from("Checking..."));
        }
        let attempts = controller.attempt_count();
        if attempts > 0 {
            lines.push(Line::from(""));
            lines.push(Line::styled(
                format!("Failed attempts: {} of {}", attempts, MAX_ATTEMPTS),
                Style::default().fg(Color::Red),
            ));
        }
    }

    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Unlock ")),
        area,
    );
}

fn draw_browse(frame: &mut Frame, area: Rect, state: &BrowseState) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    frame.render_widget(
        Paragraph::new(format!("{}_", state.query()))
            .block(Block::default().borders(Borders::ALL).title(" Search ")),
        parts[0],
    );

    let items: Vec<ListItem> = state
        .results()
        .iter()
        .filter_map(|&i| state.entry(i))
        .map(|entry| {
            let mut spans = vec![
                Span::styled(
                    format!("{:<28}", entry.title),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(" {:<24}", entry.username)),
            ];
            if !entry.group_path.is_empty() {
                spans.push(Span::styled(
                    format!(" [{}]", entry.group_path),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!(" Entries ({}/{}) ", state.results().len(), state.entries().len());
    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(state.selected()));
    }
    frame.render_stateful_widget(
        highlighted(List::new(items).block(Block::default().borders(Borders::ALL).title(title))),
        parts[1],
        &mut list_state,
    );
}

fn draw_view(frame: &mut Frame, area: Rect, state: &ViewState) {
    let Some(entry) = state.entry() else {
        return;
    };

    let label = Style::default().fg(Color::Cyan);
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<10}", name), label),
            Span::raw(value),
        ])
    };

    let secret = if state.revealed {
        entry.secret.clone()
    } else {
        MASK.to_string()
    };
    let mut lines = vec![
        field("Title", entry.title.clone()),
        field("Username", entry.username.clone()),
        field("Password", secret),
        field("URL", entry.url.clone()),
        field("Group", entry.group_path.clone()),
        field("Created", timestamp(entry.created_at)),
        field("Modified", timestamp(entry.modified_at)),
        Line::from(""),
        Line::styled("Notes", label),
    ];
    lines.extend(entry.notes.lines().map(|l| Line::from(l.to_string())));

    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(" Entry "))
            .wrap(Wrap { trim: false })
            .scroll((state.scroll, 0)),
        area,
    );
}

fn draw_status(frame: &mut Frame, area: Rect, controller: &SessionController) {
    let Some(message) = controller.status().current() else {
        return;
    };
    let color = match message.kind {
        StatusKind::Info => Color::Gray,
        StatusKind::Success => Color::Green,
        StatusKind::Warning => Color::Yellow,
        StatusKind::Error => Color::Red,
    };
    frame.render_widget(
        Paragraph::new(message.text.as_str()).style(Style::default().fg(color)),
        area,
    );
}

fn help_text(screen: &Screen) -> &'static str {
    match screen {
        Screen::Selecting(state) if state.adding.is_some() => "Enter add | Esc cancel",
        Screen::Selecting(_) => "↑/↓ move | Enter unlock | a add | d remove | Esc quit",
        Screen::Unlocking(_) => "Enter unlock | Ctrl+L clear | Esc back",
        Screen::Browsing(_) => {
            "Type to search | ↑/↓ move | Enter details | Ctrl+B user | Ctrl+C password | Ctrl+X clear clipboard | Esc lock"
        }
        Screen::Viewing(_) => {
            "Ctrl+P reveal | Ctrl+B user | Ctrl+C password | Ctrl+X clear clipboard | ↑/↓ scroll | Esc back"
        }
    }
}

fn highlighted(list: List<'_>) -> List<'_> {
    list.highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ")
}

fn last_accessed(at: &DateTime<Utc>) -> String {
    if *at == DateTime::<Utc>::default() {
        return "never".to_string();
    }
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}
