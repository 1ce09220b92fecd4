//! Ratatui front-end for the speech console.
//!
//! The UI owns nothing but the input buffer: every other piece of state lives
//! in the engine, arrives here as a snapshot, and is only changed by sending
//! `SessionEvent`s back.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Terminal,
};
use std::io;
use std::time::Duration;
use unicode_width::UnicodeWidthStr;

use speakterm::styles::hotkey_lookup;
use speakterm::terminal_restore::TerminalRestoreGuard;
use speakterm::{Engine, SessionEvent, SessionSnapshot, Status};

/// Configure the terminal, run the drawing loop, and tear everything down.
pub fn run_app(engine: &mut Engine) -> Result<()> {
    let terminal_guard = TerminalRestoreGuard::new();
    terminal_guard.enable_raw_mode()?;
    let mut stdout = io::stdout();
    terminal_guard.enter_alt_screen(&mut stdout)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app_loop(&mut terminal, engine);

    drop(terminal);
    terminal_guard.restore();

    result
}

fn app_loop(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, engine: &mut Engine) -> Result<()> {
    let mut input = String::new();

    // Initial render to show the console immediately on startup.
    let snapshot = engine.snapshot();
    terminal.draw(|frame| draw(frame, &snapshot, &input))?;

    loop {
        engine.poll_job();

        let poll_duration = if engine.has_active_job() {
            Duration::from_millis(50)
        } else {
            Duration::from_millis(100)
        };

        let mut should_draw = engine.take_redraw_request();
        let mut should_quit = false;

        if event::poll(poll_duration)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(session_event) = key_to_event(key, &mut input) {
                        should_quit = engine.handle_event(session_event);
                    }
                    should_draw = true;
                }
                Event::Resize(_, _) => should_draw = true,
                _ => {}
            }
        }

        if should_draw {
            let snapshot = engine.snapshot();
            terminal.draw(|frame| draw(frame, &snapshot, &input))?;
        }

        if should_quit {
            break;
        }
    }
    Ok(())
}

/// Translate one keystroke into a session event, mutating the input buffer as
/// a side effect. Returns `None` for pure editing keys.
fn key_to_event(key: KeyEvent, input: &mut String) -> Option<SessionEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') => Some(SessionEvent::Quit),
            KeyCode::Char('v') => Some(SessionEvent::CycleVoice),
            KeyCode::Char('s') => Some(SessionEvent::ToggleStreaming),
            KeyCode::Char(c) => hotkey_lookup()
                .iter()
                .find(|(hotkey, _)| *hotkey == c)
                .map(|(_, name)| SessionEvent::ToggleStyle(name.to_string())),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Enter => {
            let text = input.trim().to_string();
            input.clear();
            if text == ":q" {
                Some(SessionEvent::Quit)
            } else if text == ":key" {
                None
            } else if let Some(key) = text.strip_prefix(":key ") {
                let key = key.trim();
                (!key.is_empty()).then(|| SessionEvent::EnterApiKey(key.to_string()))
            } else if text.is_empty() {
                None
            } else {
                Some(SessionEvent::SubmitText(text))
            }
        }
        KeyCode::Backspace => {
            input.pop();
            None
        }
        KeyCode::Esc => {
            input.clear();
            None
        }
        KeyCode::Char(c) => {
            input.push(c);
            None
        }
        _ => None,
    }
}

const STYLES_PER_ROW: usize = 8;

fn draw(frame: &mut ratatui::Frame<'_>, snapshot: &SessionSnapshot, input: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.size());

    let accent = Color::Rgb(120, 180, 255);
    let dim = Color::Rgb(110, 110, 120);
    let active_style = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let inactive_style = Style::default().fg(dim);

    // Styles header: fixed catalogue order, hotkey plus on/off state.
    let style_lines: Vec<Line> = snapshot
        .styles
        .chunks(STYLES_PER_ROW)
        .map(|row| {
            let spans: Vec<Span> = row
                .iter()
                .map(|(def, active)| {
                    let style = if *active { active_style } else { inactive_style };
                    Span::styled(format!("[{}] {:<12}", def.hotkey, def.name), style)
                })
                .collect();
            Line::from(spans)
        })
        .collect();
    let styles_block = Paragraph::new(style_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(accent))
            .title(Span::styled(
                " Styles (Ctrl+key) ",
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            )),
    );
    frame.render_widget(styles_block, chunks[0]);

    let status_color = match snapshot.status {
        Status::Idle => dim,
        Status::Sending => Color::Yellow,
        Status::Playing => Color::Green,
        Status::Error => Color::Red,
    };
    let streaming_label = if snapshot.streaming { "ON" } else { "OFF" };
    let mut status_spans = vec![
        Span::raw(format!("Voice: {} (Ctrl+V)   ", snapshot.voice)),
        Span::raw(format!("Streaming: {streaming_label} (Ctrl+S)   ")),
        Span::styled(
            format!("Status: {}", snapshot.status.label()),
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
    ];
    if snapshot.quit_armed {
        status_spans.push(Span::styled(
            "   Quit again to exit",
            Style::default().fg(Color::Yellow),
        ));
    }
    let status_block = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(dim)),
    );
    frame.render_widget(status_block, chunks[1]);

    // Activity panel: most recent entries that fit, oldest first.
    let visible = chunks[2].height.saturating_sub(2) as usize;
    let skip = snapshot.activity.len().saturating_sub(visible);
    let activity_lines: Vec<Line> = snapshot.activity[skip..]
        .iter()
        .map(|entry| Line::from(entry.as_str()))
        .collect();
    let activity_block = Paragraph::new(activity_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(dim))
            .title(Span::styled(" Activity ", Style::default().fg(dim))),
    );
    frame.render_widget(activity_block, chunks[2]);

    let input_block = Paragraph::new(input).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(accent))
            .title(Span::styled(
                " Say (Enter to speak, Ctrl+Q or :q to quit) ",
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            )),
    );
    frame.render_widget(input_block, chunks[3]);

    let inner_width = chunks[3].width.saturating_sub(2);
    let input_width = UnicodeWidthStr::width(input).min(u16::MAX as usize) as u16;
    let cursor_x = chunks[3].x.saturating_add(1).saturating_add(input_width.min(inner_width));
    let cursor_y = chunks[3].y + 1;
    frame.set_cursor(cursor_x, cursor_y);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn typing_builds_the_input_buffer() {
        let mut input = String::new();
        assert!(key_to_event(key(KeyCode::Char('h'), KeyModifiers::empty()), &mut input).is_none());
        assert!(key_to_event(key(KeyCode::Char('i'), KeyModifiers::empty()), &mut input).is_none());
        assert_eq!(input, "hi");
        assert!(key_to_event(key(KeyCode::Backspace, KeyModifiers::empty()), &mut input).is_none());
        assert_eq!(input, "h");
        assert!(key_to_event(key(KeyCode::Esc, KeyModifiers::empty()), &mut input).is_none());
        assert!(input.is_empty());
    }

    #[test]
    fn enter_submits_trimmed_text_and_clears_the_buffer() {
        let mut input = "  hello world  ".to_string();
        let event = key_to_event(key(KeyCode::Enter, KeyModifiers::empty()), &mut input);
        assert_eq!(event, Some(SessionEvent::SubmitText("hello world".to_string())));
        assert!(input.is_empty());
    }

    #[test]
    fn enter_on_blank_input_does_nothing() {
        let mut input = "   ".to_string();
        assert!(key_to_event(key(KeyCode::Enter, KeyModifiers::empty()), &mut input).is_none());
        assert!(input.is_empty());
    }

    #[test]
    fn colon_q_is_a_quit_request() {
        let mut input = ":q".to_string();
        let event = key_to_event(key(KeyCode::Enter, KeyModifiers::empty()), &mut input);
        assert_eq!(event, Some(SessionEvent::Quit));
    }

    #[test]
    fn colon_key_command_replaces_the_credential() {
        let mut input = ":key sk-new".to_string();
        let event = key_to_event(key(KeyCode::Enter, KeyModifiers::empty()), &mut input);
        assert_eq!(event, Some(SessionEvent::EnterApiKey("sk-new".to_string())));
        assert!(input.is_empty());

        // A bare ":key" is not a submission and not a credential.
        let mut input = ":key".to_string();
        assert!(key_to_event(key(KeyCode::Enter, KeyModifiers::empty()), &mut input).is_none());
        let mut input = ":key   ".to_string();
        assert!(key_to_event(key(KeyCode::Enter, KeyModifiers::empty()), &mut input).is_none());
    }

    #[test]
    fn control_chords_map_to_session_events() {
        let mut input = String::new();
        assert_eq!(
            key_to_event(key(KeyCode::Char('q'), KeyModifiers::CONTROL), &mut input),
            Some(SessionEvent::Quit)
        );
        assert_eq!(
            key_to_event(key(KeyCode::Char('v'), KeyModifiers::CONTROL), &mut input),
            Some(SessionEvent::CycleVoice)
        );
        assert_eq!(
            key_to_event(key(KeyCode::Char('s'), KeyModifiers::CONTROL), &mut input),
            Some(SessionEvent::ToggleStreaming)
        );
        assert_eq!(
            key_to_event(key(KeyCode::Char('t'), KeyModifiers::CONTROL), &mut input),
            Some(SessionEvent::ToggleStyle("Teaching".to_string()))
        );
        assert!(input.is_empty());
    }

    #[test]
    fn reserved_control_keys_never_reach_style_toggles() {
        // Ctrl+S belongs to streaming even though the catalogue has an 's'
        // hotkey; the style behind it is simply unreachable by chord.
        let mut input = String::new();
        assert_eq!(
            key_to_event(key(KeyCode::Char('s'), KeyModifiers::CONTROL), &mut input),
            Some(SessionEvent::ToggleStreaming)
        );
        assert_eq!(
            key_to_event(key(KeyCode::Char('z'), KeyModifiers::CONTROL), &mut input),
            None
        );
    }
}
