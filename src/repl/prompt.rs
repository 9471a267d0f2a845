use super::history::History;
use crate::console;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, style, terminal,
};
use std::io::{self, Write};

/// What the user did at the prompt.
#[derive(Debug, PartialEq)]
pub enum Input {
    Line(String),
    /// Ctrl-C: drop the statement typed so far.
    Cancel,
    /// Ctrl-D on an empty line.
    Eof,
}

/// Raw terminal mode, restored on drop.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Reads one line in raw mode with cursor movement and history navigation.
pub fn readline(continuation: bool, history: &mut History) -> io::Result<Input> {
    console::print_prompt(continuation)?;
    let _raw = RawMode::enable()?;
    let (origin, _) = cursor::position()?;

    let mut line: Vec<char> = Vec::new();
    let mut x = 0usize;
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Enter => {
                execute!(io::stdout(), style::Print("\r\n"))?;
                return Ok(Input::Line(line.into_iter().collect()));
            }
            KeyCode::Char('c') if ctrl => {
                execute!(io::stdout(), style::Print("\r\n"))?;
                return Ok(Input::Cancel);
            }
            KeyCode::Char('d') if ctrl => {
                if line.is_empty() {
                    execute!(io::stdout(), style::Print("\r\n"))?;
                    return Ok(Input::Eof);
                }
            }
            KeyCode::Up => {
                if let Some(entry) = history.previous() {
                    line = entry.chars().collect();
                    x = line.len();
                }
            }
            KeyCode::Down => {
                line = history.next().map(|e| e.chars().collect()).unwrap_or_default();
                x = line.len();
            }
            KeyCode::Left => x = x.saturating_sub(1),
            KeyCode::Right => x = (x + 1).min(line.len()),
            KeyCode::Home => x = 0,
            KeyCode::End => x = line.len(),
            KeyCode::Backspace => {
                if x > 0 {
                    x -= 1;
                    line.remove(x);
                }
            }
            KeyCode::Delete => {
                if x < line.len() {
                    line.remove(x);
                }
            }
            KeyCode::Char(c) if !ctrl => {
                line.insert(x, c);
                x += 1;
            }
            _ => continue,
        }
        redraw(origin, &line, x)?;
    }
}

fn redraw(origin: u16, line: &[char], x: usize) -> io::Result<()> {
    let text: String = line.iter().collect();
    execute!(
        io::stdout(),
        cursor::MoveToColumn(origin),
        terminal::Clear(terminal::ClearType::UntilNewLine),
        style::Print(text),
        cursor::MoveToColumn(origin.saturating_add(x as u16)),
    )?;
    io::stdout().flush()
}
