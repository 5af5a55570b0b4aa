use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};
use log::{debug, warn};

/// A resolved line of user input: trimmed, with empty answers already
/// substituted by the prompt's default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    text: String,
}

impl Answer {
    fn resolve(raw: &str, default: &str) -> Self {
        let trimmed = raw.trim();
        let text = if trimmed.is_empty() { default } else { trimmed };
        Answer {
            text: text.to_string(),
        }
    }

    /// The answer text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Parse the answer into any `FromStr` type, surfacing the parse
    /// error unchanged.
    pub fn parse<T: FromStr>(&self) -> Result<T, T::Err> {
        self.text.parse()
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Restores the terminal even when an entry helper errors out mid-read.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        debug!("raw mode enabled");
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Nowhere to propagate from a destructor.
        if let Err(err) = terminal::disable_raw_mode() {
            warn!("failed to restore terminal mode: {err}");
        }
    }
}

/// What a key press means for a line being edited in raw mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Append(char),
    Erase,
    Submit,
    Interrupt,
    Ignore,
}

fn classify(key: &KeyEvent) -> Edit {
    if key.kind != KeyEventKind::Press {
        return Edit::Ignore;
    }
    match key.code {
        KeyCode::Enter => Edit::Submit,
        KeyCode::Backspace | KeyCode::Delete => Edit::Erase,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Edit::Interrupt,
        KeyCode::Char(c)
            if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
        {
            Edit::Append(c)
        }
        _ => Edit::Ignore,
    }
}

#[derive(Clone, Copy)]
enum Echo<'a> {
    /// Redraw the typed characters as-is.
    Plain,
    /// Print the mask once per typed character; an empty mask echoes
    /// nothing at all.
    Masked(&'a str),
}

fn raw_line_entry(hint: &str, echo: Echo<'_>) -> io::Result<String> {
    let mut out = io::stdout();
    if !hint.is_empty() {
        execute!(out, Print(hint))?;
    }
    // Once editing begins, only the last line of a multi-line hint is
    // redrawn.
    let redraw_hint = match hint.rfind('\n') {
        Some(idx) => hint[idx..].trim(),
        None => hint,
    };

    let guard = RawModeGuard::enable()?;
    let mut line = String::new();
    loop {
        let key = match event::read()? {
            Event::Key(key) => key,
            _ => continue,
        };
        match classify(&key) {
            Edit::Submit => break,
            Edit::Erase => {
                line.pop();
            }
            Edit::Append(c) => line.push(c),
            Edit::Interrupt => {
                drop(guard);
                println!();
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "input interrupted",
                ));
            }
            Edit::Ignore => continue,
        }
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(redraw_hint))?;
        match echo {
            Echo::Plain => queue!(out, Print(&line))?,
            Echo::Masked(mask) if !mask.is_empty() => {
                queue!(out, Print(mask.repeat(line.chars().count())))?
            }
            Echo::Masked(_) => {}
        }
        out.flush()?;
    }
    drop(guard);
    println!();
    Ok(line)
}

/// Prompt for a password in raw mode with no echo at all.
pub fn password(hint: &str, default: &str) -> io::Result<Answer> {
    password_with_mask(hint, default, "")
}

/// Prompt for a password in raw mode, echoing `mask` once per typed
/// character.
pub fn password_with_mask(hint: &str, default: &str, mask: &str) -> io::Result<Answer> {
    let line = raw_line_entry(hint, Echo::Masked(mask))?;
    Ok(Answer::resolve(&line, default))
}

/// Raw-mode line prompt with plain echo and backspace editing.
pub fn prompt_line_raw(hint: &str, default: &str) -> io::Result<Answer> {
    let line = raw_line_entry(hint, Echo::Plain)?;
    Ok(Answer::resolve(&line, default))
}

/// Cooked-mode line prompt reading from standard input.
pub fn prompt_line(hint: &str, default: &str) -> io::Result<Answer> {
    if !hint.is_empty() {
        let mut out = io::stdout();
        out.write_all(hint.as_bytes())?;
        out.flush()?;
    }
    prompt_line_from(&mut io::stdin().lock(), default)
}

/// The same line resolution over any buffered reader, so input can be
/// routed through a [`BytePipe`](crate::BytePipe) instead of stdin.
pub fn prompt_line_from<R: BufRead>(input: &mut R, default: &str) -> io::Result<Answer> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(Answer::resolve(&line, default))
}

/// Ask until the trimmed answer starts with y/Y or n/N; an empty answer
/// picks `default`.
pub fn confirm(hint: &str, default: bool) -> io::Result<bool> {
    loop {
        let answer = prompt_line(hint, "")?;
        let text = answer.text();
        if text.is_empty() {
            return Ok(default);
        }
        if text.starts_with(['y', 'Y']) {
            return Ok(true);
        }
        if text.starts_with(['n', 'N']) {
            return Ok(false);
        }
    }
}

/// Swallow key presses until `trigger` has been typed in sequence.
///
/// An empty trigger accepts any key. A mismatched key restarts the match
/// from the beginning and, when `repeat` is set, echoes the hint again.
pub fn wait_for(hint: &str, trigger: &str, repeat: bool) -> io::Result<()> {
    let mut out = io::stdout();
    if !hint.is_empty() {
        execute!(out, Print(hint))?;
    }
    let guard = RawModeGuard::enable()?;
    let want: Vec<char> = trigger.chars().collect();
    let mut matched = 0;
    loop {
        let key = match event::read()? {
            Event::Key(key) => key,
            _ => continue,
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if classify(&key) == Edit::Interrupt {
            drop(guard);
            return Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "input interrupted",
            ));
        }
        if want.is_empty() {
            break;
        }
        if let KeyCode::Char(c) = key.code {
            if c == want[matched] {
                matched += 1;
                if matched == want.len() {
                    break;
                }
                continue;
            }
        }
        matched = 0;
        if repeat && !hint.is_empty() {
            execute!(out, Print("\r\n"), Print(hint))?;
        }
    }
    drop(guard);
    Ok(())
}
