use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Panel-level actions bound to keys. Plain text editing is handled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Enter,
    Cancel,
    NextService,
    PrevService,
    SelectUp,
    SelectDown,
    Reply,
    Retweet,
    LocationPicker,
    ToggleOnline,
    Retire,
}

pub fn key_command(key: KeyEvent) -> Option<Command> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let cmd = match key.code {
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => Command::Quit,
        KeyCode::Char('r') if ctrl => Command::Reply,
        KeyCode::Char('t') if ctrl => Command::Retweet,
        KeyCode::Char('l') if ctrl => Command::LocationPicker,
        KeyCode::Char('o') if ctrl => Command::ToggleOnline,
        KeyCode::Char('x') if ctrl => Command::Retire,
        KeyCode::Enter => Command::Enter,
        KeyCode::Esc => Command::Cancel,
        KeyCode::Tab => Command::NextService,
        KeyCode::BackTab => Command::PrevService,
        KeyCode::Up => Command::SelectUp,
        KeyCode::Down => Command::SelectDown,
        _ => return None,
    };
    Some(cmd)
}

/// Parse `"<lat> <lon>"` (comma or whitespace separated) typed into the picker.
pub fn parse_location(input: &str) -> Option<(f64, f64)> {
    let mut parts = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty());
    let lat: f64 = parts.next()?.parse().ok()?;
    let lon: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon)
    {
        return None;
    }
    Some((lat, lon))
}
