use crate::app::Screen;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum UiAction {
    Quit,
    Up,
    Down,
    Left,
    Right,
    Confirm,
    Back,
    Char(char),
    Backspace,
    /// Index into the registry's action list.
    Perform(usize),
    OpenRename,
    ChangePet,
    HelpToggle,
    Dismiss,
}

#[derive(Clone, Debug)]
pub(crate) struct InputEvent {
    pub(crate) key: KeyCode,
    pub(crate) mods: KeyModifiers,
}

pub(crate) fn collect_input_nonblocking(
    max_frame_time: Duration,
) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        if let Event::Key(k) = event::read()? {
            if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                out.push(InputEvent {
                    key: k.code,
                    mods: k.modifiers,
                });
                if out.len() >= 32 {
                    break;
                }
            }
        }
    }
    Ok(out)
}

fn text_entry(ev: &InputEvent) -> Option<UiAction> {
    match ev.key {
        KeyCode::Enter => Some(UiAction::Confirm),
        KeyCode::Esc => Some(UiAction::Back),
        KeyCode::Backspace => Some(UiAction::Backspace),
        KeyCode::Left => Some(UiAction::Left),
        KeyCode::Right => Some(UiAction::Right),
        KeyCode::Char(ch) if !ch.is_control() => Some(UiAction::Char(ch)),
        _ => None,
    }
}

pub(crate) fn map_event_to_action(screen: &Screen, ev: InputEvent) -> Option<UiAction> {
    if ev.mods.contains(KeyModifiers::CONTROL) && matches!(ev.key, KeyCode::Char('c')) {
        return Some(UiAction::Quit);
    }

    match screen {
        Screen::Naming | Screen::Rename => text_entry(&ev),
        Screen::Recap(_) => Some(UiAction::Dismiss),
        Screen::Help => match ev.key {
            KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('H') => Some(UiAction::HelpToggle),
            KeyCode::Char('q') | KeyCode::Char('Q') => Some(UiAction::Quit),
            _ => None,
        },
        Screen::Selection { .. } => match ev.key {
            KeyCode::Up | KeyCode::Char('k') => Some(UiAction::Up),
            KeyCode::Down | KeyCode::Char('j') => Some(UiAction::Down),
            KeyCode::Enter => Some(UiAction::Confirm),
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(UiAction::Quit),
            _ => None,
        },
        Screen::Pet => match ev.key {
            KeyCode::Char(ch @ '1'..='9') => Some(UiAction::Perform(ch as usize - '1' as usize)),
            KeyCode::Char('f') | KeyCode::Char('F') => Some(UiAction::Perform(0)),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(UiAction::OpenRename),
            KeyCode::Char('X') => Some(UiAction::ChangePet),
            KeyCode::Char('h') | KeyCode::Char('H') => Some(UiAction::HelpToggle),
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(UiAction::Quit),
            _ => None,
        },
    }
}
