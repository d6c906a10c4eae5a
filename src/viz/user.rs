use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use log::error;

use crate::{
    agent::Actor,
    gym::{Action, Pos},
};

use super::tui;

/// Blocks until a key press arrives
pub(super) fn wait_for_key() -> io::Result<(KeyCode, KeyModifiers)> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok((key.code, key.modifiers));
            }
        }
    }
}

/// `q` or ctrl-c abandons the run
pub(super) fn is_quit(code: KeyCode, modifiers: KeyModifiers) -> bool {
    code == KeyCode::Char('q')
        || (code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL))
}

/// A human decision source for debugging and demos: arrow keys choose moves,
/// `q` quits. A choice that is illegal in the current state falls back to
/// the first legal action, so pressing any arrow on a terminal cell exits.
pub struct User;

impl Actor<Pos, Action> for User {
    fn act(&mut self, _state: Pos, actions: &[Action]) -> Action {
        loop {
            let (code, modifiers) = match wait_for_key() {
                Ok(key) => key,
                Err(e) => {
                    error!("failed to read terminal input: {e}");
                    return actions[0];
                }
            };
            if is_quit(code, modifiers) {
                tui::exit();
            }
            let choice = match code {
                KeyCode::Up => Action::Up,
                KeyCode::Down => Action::Down,
                KeyCode::Left => Action::Left,
                KeyCode::Right => Action::Right,
                _ => continue,
            };
            return if actions.contains(&choice) {
                choice
            } else {
                actions[0]
            };
        }
    }
}
