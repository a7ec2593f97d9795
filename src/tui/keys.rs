//! Key bindings
//!
//! One immutable table, built at startup and borrowed by the app.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Top,
    Bottom,
    Open,
    Back,
    Toggle,
    ToggleAll,
    Download,
    Delete,
    Rename,
    Confirm,
    Dismiss,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chord {
    code: KeyCode,
    ctrl: bool,
}

impl Chord {
    const fn key(code: KeyCode) -> Self {
        Self { code, ctrl: false }
    }

    const fn ctrl(c: char) -> Self {
        Self { code: KeyCode::Char(c), ctrl: true }
    }

    fn matches(&self, ev: &KeyEvent) -> bool {
        let ctrl = ev.modifiers.contains(KeyModifiers::CONTROL);
        self.code == ev.code && self.ctrl == ctrl
    }
}

/// A logical action with its chords and the label shown in the hint bar.
#[derive(Debug, Clone)]
pub struct Binding {
    pub action: Action,
    pub keys: &'static str,
    pub help: &'static str,
    chords: Vec<Chord>,
}

#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: Vec<Binding>,
}

impl Default for KeyMap {
    fn default() -> Self {
        use KeyCode::*;
        let b = |action, keys, help, chords: &[Chord]| Binding {
            action,
            keys,
            help,
            chords: chords.to_vec(),
        };
        Self {
            bindings: vec![
                b(Action::Up, "↑/k", "up", &[Chord::key(Up), Chord::key(Char('k'))]),
                b(Action::Down, "↓/j", "down", &[Chord::key(Down), Chord::key(Char('j'))]),
                b(Action::Top, "g", "top", &[Chord::key(Char('g')), Chord::key(Home)]),
                b(Action::Bottom, "G", "bottom", &[Chord::key(Char('G')), Chord::key(End)]),
                b(
                    Action::Open,
                    "enter/l",
                    "open",
                    &[Chord::key(Enter), Chord::key(Char('l')), Chord::key(Right)],
                ),
                b(
                    Action::Back,
                    "bksp/h",
                    "back",
                    &[Chord::key(Backspace), Chord::key(Char('h')), Chord::key(Left)],
                ),
                b(Action::Toggle, "space", "select", &[Chord::key(Char(' '))]),
                b(Action::ToggleAll, "a", "select all", &[Chord::key(Char('a'))]),
                b(Action::Download, "d", "download", &[Chord::key(Char('d'))]),
                b(Action::Delete, "x", "delete", &[Chord::key(Char('x')), Chord::key(Delete)]),
                b(Action::Rename, "r", "rename", &[Chord::key(Char('r'))]),
                b(Action::Confirm, "y", "confirm", &[Chord::key(Char('y')), Chord::key(Char('Y'))]),
                b(Action::Dismiss, "esc", "dismiss", &[Chord::key(Esc), Chord::key(Char('n'))]),
                b(Action::Quit, "q", "quit", &[Chord::key(Char('q')), Chord::ctrl('c')]),
            ],
        }
    }
}

impl KeyMap {
    pub fn action(&self, ev: &KeyEvent) -> Option<Action> {
        self.bindings
            .iter()
            .find(|b| b.chords.iter().any(|c| c.matches(ev)))
            .map(|b| b.action)
    }

    pub fn binding(&self, action: Action) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.action == action)
    }

    /// `key label` pairs for the hint bar, in the given order.
    pub fn hints(&self, actions: &[Action]) -> Vec<(&'static str, &'static str)> {
        actions
            .iter()
            .filter_map(|a| self.binding(*a))
            .map(|b| (b.keys, b.help))
            .collect()
    }
}

/// Ctrl+C always means quit, even while typing.
pub fn is_interrupt(ev: &KeyEvent) -> bool {
    Chord::ctrl('c').matches(ev)
}
