//! Keyboard and mouse routing.
//!
//! Maps raw input events onto selection moves and edit-session transitions.
//! Key names follow DOM `KeyboardEvent.key` values so a browser host can
//! forward events unchanged.

use crate::cell::CellAddress;
use crate::editor::{Change, SheetEditor};
use crate::selection::Direction;

/// Where keyboard focus was when the event fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FocusTarget {
    /// The grid surface itself.
    #[default]
    Grid,
    /// A text/date input, select, or other editable element (title field,
    /// metadata panel). Events there are never handled by the grid.
    TextInput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, ctrl: false, alt: false, meta: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true, ctrl: false, alt: false, meta: false };
    pub const CTRL: Modifiers = Modifiers { shift: false, ctrl: true, alt: false, meta: false };

    /// Shift alone is allowed while typing; Ctrl/Alt/Meta mark a shortcut.
    pub fn allows_typing(&self) -> bool {
        !self.ctrl && !self.alt && !self.meta
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Tab,
    Enter,
    Escape,
    Backspace,
    F2,
    /// A key whose DOM name is exactly one character.
    Char(char),
    Other(String),
}

impl Key {
    pub fn from_dom(name: &str) -> Key {
        match name {
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "Tab" => Key::Tab,
            "Enter" => Key::Enter,
            "Escape" => Key::Escape,
            "Backspace" => Key::Backspace,
            "F2" => Key::F2,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => Key::Other(name.to_string()),
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    pub target: FocusTarget,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        KeyEvent { key, modifiers: Modifiers::NONE, target: FocusTarget::Grid }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        KeyEvent { key, modifiers, target: FocusTarget::Grid }
    }

    pub fn dom(name: &str) -> Self {
        KeyEvent::new(Key::from_dom(name))
    }

    pub fn in_target(mut self, target: FocusTarget) -> Self {
        self.target = target;
        self
    }

    /// Single printable character with no Ctrl/Alt/Meta held.
    pub fn printable(&self) -> Option<char> {
        match self.key {
            Key::Char(c) if self.modifiers.allows_typing() && !c.is_control() => Some(c),
            _ => None,
        }
    }
}

impl SheetEditor {
    /// Routes a key event. Events aimed at a text input pass through
    /// untouched.
    pub fn handle_key(&mut self, event: &KeyEvent) -> Change {
        if event.target != FocusTarget::Grid {
            return Change::None;
        }
        if self.is_editing() {
            self.handle_edit_key(event)
        } else {
            self.handle_idle_key(event)
        }
    }

    fn handle_idle_key(&mut self, event: &KeyEvent) -> Change {
        let bounds = self.bounds();
        let direction = match event.key {
            Key::ArrowUp => Some(Direction::Up),
            Key::ArrowDown => Some(Direction::Down),
            Key::ArrowLeft => Some(Direction::Left),
            Key::ArrowRight => Some(Direction::Right),
            Key::Tab if event.modifiers.shift => Some(Direction::Left),
            Key::Tab => Some(Direction::Right),
            _ => None,
        };
        if let Some(dir) = direction {
            self.selection_mut().move_by(dir, bounds);
            return Change::Selection;
        }

        match event.key {
            Key::Enter | Key::F2 => self.start_edit(self.active_cell(), None),
            _ => match event.printable() {
                Some(c) => self.start_edit(self.active_cell(), Some(c.to_string())),
                None => Change::None,
            },
        }
    }

    fn handle_edit_key(&mut self, event: &KeyEvent) -> Change {
        match event.key {
            Key::Enter => self.commit_edit(Some(Direction::Down)),
            Key::Tab if event.modifiers.shift => self.commit_edit(Some(Direction::Left)),
            Key::Tab => self.commit_edit(Some(Direction::Right)),
            Key::Escape => self.cancel_edit(),
            Key::Backspace => {
                self.edit_session_mut().pop_char();
                Change::Selection
            }
            _ => match event.printable() {
                Some(c) => {
                    self.edit_session_mut().push_char(c);
                    Change::Selection
                }
                None => Change::None,
            },
        }
    }

    /// Replaces the edit buffer wholesale (input `change` event).
    pub fn edit_buffer_changed(&mut self, text: &str) -> Change {
        if !self.is_editing() {
            return Change::None;
        }
        self.edit_session_mut().set_buffer(text);
        Change::Selection
    }

    /// The edit input lost focus: commit in place.
    pub fn blur(&mut self) -> Change {
        self.commit_edit(None)
    }

    /// Press on a cell: commit an edit on another cell, anchor the
    /// selection and begin a drag.
    pub fn mouse_down(&mut self, cell: CellAddress) -> Change {
        if !self.bounds().contains(cell) {
            return Change::None;
        }
        let mut change = Change::Selection;
        if let Some(editing) = self.edit_session().cell() {
            if editing != cell {
                change = change.merge(self.commit_edit(None));
            }
        }
        self.selection_mut().begin_drag(cell);
        change
    }

    pub fn mouse_enter(&mut self, cell: CellAddress) -> Change {
        if !self.bounds().contains(cell) {
            return Change::None;
        }
        if self.selection_mut().drag_over(cell) {
            Change::Selection
        } else {
            Change::None
        }
    }

    /// Release anywhere in the window ends the drag.
    pub fn mouse_up(&mut self) -> Change {
        if self.selection().is_dragging() {
            self.selection_mut().end_drag();
            Change::Selection
        } else {
            Change::None
        }
    }

    pub fn double_click(&mut self, cell: CellAddress) -> Change {
        if !self.bounds().contains(cell) {
            return Change::None;
        }
        self.start_edit(cell, None)
    }
}
