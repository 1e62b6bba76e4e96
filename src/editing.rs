//! Single-cell edit session state machine.
//!
//! `Idle` ⇄ `Editing { cell, buffer }`. The buffer is uncommitted text; the
//! grid only sees it on commit. Starting an edit while one is active commits
//! the previous one first and hands the pending write back to the caller.

use crate::cell::CellAddress;

/// A buffer that left the session and must be written to the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingCommit {
    pub cell: CellAddress,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum EditSession {
    #[default]
    Idle,
    Editing { cell: CellAddress, buffer: String },
}

impl EditSession {
    pub fn is_editing(&self) -> bool {
        matches!(self, EditSession::Editing { .. })
    }

    pub fn cell(&self) -> Option<CellAddress> {
        match self {
            EditSession::Editing { cell, .. } => Some(*cell),
            EditSession::Idle => None,
        }
    }

    pub fn buffer(&self) -> Option<&str> {
        match self {
            EditSession::Editing { buffer, .. } => Some(buffer),
            EditSession::Idle => None,
        }
    }

    /// Enters `Editing` on `cell` seeded with `seed`. If another edit was
    /// open it is committed and returned so no typed text is lost.
    pub fn begin(&mut self, cell: CellAddress, seed: String) -> Option<PendingCommit> {
        let previous = self.commit();
        *self = EditSession::Editing { cell, buffer: seed };
        previous
    }

    pub fn set_buffer(&mut self, text: &str) {
        if let EditSession::Editing { buffer, .. } = self {
            buffer.clear();
            buffer.push_str(text);
        }
    }

    pub fn push_char(&mut self, c: char) {
        if let EditSession::Editing { buffer, .. } = self {
            buffer.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if let EditSession::Editing { buffer, .. } = self {
            buffer.pop();
        }
    }

    /// Leaves `Editing`, yielding the buffer for the grid.
    pub fn commit(&mut self) -> Option<PendingCommit> {
        match std::mem::take(self) {
            EditSession::Editing { cell, buffer } => Some(PendingCommit { cell, text: buffer }),
            EditSession::Idle => None,
        }
    }

    /// Leaves `Editing` and discards the buffer.
    pub fn cancel(&mut self) -> bool {
        let was_editing = self.is_editing();
        *self = EditSession::Idle;
        was_editing
    }
}
