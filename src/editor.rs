use log::warn;

use crate::cell::{CellAddress, CellValue};
use crate::editing::{EditSession, PendingCommit};
use crate::grid::{Grid, GridError};
use crate::record::{MetadataBlock, SheetData, UnknownField, normalize_title};
use crate::selection::{Bounds, Direction, SelectionController};
use crate::view::{Column, SheetView};

/// What an operation changed, so the host knows whether to re-render only
/// or also schedule a save.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Change {
    None,
    Selection,
    Content,
}

impl Change {
    pub fn merge(self, other: Change) -> Change {
        self.max(other)
    }

    pub fn is_content(&self) -> bool {
        *self == Change::Content
    }
}

/// The local state of one open sheet: payload, title, selection and the
/// edit session. All mutation entry points go through here.
#[derive(Clone, Debug)]
pub struct SheetEditor {
    data: SheetData,
    title: String,
    selection: SelectionController,
    edit: EditSession,
}

impl SheetEditor {
    pub fn new(data: SheetData, title: &str) -> Self {
        SheetEditor {
            data,
            title: normalize_title(title),
            selection: SelectionController::new(),
            edit: EditSession::Idle,
        }
    }

    pub fn blank(rows: usize) -> Self {
        SheetEditor::new(SheetData::blank(rows), "")
    }

    pub fn data(&self) -> &SheetData {
        &self.data
    }

    pub fn grid(&self) -> &Grid {
        &self.data.master_data
    }

    pub fn view(&self) -> SheetView {
        self.data.active_sheet
    }

    pub fn columns(&self) -> &'static [Column] {
        self.view().columns()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub(crate) fn selection_mut(&mut self) -> &mut SelectionController {
        &mut self.selection
    }

    pub fn edit_session(&self) -> &EditSession {
        &self.edit
    }

    pub(crate) fn edit_session_mut(&mut self) -> &mut EditSession {
        &mut self.edit
    }

    pub fn is_editing(&self) -> bool {
        self.edit.is_editing()
    }

    pub fn active_cell(&self) -> CellAddress {
        self.selection.active()
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            rows: self.grid().row_count(),
            cols: self.view().column_count(),
        }
    }

    pub fn is_cell_in_selection(&self, row: usize, col: usize) -> bool {
        self.selection.contains(row, col)
    }

    pub fn cell_value(&self, addr: CellAddress) -> Result<CellValue, GridError> {
        self.grid().cell(self.view(), addr)
    }

    pub fn active_value(&self) -> CellValue {
        self.cell_value(self.active_cell()).unwrap_or_default()
    }

    /// Writes one cell through the active view. Returns whether the grid
    /// changed.
    pub fn write_cell(&mut self, addr: CellAddress, value: CellValue) -> Result<bool, GridError> {
        let view = self.view();
        if self.data.master_data.cell(view, addr)? == value {
            return Ok(false);
        }
        self.data.master_data = self.data.master_data.set_cell(view, addr, value)?;
        Ok(true)
    }

    fn apply_commit(&mut self, pending: PendingCommit) -> bool {
        match self.write_cell(pending.cell, CellValue::Text(pending.text)) {
            Ok(changed) => changed,
            Err(e) => {
                warn!("dropping edit for {}: {}", pending.cell, e);
                false
            }
        }
    }

    /// Opens an edit session on `cell`. `seed` overrides the buffer (typed
    /// character); otherwise the current value is used. Flag columns are
    /// toggled, never text-edited, so no session opens there. Re-opening the
    /// cell already under edit keeps the live buffer.
    pub fn start_edit(&mut self, cell: CellAddress, seed: Option<String>) -> Change {
        let column = match self.view().column(cell.col) {
            Ok(column) => column,
            Err(_) => return Change::None,
        };
        if column.is_flag() || self.edit.cell() == Some(cell) {
            return Change::None;
        }
        let seed = match seed {
            Some(s) => s,
            None => self
                .cell_value(cell)
                .map(|v| v.to_edit_string())
                .unwrap_or_default(),
        };
        match self.edit.begin(cell, seed) {
            Some(pending) => {
                if self.apply_commit(pending) { Change::Content } else { Change::Selection }
            }
            None => Change::Selection,
        }
    }

    /// Writes the buffer back and optionally moves the active cell.
    pub fn commit_edit(&mut self, movement: Option<Direction>) -> Change {
        let Some(pending) = self.edit.commit() else {
            return Change::None;
        };
        let cell = pending.cell;
        let changed = self.apply_commit(pending);

        if let Some(dir) = movement {
            let next = self.bounds().step(cell, dir);
            self.selection.set_active_and_anchor(next);
        }

        if changed { Change::Content } else { Change::Selection }
    }

    pub fn cancel_edit(&mut self) -> Change {
        if self.edit.cancel() { Change::Selection } else { Change::None }
    }

    /// Checkbox click on a flag cell.
    pub fn toggle_flag(&mut self, addr: CellAddress) -> Result<Change, GridError> {
        let column = self.view().column(addr.col)?;
        if !column.is_flag() {
            return Ok(Change::None);
        }
        let current = self.cell_value(addr)?.as_flag();
        self.write_cell(addr, CellValue::Flag(!current))?;
        Ok(Change::Content)
    }

    /// Switches the column schema. An open edit is committed first so its
    /// buffer lands in the column it was opened on.
    pub fn switch_view(&mut self, view: SheetView) -> Change {
        if view == self.view() {
            return Change::None;
        }
        let _ = self.commit_edit(None);
        self.data.active_sheet = view;
        let bounds = self.bounds();
        self.selection.clamp_to(bounds);
        Change::Content
    }

    /// Sets the title, returning the normalized form.
    pub fn set_title(&mut self, title: &str) -> &str {
        self.title = normalize_title(title);
        &self.title
    }

    pub fn set_metadata(
        &mut self,
        block: MetadataBlock,
        field: &str,
        value: &str,
    ) -> Result<Change, UnknownField> {
        self.data.set_metadata(block, field, value.to_string())?;
        Ok(Change::Content)
    }

    /// Copy of the current payload for persistence.
    pub fn snapshot(&self) -> SheetData {
        self.data.clone()
    }
}
