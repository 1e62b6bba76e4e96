//! Active cell and rectangular selection tracking.
//!
//! The selection's `start` and `end` are stored exactly as the user produced
//! them and are never sorted. Every membership test normalizes them with
//! min/max per axis at query time.

use crate::cell::CellAddress;

/// Direction of a one-cell move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Grid dimensions used for clamping moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub rows: usize,
    pub cols: usize,
}

impl Bounds {
    pub fn contains(&self, cell: CellAddress) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    pub fn clamp(&self, cell: CellAddress) -> CellAddress {
        CellAddress::new(
            cell.row.min(self.rows.saturating_sub(1)),
            cell.col.min(self.cols.saturating_sub(1)),
        )
    }

    /// Moves one step in `dir`, staying inside the bounds.
    pub fn step(&self, cell: CellAddress, dir: Direction) -> CellAddress {
        let CellAddress { row, col } = self.clamp(cell);
        match dir {
            Direction::Up => CellAddress::new(row.saturating_sub(1), col),
            Direction::Down => CellAddress::new((row + 1).min(self.rows.saturating_sub(1)), col),
            Direction::Left => CellAddress::new(row, col.saturating_sub(1)),
            Direction::Right => CellAddress::new(row, (col + 1).min(self.cols.saturating_sub(1))),
        }
    }
}

/// Unordered pair of corners. A single-cell selection has `start == end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SelectionRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl SelectionRange {
    pub fn single(cell: CellAddress) -> Self {
        SelectionRange { start: cell, end: cell }
    }

    /// Top-left and bottom-right corners.
    pub fn normalized(&self) -> (CellAddress, CellAddress) {
        (
            CellAddress::new(self.start.row.min(self.end.row), self.start.col.min(self.end.col)),
            CellAddress::new(self.start.row.max(self.end.row), self.start.col.max(self.end.col)),
        )
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        let (top_left, bottom_right) = self.normalized();
        row >= top_left.row && row <= bottom_right.row && col >= top_left.col && col <= bottom_right.col
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionController {
    active: CellAddress,
    range: SelectionRange,
    dragging: bool,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> CellAddress {
        self.active
    }

    pub fn range(&self) -> SelectionRange {
        self.range
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn set_active_and_anchor(&mut self, cell: CellAddress) {
        self.active = cell;
        self.range = SelectionRange::single(cell);
    }

    /// Moves only the free end of the range; `start` stays put.
    pub fn extend_selection(&mut self, cell: CellAddress) {
        self.range.end = cell;
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.range.contains(row, col)
    }

    pub fn begin_drag(&mut self, cell: CellAddress) {
        self.set_active_and_anchor(cell);
        self.dragging = true;
    }

    /// Extends the selection when a drag is in progress. Returns whether the
    /// selection changed.
    pub fn drag_over(&mut self, cell: CellAddress) -> bool {
        if !self.dragging || self.range.end == cell {
            return false;
        }
        self.extend_selection(cell);
        true
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    /// One-cell navigation. Collapses the selection onto the new cell.
    pub fn move_by(&mut self, dir: Direction, bounds: Bounds) {
        let next = bounds.step(self.active, dir);
        self.set_active_and_anchor(next);
    }

    /// Pulls the active cell and both corners back inside `bounds`.
    pub fn clamp_to(&mut self, bounds: Bounds) {
        self.active = bounds.clamp(self.active);
        self.range.start = bounds.clamp(self.range.start);
        self.range.end = bounds.clamp(self.range.end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Bounds = Bounds { rows: 100, cols: 7 };

    #[test]
    fn contains_is_symmetric_under_swap() {
        let corners = [(0, 0), (3, 5), (7, 1), (2, 2), (9, 6)];
        for &(r1, c1) in &corners {
            for &(r2, c2) in &corners {
                let a = SelectionRange { start: CellAddress::new(r1, c1), end: CellAddress::new(r2, c2) };
                let b = SelectionRange { start: a.end, end: a.start };
                for row in 0..11 {
                    for col in 0..8 {
                        assert_eq!(a.contains(row, col), b.contains(row, col));
                    }
                }
            }
        }
    }

    #[test]
    fn reversed_corners_still_cover_rectangle() {
        let range = SelectionRange { start: CellAddress::new(5, 4), end: CellAddress::new(2, 1) };
        assert!(range.contains(2, 1));
        assert!(range.contains(3, 3));
        assert!(range.contains(5, 4));
        assert!(!range.contains(1, 1));
        assert!(!range.contains(3, 5));
    }

    #[test]
    fn drag_extends_only_the_end() {
        let mut sel = SelectionController::new();
        sel.begin_drag(CellAddress::new(4, 4));
        assert!(sel.drag_over(CellAddress::new(1, 2)));
        assert_eq!(sel.range().start, CellAddress::new(4, 4));
        assert_eq!(sel.range().end, CellAddress::new(1, 2));
        assert_eq!(sel.active(), CellAddress::new(4, 4));

        sel.end_drag();
        assert!(!sel.drag_over(CellAddress::new(6, 6)));
        assert_eq!(sel.range().end, CellAddress::new(1, 2));
    }

    #[test]
    fn navigation_collapses_and_clamps() {
        let mut sel = SelectionController::new();
        sel.set_active_and_anchor(CellAddress::new(0, 0));
        sel.extend_selection(CellAddress::new(3, 3));

        sel.move_by(Direction::Up, BOUNDS);
        assert_eq!(sel.active(), CellAddress::new(0, 0));
        assert!(sel.range().is_single());

        sel.set_active_and_anchor(CellAddress::new(99, 6));
        sel.move_by(Direction::Down, BOUNDS);
        sel.move_by(Direction::Right, BOUNDS);
        assert_eq!(sel.active(), CellAddress::new(99, 6));

        sel.move_by(Direction::Left, BOUNDS);
        assert_eq!(sel.active(), CellAddress::new(99, 5));
    }

    #[test]
    fn clamp_after_column_count_shrinks() {
        let mut sel = SelectionController::new();
        sel.set_active_and_anchor(CellAddress::new(2, 7));
        sel.clamp_to(BOUNDS);
        assert_eq!(sel.active(), CellAddress::new(2, 6));
        assert_eq!(sel.range(), SelectionRange::single(CellAddress::new(2, 6)));
    }
}
