//! Fixed-size order grid with copy-on-write rows.
//!
//! A [`Grid`] holds exactly `N` rows. Mutation never happens in place:
//! [`Grid::set`] returns a new grid that shares every untouched row with the
//! old one, so callers can detect which rows changed by pointer identity.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cell::{CellAddress, CellValue};
use crate::config::NUM_ROWS;
use crate::view::{ALL_COLUMNS, Column, ColumnKind, SheetView};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("row {row} is outside the grid ({rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },
    #[error("column {col} is outside the view ({cols} columns)")]
    ColumnOutOfRange { col: usize, cols: usize },
}

fn blank_for(kind: ColumnKind) -> CellValue {
    match kind {
        ColumnKind::Text => CellValue::empty(),
        ColumnKind::Flag => CellValue::Flag(false),
    }
}

/// One grid row: column key to value. Keys unknown to every view are kept
/// so payloads written by newer schemas survive a round trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridRow(BTreeMap<String, CellValue>);

impl GridRow {
    /// A row with a blank entry for every known column.
    pub fn blank() -> Self {
        GridRow(
            ALL_COLUMNS
                .iter()
                .map(|c| (c.key.to_string(), blank_for(c.kind)))
                .collect(),
        )
    }

    /// Reads a column, defaulting missing keys to the column's blank value.
    pub fn get(&self, column: &Column) -> CellValue {
        self.0
            .get(column.key)
            .cloned()
            .unwrap_or_else(|| blank_for(column.kind))
    }

    pub fn raw(&self, key: &str) -> Option<&CellValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: CellValue) {
        self.0.insert(key.to_string(), value);
    }

    pub fn has_content(&self) -> bool {
        self.0.values().any(|v| !v.is_blank())
    }

    /// Builds a row from an arbitrary JSON value, dropping entries that are
    /// not scalars. Anything other than an object yields a blank row.
    pub fn from_value(value: &Value) -> Self {
        let mut row = GridRow::blank();
        if let Value::Object(map) = value {
            for (key, v) in map {
                let cell = match v {
                    Value::String(s) => CellValue::Text(s.clone()),
                    Value::Bool(b) => CellValue::Flag(*b),
                    Value::Number(n) => match n.as_f64() {
                        Some(f) => CellValue::Number(f),
                        None => continue,
                    },
                    _ => continue,
                };
                row.0.insert(key.clone(), cell);
            }
        }
        row
    }
}

/// The order grid: a fixed number of rows under copy-on-write semantics.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    rows: Vec<Arc<GridRow>>,
}

impl Grid {
    pub fn blank(rows: usize) -> Self {
        Grid {
            rows: (0..rows).map(|_| Arc::new(GridRow::blank())).collect(),
        }
    }

    /// Pads with blank rows or truncates so the grid has exactly `n` rows.
    pub fn from_rows(rows: Vec<GridRow>, n: usize) -> Self {
        let mut rows: Vec<Arc<GridRow>> = rows.into_iter().take(n).map(Arc::new).collect();
        while rows.len() < n {
            rows.push(Arc::new(GridRow::blank()));
        }
        Grid { rows }
    }

    /// Lenient decode of a `masterData` payload.
    pub fn from_value(value: Option<&Value>, n: usize) -> Self {
        match value {
            Some(Value::Array(items)) => {
                Grid::from_rows(items.iter().map(GridRow::from_value).collect(), n)
            }
            _ => Grid::blank(n),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = &GridRow> {
        self.rows.iter().map(|r| r.as_ref())
    }

    pub fn row(&self, row: usize) -> Result<&GridRow, GridError> {
        self.rows
            .get(row)
            .map(|r| r.as_ref())
            .ok_or(GridError::RowOutOfRange {
                row,
                rows: self.rows.len(),
            })
    }

    pub fn get(&self, row: usize, column: &Column) -> Result<CellValue, GridError> {
        Ok(self.row(row)?.get(column))
    }

    /// Returns a new grid with one cell replaced. Only the touched row is
    /// reallocated; all other rows are shared with `self`.
    pub fn set(&self, row: usize, column: &Column, value: CellValue) -> Result<Grid, GridError> {
        let mut updated = self.row(row)?.clone();
        updated.insert(column.key, value);
        let mut rows = self.rows.clone();
        rows[row] = Arc::new(updated);
        Ok(Grid { rows })
    }

    /// Reads the cell at `addr`, resolving the column through `view`.
    pub fn cell(&self, view: SheetView, addr: CellAddress) -> Result<CellValue, GridError> {
        let column = view.column(addr.col)?;
        self.get(addr.row, column)
    }

    pub fn set_cell(
        &self,
        view: SheetView,
        addr: CellAddress,
        value: CellValue,
    ) -> Result<Grid, GridError> {
        let column = view.column(addr.col)?;
        self.set(addr.row, column, value)
    }

    /// True when `row` is the same allocation in both grids.
    pub fn shares_row(&self, other: &Grid, row: usize) -> bool {
        match (self.rows.get(row), other.rows.get(row)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn has_content(&self) -> bool {
        self.rows.iter().any(|r| r.has_content())
    }
}

impl Default for Grid {
    fn default() -> Self {
        Grid::blank(NUM_ROWS)
    }
}

impl Serialize for Grid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.iter().map(|r| r.as_ref()))
    }
}

impl<'de> Deserialize<'de> for Grid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Grid::from_value(Some(&value), NUM_ROWS))
    }
}
