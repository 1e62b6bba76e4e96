use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based position of a cell in the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub const fn new(row: usize, col: usize) -> Self {
        CellAddress { row, col }
    }

    /// Spreadsheet-style name, e.g. `A1` for (0, 0).
    pub fn name(&self) -> String {
        format!("{}{}", col_to_letter(self.col), self.row + 1)
    }
}

impl std::str::FromStr for CellAddress {
    type Err = String;

    /// Parses names like `B12`. Letters are case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("invalid cell name: {}", s));
        }
        let row: usize = digits.parse().map_err(|_| format!("invalid cell name: {}", s))?;
        if row == 0 {
            return Err(format!("invalid cell name: {}", s));
        }
        let col = letters
            .chars()
            .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
        Ok(CellAddress::new(row - 1, col - 1))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Converts a zero-based column index to letters (0 -> A, 26 -> AA).
pub fn col_to_letter(col: usize) -> String {
    let mut n = col + 1;
    let mut result = Vec::new();
    while n > 0 {
        n -= 1;
        result.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result.iter().rev().collect()
}

/// Value stored in a grid cell.
///
/// Serialized untagged so payloads carry plain JSON scalars.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn empty() -> Self {
        CellValue::Text(String::new())
    }

    /// True when the value carries no content: whitespace-only text, `false`,
    /// or a zero / NaN number.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Flag(b) => !b,
            CellValue::Number(n) => *n == 0.0 || n.is_nan(),
        }
    }

    pub fn as_flag(&self) -> bool {
        !self.is_blank()
    }

    /// Text used to seed an edit buffer.
    pub fn to_edit_string(&self) -> String {
        self.to_string()
    }

    /// Whether the value looks like an image reference that should be
    /// rendered rather than printed.
    pub fn is_image_ref(&self) -> bool {
        match self {
            CellValue::Text(s) => {
                let v = s.trim();
                v.starts_with("data:image")
                    || v.starts_with("blob:")
                    || v.starts_with("/uploads/")
                    || v.starts_with("http://")
                    || v.starts_with("https://")
            }
            _ => false,
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::empty()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Flag(b) => write!(f, "{}", b),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Flag(b)
    }
}
