//! Clipboard payloads: tabular text blocks and pasted images.
//!
//! Text is split on newlines then tabs and written from the active cell
//! toward the bottom-right. Anything falling outside the grid is dropped.
//! Images are downsampled and re-encoded before upload; if decoding fails
//! the original bytes go through unchanged.

use image::ColorType;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use log::{debug, warn};

use crate::cell::{CellAddress, CellValue};
use crate::editor::{Change, SheetEditor};
use crate::view::ColumnKind;

/// One entry of a clipboard snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClipboardItem {
    Image { mime: String, bytes: Vec<u8> },
    Text(String),
}

/// Everything the host found on the clipboard for one paste event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub items: Vec<ClipboardItem>,
}

impl ClipboardPayload {
    pub fn text(text: impl Into<String>) -> Self {
        ClipboardPayload { items: vec![ClipboardItem::Text(text.into())] }
    }

    pub fn image(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        ClipboardPayload {
            items: vec![ClipboardItem::Image { mime: mime.into(), bytes }],
        }
    }

    /// First item whose type is `image/*`. Later images are ignored.
    pub fn first_image(&self) -> Option<(&str, &[u8])> {
        self.items.iter().find_map(|item| match item {
            ClipboardItem::Image { mime, bytes } if is_image_mime(mime) => {
                Some((mime.as_str(), bytes.as_slice()))
            }
            _ => None,
        })
    }

    pub fn first_text(&self) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            ClipboardItem::Text(t) => Some(t.as_str()),
            _ => None,
        })
    }
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

/// Splits clipboard text into rows of cells. A `\r` before each newline is
/// stripped and the empty line after a trailing newline is dropped.
pub fn parse_text_block(text: &str) -> Vec<Vec<String>> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
        .into_iter()
        .map(|line| {
            line.strip_suffix('\r')
                .unwrap_or(line)
                .split('\t')
                .map(str::to_string)
                .collect()
        })
        .collect()
}

/// Flag cells accept pasted text as a boolean.
fn coerce_flag(text: &str) -> bool {
    let t = text.trim().to_ascii_lowercase();
    !(t.is_empty() || t == "false" || t == "0" || t == "no")
}

impl SheetEditor {
    /// Writes a tab/newline-delimited block starting at the active cell.
    /// Ignored while an edit session is open.
    pub fn paste_text(&mut self, text: &str) -> Change {
        if self.is_editing() {
            return Change::None;
        }
        let origin = self.active_cell();
        let bounds = self.bounds();
        let columns = self.columns();
        let mut changed = false;
        let mut dropped = 0usize;

        for (dr, row) in parse_text_block(text).iter().enumerate() {
            for (dc, raw) in row.iter().enumerate() {
                let addr = CellAddress::new(origin.row + dr, origin.col + dc);
                if !bounds.contains(addr) {
                    dropped += 1;
                    continue;
                }
                let value = match columns[addr.col].kind {
                    ColumnKind::Flag => CellValue::Flag(coerce_flag(raw)),
                    ColumnKind::Text => CellValue::text(raw.as_str()),
                };
                match self.write_cell(addr, value) {
                    Ok(true) => changed = true,
                    Ok(false) => {}
                    Err(e) => warn!("paste skipped {}: {}", addr, e),
                }
            }
        }
        if dropped > 0 {
            debug!("paste at {} dropped {} cells outside the grid", origin, dropped);
        }
        if changed { Change::Content } else { Change::None }
    }

    /// Stores an uploaded image URL in `cell`.
    /// Flag columns only hold booleans and are left alone.
    pub fn place_image(&mut self, cell: CellAddress, url: &str) -> Change {
        match self.view().column(cell.col) {
            Ok(column) if !column.is_flag() => {}
            Ok(_) => {
                debug!("image url not written to flag cell {}", cell);
                return Change::None;
            }
            Err(e) => {
                warn!("image url not written to {}: {}", cell, e);
                return Change::None;
            }
        }
        match self.write_cell(cell, CellValue::text(url)) {
            Ok(true) => Change::Content,
            Ok(false) => Change::None,
            Err(e) => {
                warn!("image url not written to {}: {}", cell, e);
                Change::None
            }
        }
    }
}

/// Bytes ready for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Fits the image inside `max_dim` on its longest edge and re-encodes it as
/// JPEG at `quality`. Undecodable input is returned as-is.
pub fn optimize_image(bytes: &[u8], mime: &str, max_dim: u32, quality: u8) -> OptimizedImage {
    let passthrough = || OptimizedImage { bytes: bytes.to_vec(), mime: mime.to_string() };

    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            warn!("image decode failed ({}), uploading original bytes", e);
            return passthrough();
        }
    };

    let img = if img.width() > max_dim || img.height() > max_dim {
        img.resize(max_dim, max_dim, FilterType::Lanczos3)
    } else {
        img
    };
    let rgb = img.to_rgb8();

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    if let Err(e) = encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8) {
        warn!("image encode failed ({}), uploading original bytes", e);
        return passthrough();
    }
    debug!(
        "optimized image {}x{}: {} -> {} bytes",
        rgb.width(),
        rgb.height(),
        bytes.len(),
        out.len()
    );
    OptimizedImage { bytes: out, mime: "image/jpeg".to_string() }
}
