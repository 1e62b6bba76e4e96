/*!
# sheetx

A grid editor for small manufacturing order sheets (comprehensive, outsourcing
and shipping), with debounced autosave against a SQLite-backed sheet API.

## Overview

Every sheet is one record holding a fixed 100-row grid plus three metadata
blocks. The same grid is shown through three views that differ only in which
columns are visible. Editing is single-focus and keyboard/mouse driven, with
tabular text and image paste.

## Architecture

### Editor core
- **Grid** (`grid`) - fixed row count, copy-on-write rows shared between versions
- **Selection** (`selection`) - active cell, unordered drag rectangle, clamped moves
- **Edit session** (`editing`) - `Idle` / `Editing { cell, buffer }`
- **Input routing** (`input`) - DOM-style key names and mouse events mapped onto the above
- **Clipboard** (`clipboard`) - tab/newline text blocks, image downsampling

`SheetEditor` (`editor`) owns all of this and is the only mutation entry point.

### Persistence
- **Sync** (`sync`) - trailing-debounce autosave, lazy create of drafts
- **Collaborators** (`remote`) - `SheetStore` and `BlobStore` traits
- **SQLite store** (`store`) and **upload directory** (`uploads`)
- **Backups** (`saving`) - gzip-compressed JSON snapshots

`LiveSheet` (`session`) ties one editor to its sync layer and blob storage.

### Server (feature `web`)
- **HTTP API** (`app`) - axum routes for sheets, uploads and print reports
- **Reports** (`report`) - outsourcing/shipping documents as CSV or XLSX

## REST API Endpoints

- `GET /api/sheets[?q=]` - recent sheets, or a title search
- `POST /api/sheets` - create
- `GET|PUT /api/sheets/{id}` - fetch / partial update
- `POST /api/uploads` - raw image body, `x-sheet-id` header
- `GET /api/sheets/{id}/print/{mode}[?format=csv|xlsx]` - print report
*/

pub mod cell;
pub mod clipboard;
pub mod config;
pub mod editing;
pub mod editor;
pub mod grid;
pub mod input;
pub mod record;
pub mod remote;
pub mod report;
pub mod saving;
pub mod selection;
pub mod session;
pub mod store;
pub mod sync;
pub mod uploads;
pub mod view;

#[cfg(feature = "web")]
pub mod app;

pub use cell::{CellAddress, CellValue};
pub use clipboard::{ClipboardItem, ClipboardPayload};
pub use config::EditorConfig;
pub use editor::{Change, SheetEditor};
pub use input::{FocusTarget, Key, KeyEvent, Modifiers};
pub use record::{RecordId, RecordState, SheetData, SheetRecord};
pub use remote::{BlobStore, SheetStore};
pub use session::{LiveSheet, PasteError, PasteOutcome};
pub use store::SqliteStore;
pub use sync::{PersistenceSync, SyncError};
pub use uploads::UploadDir;
pub use view::SheetView;
