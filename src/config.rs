use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Number of rows in every grid. Rows are never inserted or removed.
pub const NUM_ROWS: usize = 100;

/// Quiet period before a debounced autosave is sent.
pub const AUTOSAVE_QUIET: Duration = Duration::from_millis(800);

/// Longest edge of a pasted image after downsampling.
pub const IMAGE_MAX_DIM: u32 = 1400;

/// JPEG quality used when re-encoding pasted images.
pub const IMAGE_QUALITY: u8 = 85;

pub const LIST_LIMIT: usize = 50;
pub const SEARCH_LIMIT: usize = 20;

pub const DEFAULT_TITLE: &str = "Untitled";

/// Tunables for one editing session.
#[derive(Clone, Debug)]
pub struct EditorConfig {
    pub rows: usize,
    pub autosave_quiet: Duration,
    pub image_max_dim: u32,
    pub image_quality: u8,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            rows: NUM_ROWS,
            autosave_quiet: AUTOSAVE_QUIET,
            image_max_dim: IMAGE_MAX_DIM,
            image_quality: IMAGE_QUALITY,
        }
    }
}

/// Storage locations shared by the server and the terminal editor.
#[derive(Parser, Clone, Debug)]
pub struct StorageArgs {
    /// SQLite database holding the sheets table
    #[arg(long = "db", env = "SHEETX_DB", default_value = "data/sheetx.sqlite")]
    pub db_path: PathBuf,

    /// Directory uploaded images are written to
    #[arg(long = "uploads", env = "SHEETX_UPLOADS", default_value = "public/uploads")]
    pub upload_dir: PathBuf,
}

/// Command line / environment configuration for the HTTP server.
#[derive(Parser, Clone, Debug)]
#[command(name = "sheetx-server", about = "Order sheet persistence API")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "SHEETX_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    #[command(flatten)]
    pub storage: StorageArgs,
}
