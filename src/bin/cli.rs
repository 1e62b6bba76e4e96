#![cfg(not(tarpaulin_include))]

use clap::Parser;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use sheetx::cell::CellAddress;
use sheetx::clipboard::ClipboardPayload;
use sheetx::config::{EditorConfig, LIST_LIMIT, SEARCH_LIMIT, StorageArgs};
use sheetx::editor::SheetEditor;
use sheetx::input::{FocusTarget, Key, KeyEvent, Modifiers};
use sheetx::record::{MetadataBlock, RecordId, SheetSummary};
use sheetx::remote::SheetStore;
use sheetx::report::{self, PrintMode};
use sheetx::saving;
use sheetx::session::LiveSheet;
use sheetx::store::SqliteStore;
use sheetx::uploads::UploadDir;
use sheetx::view::SheetView;

type Sheet = LiveSheet<SqliteStore, UploadDir>;

const WINDOW_ROWS: usize = 10;
const CELL_WIDTH: usize = 12;

/// Terminal editor for order sheets.
#[derive(Parser)]
#[command(name = "sheetx-cli")]
struct CliArgs {
    /// Open an existing sheet instead of a new draft
    #[arg(long)]
    open: Option<String>,

    #[command(flatten)]
    storage: StorageArgs,
}

fn unescape(text: &str) -> String {
    text.replace("\\t", "\t").replace("\\n", "\n")
}

fn mime_from_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

fn key_from_command(command: &str) -> Option<KeyEvent> {
    let event = match command {
        "up" => KeyEvent::new(Key::ArrowUp),
        "down" => KeyEvent::new(Key::ArrowDown),
        "left" => KeyEvent::new(Key::ArrowLeft),
        "right" => KeyEvent::new(Key::ArrowRight),
        "tab" => KeyEvent::new(Key::Tab),
        "stab" => KeyEvent::with_modifiers(Key::Tab, Modifiers::SHIFT),
        "enter" => KeyEvent::new(Key::Enter),
        "esc" => KeyEvent::new(Key::Escape),
        "f2" => KeyEvent::new(Key::F2),
        "bs" => KeyEvent::new(Key::Backspace),
        _ => match Key::from_dom(command) {
            Key::Other(_) | Key::Char(_) => return None,
            key => KeyEvent::new(key),
        },
    };
    Some(event)
}

fn clip(text: &str) -> String {
    let mut out: String = text.chars().take(CELL_WIDTH).collect();
    if text.chars().count() > CELL_WIDTH {
        out.pop();
        out.push('~');
    }
    out
}

fn display(editor: &SheetEditor, top: usize) {
    let columns = editor.columns();
    print!("     ");
    for column in columns {
        print!(" {:<width$}", clip(column.header), width = CELL_WIDTH);
    }
    println!();

    let rows = editor.grid().row_count();
    for row in top..(top + WINDOW_ROWS).min(rows) {
        print!("{:>4} ", row + 1);
        for col in 0..columns.len() {
            let addr = CellAddress::new(row, col);
            let text = match editor.edit_session().cell() {
                Some(cell) if cell == addr => format!("{}|", editor.edit_session().buffer().unwrap_or("")),
                _ => editor.cell_value(addr).map(|v| v.to_string()).unwrap_or_default(),
            };
            let mark = if editor.active_cell() == addr {
                '>'
            } else if editor.is_cell_in_selection(row, col) {
                '*'
            } else {
                ' '
            };
            print!("{}{:<width$}", mark, clip(&text), width = CELL_WIDTH);
        }
        println!();
    }
}

fn print_summaries(items: &[SheetSummary]) {
    for item in items {
        println!("  {}  {}  (updated {})", item.id, item.title, item.updated_at);
    }
    if items.is_empty() {
        println!("  (none)");
    }
}

fn print_help() {
    println!("Commands:");
    println!("  q: Save and quit");
    println!("  up/down/left/right/tab/stab/enter/esc/f2/bs: Keys");
    println!("  type <text>: Type characters into the grid");
    println!("  click|press|drag|dbl <cell>, release: Mouse");
    println!("  blur: Leave the edit box");
    println!("  paste <text>: Paste text (\\t and \\n escapes)");
    println!("  paste-image <file>: Paste an image file");
    println!("  toggle <cell>: Flip a checkbox cell");
    println!("  view <综合|外协|出货>: Switch view");
    println!("  title <text>, meta <block> <field> <value>: Edit header fields");
    println!("  save, list, search <q>, open <id>, new");
    println!("  print <outsourcing|shipping>: Print report as CSV");
    println!("  backup <file>, restore <file>");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = CliArgs::parse();

    let store = Arc::new(SqliteStore::open(&args.storage.db_path)?);
    let uploads = Arc::new(UploadDir::new(&args.storage.upload_dir));
    let config = EditorConfig::default();

    let mut sheet: Sheet = match &args.open {
        Some(id) => {
            LiveSheet::open(Arc::clone(&store), Arc::clone(&uploads), &RecordId::from(id.as_str()), config.clone())
                .await?
        }
        None => LiveSheet::draft(Arc::clone(&store), Arc::clone(&uploads), config.clone()),
    };

    let mut top = 0usize;
    let mut status = String::from("ok");
    let mut start_time = Instant::now();
    loop {
        let active = sheet.editor().active_cell();
        if active.row < top {
            top = active.row;
        } else if active.row >= top + WINDOW_ROWS {
            top = active.row + 1 - WINDOW_ROWS;
        }
        let ident = match sheet.record_state().id() {
            Some(id) => id.to_string(),
            None => "draft".to_string(),
        };
        println!("{} [{}] {} {}", sheet.editor().title(), ident, sheet.editor().view(), active);
        display(sheet.editor(), top);

        print!("[{:.1}] ({}) > ", start_time.elapsed().as_secs_f64(), status);
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        start_time = Instant::now();
        let line = line.trim_end_matches(['\n', '\r']);
        let (command, rest) = match line.trim_start().split_once(' ') {
            Some((c, r)) => (c, r),
            None => (line.trim(), ""),
        };
        status = String::from("ok");

        match command {
            "" => status = String::from("invalid command"),
            "help" => print_help(),
            "q" => break,
            "type" => {
                for c in rest.chars() {
                    let _ = sheet.key(&KeyEvent::new(Key::Char(c)));
                }
            }
            "click" | "drag" | "dbl" | "toggle" => match rest.parse::<CellAddress>() {
                Ok(cell) => match command {
                    "click" => {
                        let _ = sheet.mouse_down(cell);
                        let _ = sheet.mouse_up();
                    }
                    "drag" => {
                        let _ = sheet.mouse_enter(cell);
                    }
                    "dbl" => {
                        let _ = sheet.double_click(cell);
                    }
                    _ => {
                        if let Err(e) = sheet.toggle_flag(cell) {
                            status = e.to_string();
                        }
                    }
                },
                Err(e) => status = e,
            },
            "press" => match rest.parse::<CellAddress>() {
                Ok(cell) => {
                    let _ = sheet.mouse_down(cell);
                }
                Err(e) => status = e,
            },
            "release" => {
                let _ = sheet.mouse_up();
            }
            "blur" => {
                let _ = sheet.blur();
            }
            "paste" => {
                let payload = ClipboardPayload::text(unescape(rest));
                match sheet.paste(&payload, FocusTarget::Grid).await {
                    Ok(outcome) => status = format!("{:?}", outcome),
                    Err(e) => status = e.to_string(),
                }
            }
            "paste-image" => {
                let path = Path::new(rest.trim());
                match std::fs::read(path) {
                    Ok(bytes) => {
                        let payload = ClipboardPayload::image(mime_from_path(path), bytes);
                        match sheet.paste(&payload, FocusTarget::Grid).await {
                            Ok(outcome) => status = format!("{:?}", outcome),
                            Err(e) => status = e.to_string(),
                        }
                    }
                    Err(e) => status = e.to_string(),
                }
            }
            "view" => match rest.trim().parse::<SheetView>() {
                Ok(view) => {
                    let _ = sheet.switch_view(view);
                }
                Err(e) => status = e.to_string(),
            },
            "title" => match sheet.commit_title(rest).await {
                Ok(None) => status = String::from("title kept locally (draft)"),
                Ok(Some(_)) => {}
                Err(e) => status = e.to_string(),
            },
            "meta" => {
                let mut parts = rest.splitn(3, ' ');
                let (block, field, value) = (parts.next(), parts.next(), parts.next().unwrap_or(""));
                match (block.map(str::parse::<MetadataBlock>), field) {
                    (Some(Ok(block)), Some(field)) => {
                        if let Err(e) = sheet.set_metadata(block, field, value) {
                            status = e.to_string();
                        }
                    }
                    _ => status = String::from("usage: meta <block> <field> <value>"),
                }
            }
            "save" => match sheet.save_now().await {
                Ok(Some(record)) => status = format!("saved {}", record.id),
                Ok(None) => status = String::from("nothing to save"),
                Err(e) => status = e.to_string(),
            },
            "list" => match store.list(LIST_LIMIT).await {
                Ok(items) => print_summaries(&items),
                Err(e) => status = e.to_string(),
            },
            "search" => match store.search(rest, SEARCH_LIMIT).await {
                Ok(items) => print_summaries(&items),
                Err(e) => status = e.to_string(),
            },
            "open" => {
                let id = RecordId::from(rest.trim());
                match LiveSheet::open(Arc::clone(&store), Arc::clone(&uploads), &id, config.clone()).await {
                    Ok(next) => {
                        let _ = sheet.save_now().await;
                        std::mem::replace(&mut sheet, next).close();
                    }
                    Err(e) => status = e.to_string(),
                }
            }
            "new" => {
                let _ = sheet.save_now().await;
                let next = LiveSheet::draft(Arc::clone(&store), Arc::clone(&uploads), config.clone());
                std::mem::replace(&mut sheet, next).close();
            }
            "print" => match rest.trim().parse::<PrintMode>() {
                Ok(mode) => print!("{}", report::to_csv(&report::build_report(sheet.data(), mode))),
                Err(e) => status = e,
            },
            "backup" => match sheet.save_now().await {
                Ok(Some(record)) => match saving::save_record(&record, Path::new(rest.trim())) {
                    Ok(()) => status = format!("backed up {}", record.id),
                    Err(e) => status = e.to_string(),
                },
                Ok(None) => status = String::from("blank draft, nothing to back up"),
                Err(e) => status = e.to_string(),
            },
            "restore" => match saving::load_record(Path::new(rest.trim())) {
                Ok(record) => match store.create(&record.title, &record.data).await {
                    Ok(created) => {
                        let _ = sheet.save_now().await;
                        let next = LiveSheet::from_record(
                            Arc::clone(&store),
                            Arc::clone(&uploads),
                            created,
                            config.clone(),
                        );
                        std::mem::replace(&mut sheet, next).close();
                    }
                    Err(e) => status = e.to_string(),
                },
                Err(e) => status = e.to_string(),
            },
            other => match key_from_command(other) {
                Some(event) => {
                    let _ = sheet.key(&event);
                }
                None => status = String::from("invalid command"),
            },
        }
    }

    if let Err(e) = sheet.save_now().await {
        eprintln!("final save failed: {}", e);
    }
    sheet.close();
    Ok(())
}
