//! One open sheet: the synchronous editor plus its persistence and blob
//! collaborators.
//!
//! Every host event goes through [`LiveSheet`]; content changes are forwarded
//! to [`PersistenceSync`] as snapshots.

use std::sync::Arc;

use log::{info, warn};

use crate::cell::CellAddress;
use crate::clipboard::{ClipboardPayload, optimize_image};
use crate::config::EditorConfig;
use crate::editor::{Change, SheetEditor};
use crate::grid::GridError;
use crate::input::{FocusTarget, KeyEvent};
use crate::record::{MetadataBlock, RecordId, RecordState, SheetData, SheetRecord, UnknownField};
use crate::remote::{BlobStore, SheetStore, StoreError, UploadError};
use crate::sync::{PersistenceSync, SyncError};
use crate::view::SheetView;

/// What a paste did to the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PasteOutcome {
    /// Focus was elsewhere, an edit was open, or the clipboard was empty.
    Ignored,
    Text { changed: bool },
    Image { cell: CellAddress, url: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PasteError {
    #[error("could not persist sheet before upload: {0}")]
    Persist(#[from] SyncError),
    #[error("image upload failed: {0}")]
    Upload(#[from] UploadError),
    #[error("image processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub struct LiveSheet<S: SheetStore, B: BlobStore> {
    editor: SheetEditor,
    sync: PersistenceSync<S>,
    blobs: Arc<B>,
    config: EditorConfig,
}

impl<S: SheetStore, B: BlobStore> LiveSheet<S, B> {
    /// A new, unsaved sheet. Nothing reaches the store until it has content.
    pub fn draft(store: Arc<S>, blobs: Arc<B>, config: EditorConfig) -> Self {
        let editor = SheetEditor::blank(config.rows);
        let sync = PersistenceSync::new(
            store,
            RecordState::Draft,
            editor.title(),
            editor.snapshot(),
            config.autosave_quiet,
        );
        LiveSheet { editor, sync, blobs, config }
    }

    /// Loads an existing record.
    pub async fn open(
        store: Arc<S>,
        blobs: Arc<B>,
        id: &RecordId,
        config: EditorConfig,
    ) -> Result<Self, StoreError> {
        let record = store.get(id).await?;
        info!("opened sheet {} ({})", record.id, record.title);
        Ok(Self::from_record(store, blobs, record, config))
    }

    pub fn from_record(store: Arc<S>, blobs: Arc<B>, record: SheetRecord, config: EditorConfig) -> Self {
        let editor = SheetEditor::new(record.data, &record.title);
        let sync = PersistenceSync::new(
            store,
            RecordState::Persisted(record.id),
            editor.title(),
            editor.snapshot(),
            config.autosave_quiet,
        );
        LiveSheet { editor, sync, blobs, config }
    }

    pub fn editor(&self) -> &SheetEditor {
        &self.editor
    }

    pub fn data(&self) -> &SheetData {
        self.editor.data()
    }

    pub fn record_state(&self) -> RecordState {
        self.sync.record_state()
    }

    pub fn store(&self) -> &Arc<S> {
        self.sync.store()
    }

    pub fn has_pending_save(&self) -> bool {
        self.sync.has_pending_save()
    }

    fn settle(&self, change: Change) -> Change {
        if change.is_content() {
            self.sync.on_mutation(self.editor.snapshot());
        }
        change
    }

    pub fn key(&mut self, event: &KeyEvent) -> Change {
        let change = self.editor.handle_key(event);
        self.settle(change)
    }

    pub fn edit_buffer_changed(&mut self, text: &str) -> Change {
        self.editor.edit_buffer_changed(text)
    }

    pub fn mouse_down(&mut self, cell: CellAddress) -> Change {
        let change = self.editor.mouse_down(cell);
        self.settle(change)
    }

    pub fn mouse_enter(&mut self, cell: CellAddress) -> Change {
        self.editor.mouse_enter(cell)
    }

    pub fn mouse_up(&mut self) -> Change {
        self.editor.mouse_up()
    }

    pub fn double_click(&mut self, cell: CellAddress) -> Change {
        let change = self.editor.double_click(cell);
        self.settle(change)
    }

    pub fn blur(&mut self) -> Change {
        let change = self.editor.blur();
        self.settle(change)
    }

    pub fn toggle_flag(&mut self, cell: CellAddress) -> Result<Change, GridError> {
        let change = self.editor.toggle_flag(cell)?;
        Ok(self.settle(change))
    }

    pub fn switch_view(&mut self, view: SheetView) -> Change {
        let change = self.editor.switch_view(view);
        self.settle(change)
    }

    pub fn set_metadata(&mut self, block: MetadataBlock, field: &str, value: &str) -> Result<Change, UnknownField> {
        let change = self.editor.set_metadata(block, field, value)?;
        Ok(self.settle(change))
    }

    /// Title field committed (blur or Enter).
    pub async fn commit_title(&mut self, title: &str) -> Result<Option<SheetRecord>, SyncError> {
        let title = self.editor.set_title(title).to_string();
        self.sync.commit_title(&title).await
    }

    /// Handles a paste event. Images win over text; only the first image
    /// item is used. The image lands in the cell that was active when the
    /// paste began, even if the selection moves while the upload runs.
    pub async fn paste(
        &mut self,
        payload: &ClipboardPayload,
        target: FocusTarget,
    ) -> Result<PasteOutcome, PasteError> {
        if target != FocusTarget::Grid || self.editor.is_editing() {
            return Ok(PasteOutcome::Ignored);
        }

        if let Some((mime, bytes)) = payload.first_image() {
            let cell = self.editor.active_cell();
            let url = self.upload_image(bytes.to_vec(), mime.to_string()).await?;
            let change = self.editor.place_image(cell, &url);
            let _ = self.settle(change);
            return Ok(PasteOutcome::Image { cell, url });
        }

        match payload.first_text() {
            Some(text) => {
                let change = self.editor.paste_text(text);
                let changed = self.settle(change).is_content();
                Ok(PasteOutcome::Text { changed })
            }
            None => Ok(PasteOutcome::Ignored),
        }
    }

    async fn upload_image(&self, bytes: Vec<u8>, mime: String) -> Result<String, PasteError> {
        let max_dim = self.config.image_max_dim;
        let quality = self.config.image_quality;
        let optimized =
            tokio::task::spawn_blocking(move || optimize_image(&bytes, &mime, max_dim, quality)).await?;

        let id = self.sync.ensure_persisted().await?;
        match self.blobs.upload(optimized.bytes, &optimized.mime, id.as_str()).await {
            Ok(url) => Ok(url),
            Err(e) => {
                warn!("paste upload for sheet {} failed: {}", id, e);
                Err(e.into())
            }
        }
    }

    /// Flushes local state now instead of waiting for the debounce.
    pub async fn save_now(&mut self) -> Result<Option<SheetRecord>, SyncError> {
        let change = self.editor.commit_edit(None);
        let _ = self.settle(change);
        self.sync.save_now().await
    }

    /// Tears the sheet down. Pending debounced saves are cancelled.
    pub fn close(self) {
        self.sync.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::config::NUM_ROWS;
    use crate::input::Key;
    use crate::sync::tests::MockStore;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockBlobs {
        uploads: Mutex<Vec<(String, String, usize)>>,
        fail: bool,
    }

    impl BlobStore for MockBlobs {
        async fn upload(&self, bytes: Vec<u8>, mime: &str, scope: &str) -> Result<String, UploadError> {
            if self.fail {
                return Err(UploadError::Failed("disk full".into()));
            }
            self.uploads.lock().unwrap().push((mime.to_string(), scope.to_string(), bytes.len()));
            Ok(format!("/uploads/{}/img.bin", scope))
        }
    }

    fn draft(blobs: MockBlobs) -> (Arc<MockStore>, Arc<MockBlobs>, LiveSheet<MockStore, MockBlobs>) {
        let store = Arc::new(MockStore::default());
        let blobs = Arc::new(blobs);
        let sheet = LiveSheet::draft(Arc::clone(&store), Arc::clone(&blobs), EditorConfig::default());
        (store, blobs, sheet)
    }

    #[tokio::test(start_paused = true)]
    async fn typing_into_draft_creates_once_then_autosaves() {
        let (store, _, mut sheet) = draft(MockBlobs::default());
        for k in ["a", "b", "Enter", "c", "Enter"] {
            let _ = sheet.key(&KeyEvent::dom(k));
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.create_count(), 1);
        assert!(!sheet.record_state().is_draft());

        let _ = sheet.key(&KeyEvent::dom("d"));
        let _ = sheet.key(&KeyEvent::dom("Escape"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        let saves = store.update_count();

        let _ = sheet.key(&KeyEvent::dom("e"));
        let _ = sheet.key(&KeyEvent::new(Key::Enter));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.update_count(), saves + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn text_paste_goes_through_sync() {
        let (store, _, mut sheet) = draft(MockBlobs::default());
        let out = sheet
            .paste(&ClipboardPayload::text("a\tb\nc\td"), FocusTarget::Grid)
            .await
            .unwrap();
        assert_eq!(out, PasteOutcome::Text { changed: true });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.create_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn paste_into_text_input_is_ignored() {
        let (_, _, mut sheet) = draft(MockBlobs::default());
        let out = sheet
            .paste(&ClipboardPayload::text("x"), FocusTarget::TextInput)
            .await
            .unwrap();
        assert_eq!(out, PasteOutcome::Ignored);
        assert!(!sheet.data().has_content());
    }

    #[tokio::test(start_paused = true)]
    async fn image_paste_promotes_draft_and_writes_url() {
        let (store, blobs, mut sheet) = draft(MockBlobs::default());
        let _ = sheet.mouse_down(CellAddress::new(2, 0));
        let _ = sheet.mouse_up();
        let payload = ClipboardPayload::image("image/png", b"not really png".to_vec());

        let out = sheet.paste(&payload, FocusTarget::Grid).await.unwrap();
        let cell = CellAddress::new(2, 0);
        assert_eq!(out, PasteOutcome::Image { cell, url: "/uploads/new-1/img.bin".into() });
        assert_eq!(store.create_count(), 1);
        assert_eq!(
            sheet.editor().cell_value(cell).unwrap(),
            CellValue::text("/uploads/new-1/img.bin")
        );
        let uploads = blobs.uploads.lock().unwrap().clone();
        assert_eq!(uploads, vec![("image/png".to_string(), "new-1".to_string(), 14)]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_upload_leaves_grid_unchanged() {
        let (_, _, mut sheet) = draft(MockBlobs { fail: true, ..Default::default() });
        let before = sheet.editor().grid().clone();
        let payload = ClipboardPayload::image("image/png", vec![1, 2, 3]);
        let err = sheet.paste(&payload, FocusTarget::Grid).await.unwrap_err();
        assert!(matches!(err, PasteError::Upload(_)));
        assert_eq!(sheet.editor().grid(), &before);
    }

    #[tokio::test(start_paused = true)]
    async fn title_then_content_create_carries_title() {
        let (store, _, mut sheet) = draft(MockBlobs::default());
        assert!(sheet.commit_title("Batch 12").await.unwrap().is_none());
        let _ = sheet.switch_view(SheetView::Outsourcing);
        let _ = sheet.toggle_flag(CellAddress::new(0, 7)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let creates = store.creates.lock().unwrap().clone();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].0, "Batch 12");
        assert_eq!(creates[0].1.active_sheet, SheetView::Outsourcing);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_save() {
        let store = Arc::new(MockStore::default());
        let record = SheetRecord {
            id: RecordId::from("r1"),
            title: "Existing".into(),
            data: SheetData::blank(NUM_ROWS),
            created_at: String::new(),
            updated_at: String::new(),
        };
        let mut sheet = LiveSheet::from_record(
            Arc::clone(&store),
            Arc::new(MockBlobs::default()),
            record,
            EditorConfig::default(),
        );
        let _ = sheet.paste(&ClipboardPayload::text("late"), FocusTarget::Grid).await.unwrap();
        assert!(sheet.has_pending_save());
        sheet.close();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.update_count(), 0);
    }
}
