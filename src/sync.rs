//! Debounced persistence of one sheet.
//!
//! Mutations while persisted restart a quiet-period timer; only the snapshot
//! current when the timer fires is sent. Rapid mutations are coalesced by a
//! generation counter: a timer task whose generation is stale bails out.
//! While the sheet is a draft nothing is saved until a mutation produces
//! content, which triggers exactly one create call.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use crate::record::{RecordId, RecordState, SheetData, SheetPatch, SheetRecord, normalize_title};
use crate::remote::{SheetStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sheet {0} no longer exists")]
    NotFound(RecordId),
    #[error(transparent)]
    Store(StoreError),
    #[error("sheet is closed")]
    Closed,
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => SyncError::NotFound(id),
            other => SyncError::Store(other),
        }
    }
}

struct SyncState {
    record: RecordState,
    title: String,
    latest: SheetData,
    /// Bumped by every mutation.
    revision: u64,
    /// Bumped by every scheduled save; only the newest timer may fire.
    generation: u64,
    pending: Option<JoinHandle<()>>,
    creating: bool,
    closed: bool,
}

struct Inner<S> {
    store: Arc<S>,
    quiet: Duration,
    state: Mutex<SyncState>,
    create_lock: tokio::sync::Mutex<()>,
    save_lock: tokio::sync::Mutex<()>,
}

impl<S: SheetStore> Inner<S> {
    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn schedule_save(self: &Arc<Self>, st: &mut SyncState) {
        if let Some(handle) = st.pending.take() {
            handle.abort();
        }
        st.generation += 1;
        let generation = st.generation;
        let inner = Arc::clone(self);
        st.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.quiet).await;
            inner.flush(generation).await;
        }));
    }

    async fn flush(&self, generation: u64) {
        let (id, data) = {
            let mut st = self.state();
            if st.closed || st.generation != generation {
                return;
            }
            // Past this point the task is no longer abortable by newer edits.
            st.pending = None;
            let Some(id) = st.record.id().cloned() else {
                return;
            };
            (id, st.latest.clone())
        };

        let _guard = self.save_lock.lock().await;
        match self.store.update(&id, SheetPatch::data(data)).await {
            Ok(_) => debug!("autosaved sheet {}", id),
            Err(StoreError::NotFound(_)) => warn!("autosave dropped: sheet {} not found", id),
            Err(e) => error!("autosave of sheet {} failed: {}", id, e),
        }
    }

    async fn ensure_persisted(self: &Arc<Self>) -> Result<RecordId, SyncError> {
        let known = self.state().record.id().cloned();
        if let Some(id) = known {
            return Ok(id);
        }

        let _guard = self.create_lock.lock().await;
        let (title, data, revision) = {
            let st = self.state();
            if st.closed {
                return Err(SyncError::Closed);
            }
            if let Some(id) = st.record.id() {
                return Ok(id.clone());
            }
            (st.title.clone(), st.latest.clone(), st.revision)
        };

        let record = self.store.create(&title, &data).await?;
        info!("created sheet {} ({})", record.id, record.title);

        let mut st = self.state();
        st.record = RecordState::Persisted(record.id.clone());
        if st.revision != revision && !st.closed {
            self.schedule_save(&mut st);
        }
        Ok(record.id)
    }
}

/// Keeps the remote record of one sheet in step with local edits.
///
/// Must be used from within a tokio runtime; saves run as spawned tasks.
pub struct PersistenceSync<S: SheetStore> {
    inner: Arc<Inner<S>>,
}

impl<S: SheetStore> PersistenceSync<S> {
    pub fn new(store: Arc<S>, record: RecordState, title: &str, data: SheetData, quiet: Duration) -> Self {
        PersistenceSync {
            inner: Arc::new(Inner {
                store,
                quiet,
                state: Mutex::new(SyncState {
                    record,
                    title: normalize_title(title),
                    latest: data,
                    revision: 0,
                    generation: 0,
                    pending: None,
                    creating: false,
                    closed: false,
                }),
                create_lock: tokio::sync::Mutex::new(()),
                save_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn record_state(&self) -> RecordState {
        self.inner.state().record.clone()
    }

    pub fn title(&self) -> String {
        self.inner.state().title.clone()
    }

    /// Whether a debounced save is waiting for its quiet period.
    pub fn has_pending_save(&self) -> bool {
        self.inner.state().pending.is_some()
    }

    /// Records a content mutation. Persisted sheets get a debounced save;
    /// drafts are created in the background once they hold content.
    pub fn on_mutation(&self, snapshot: SheetData) {
        let mut st = self.inner.state();
        if st.closed {
            return;
        }
        let has_content = snapshot.has_content();
        st.latest = snapshot;
        st.revision += 1;

        if !st.record.is_draft() {
            self.inner.schedule_save(&mut st);
        } else if has_content && !st.creating {
            st.creating = true;
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                if let Err(e) = inner.ensure_persisted().await {
                    error!("creating sheet failed: {}", e);
                }
                inner.state().creating = false;
            });
        }
    }

    /// Promotes a draft to a persisted record if needed and returns its id.
    pub async fn ensure_persisted(&self) -> Result<RecordId, SyncError> {
        self.inner.ensure_persisted().await
    }

    /// Commits a title immediately. Skipped while the sheet is a draft; the
    /// title travels with the create call instead.
    pub async fn commit_title(&self, title: &str) -> Result<Option<SheetRecord>, SyncError> {
        let (id, title) = {
            let mut st = self.inner.state();
            if st.closed {
                return Err(SyncError::Closed);
            }
            st.title = normalize_title(title);
            match st.record.id() {
                Some(id) => (id.clone(), st.title.clone()),
                None => {
                    debug!("title change kept local while draft");
                    return Ok(None);
                }
            }
        };
        let _guard = self.inner.save_lock.lock().await;
        let record = self.inner.store.update(&id, SheetPatch::title(title)).await?;
        Ok(Some(record))
    }

    /// Sends the current state right away, cancelling any pending timer.
    /// A blank draft stays local.
    pub async fn save_now(&self) -> Result<Option<SheetRecord>, SyncError> {
        let (target, has_content) = {
            let mut st = self.inner.state();
            if st.closed {
                return Err(SyncError::Closed);
            }
            if let Some(handle) = st.pending.take() {
                handle.abort();
            }
            st.generation += 1;
            let patch = SheetPatch { title: Some(st.title.clone()), data: Some(st.latest.clone()) };
            (st.record.id().cloned().map(|id| (id, patch)), st.latest.has_content())
        };
        let Some((id, patch)) = target else {
            if !has_content {
                return Ok(None);
            }
            let id = self.inner.ensure_persisted().await?;
            return Ok(Some(self.inner.store.get(&id).await?));
        };
        let _guard = self.inner.save_lock.lock().await;
        let record = self.inner.store.update(&id, patch).await?;
        Ok(Some(record))
    }

    /// Cancels pending timers. No save happens after this.
    pub fn shutdown(&self) {
        let mut st = self.inner.state();
        st.closed = true;
        if let Some(handle) = st.pending.take() {
            handle.abort();
        }
    }
}

impl<S: SheetStore> Drop for PersistenceSync<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cell::{CellAddress, CellValue};
    use crate::record::SheetSummary;
    use crate::view::SheetView;

    /// In-memory store that records every call.
    #[derive(Default)]
    pub(crate) struct MockStore {
        pub creates: Mutex<Vec<(String, SheetData)>>,
        pub updates: Mutex<Vec<(RecordId, SheetPatch)>>,
        pub create_delay: Duration,
        pub missing: bool,
    }

    impl MockStore {
        pub fn create_count(&self) -> usize {
            self.creates.lock().unwrap().len()
        }

        pub fn update_count(&self) -> usize {
            self.updates.lock().unwrap().len()
        }

        pub fn last_update(&self) -> Option<SheetPatch> {
            self.updates.lock().unwrap().last().map(|(_, p)| p.clone())
        }

        fn record(&self, id: &RecordId, title: &str, data: SheetData) -> SheetRecord {
            SheetRecord {
                id: id.clone(),
                title: title.to_string(),
                data,
                created_at: "t0".into(),
                updated_at: "t1".into(),
            }
        }
    }

    impl SheetStore for MockStore {
        async fn list(&self, _limit: usize) -> Result<Vec<SheetSummary>, StoreError> {
            Ok(Vec::new())
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SheetSummary>, StoreError> {
            Ok(Vec::new())
        }

        async fn create(&self, title: &str, data: &SheetData) -> Result<SheetRecord, StoreError> {
            tokio::time::sleep(self.create_delay).await;
            self.creates.lock().unwrap().push((title.to_string(), data.clone()));
            Ok(self.record(&RecordId::from("new-1"), title, data.clone()))
        }

        async fn get(&self, id: &RecordId) -> Result<SheetRecord, StoreError> {
            let data = self
                .creates
                .lock()
                .unwrap()
                .last()
                .map(|(_, d)| d.clone())
                .unwrap_or_default();
            Ok(self.record(id, "stored", data))
        }

        async fn update(&self, id: &RecordId, patch: SheetPatch) -> Result<SheetRecord, StoreError> {
            if self.missing {
                return Err(StoreError::NotFound(id.clone()));
            }
            self.updates.lock().unwrap().push((id.clone(), patch.clone()));
            Ok(self.record(id, patch.title.as_deref().unwrap_or("stored"), patch.data.unwrap_or_default()))
        }
    }

    const QUIET: Duration = Duration::from_millis(800);

    fn with_text(data: &SheetData, row: usize, text: &str) -> SheetData {
        let mut data = data.clone();
        data.master_data = data
            .master_data
            .set_cell(SheetView::Comprehensive, CellAddress::new(row, 2), CellValue::text(text))
            .unwrap();
        data
    }

    fn persisted(store: &Arc<MockStore>) -> PersistenceSync<MockStore> {
        PersistenceSync::new(
            Arc::clone(store),
            RecordState::Persisted(RecordId::from("abc")),
            "Order",
            SheetData::blank(10),
            QUIET,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_inside_window_coalesce() {
        let store = Arc::new(MockStore::default());
        let sync = persisted(&store);
        let base = SheetData::blank(10);

        sync.on_mutation(with_text(&base, 0, "first"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        sync.on_mutation(with_text(&base, 0, "second"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.update_count(), 0);
        assert!(sync.has_pending_save());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.update_count(), 1);
        let data = store.last_update().unwrap().data.unwrap();
        assert_eq!(data, with_text(&base, 0, "second"));
        assert!(!sync.has_pending_save());
    }

    #[tokio::test(start_paused = true)]
    async fn separate_windows_save_twice() {
        let store = Arc::new(MockStore::default());
        let sync = persisted(&store);
        let base = SheetData::blank(10);
        sync.on_mutation(with_text(&base, 0, "a"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        sync.on_mutation(with_text(&base, 0, "b"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.update_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_draft_never_creates() {
        let store = Arc::new(MockStore::default());
        let sync = PersistenceSync::new(Arc::clone(&store), RecordState::Draft, "", SheetData::blank(10), QUIET);
        let mut data = SheetData::blank(10);
        sync.on_mutation(data.clone());
        data.comprehensive_data.customer_name = "Acme".into();
        sync.on_mutation(data.clone());
        sync.on_mutation(with_text(&data, 1, "   "));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.create_count(), 0);
        assert_eq!(store.update_count(), 0);
        assert!(sync.record_state().is_draft());
    }

    #[tokio::test(start_paused = true)]
    async fn first_content_creates_exactly_once() {
        let store = Arc::new(MockStore { create_delay: Duration::from_millis(300), ..Default::default() });
        let sync = PersistenceSync::new(Arc::clone(&store), RecordState::Draft, "  ", SheetData::blank(10), QUIET);
        let base = SheetData::blank(10);

        sync.on_mutation(with_text(&base, 0, "x"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sync.on_mutation(with_text(&base, 0, "xy"));
        let racing = sync.ensure_persisted();
        tokio::time::sleep(Duration::from_millis(100)).await;
        sync.on_mutation(with_text(&base, 0, "xyz"));

        assert_eq!(racing.await.unwrap(), RecordId::from("new-1"));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(store.create_count(), 1);
        let (title, created) = store.creates.lock().unwrap()[0].clone();
        assert_eq!(title, "Untitled");
        assert_eq!(created, with_text(&base, 0, "x"));
        assert_eq!(sync.record_state(), RecordState::Persisted(RecordId::from("new-1")));

        // Edits made while the create was in flight follow as one save.
        assert_eq!(store.update_count(), 1);
        assert_eq!(store.last_update().unwrap().data.unwrap(), with_text(&base, 0, "xyz"));
    }

    #[tokio::test(start_paused = true)]
    async fn title_skipped_while_draft() {
        let store = Arc::new(MockStore::default());
        let sync = PersistenceSync::new(Arc::clone(&store), RecordState::Draft, "", SheetData::blank(10), QUIET);
        assert!(sync.commit_title("Spring order").await.unwrap().is_none());
        assert_eq!(store.update_count(), 0);

        sync.on_mutation(with_text(&SheetData::blank(10), 0, "part"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.creates.lock().unwrap()[0].0, "Spring order");
    }

    #[tokio::test(start_paused = true)]
    async fn title_commits_immediately_when_persisted() {
        let store = Arc::new(MockStore::default());
        let sync = persisted(&store);
        sync.on_mutation(with_text(&SheetData::blank(10), 0, "a"));
        let record = sync.commit_title(" Renamed ").await.unwrap().unwrap();
        assert_eq!(record.title, "Renamed");
        let patch = store.last_update().unwrap();
        assert_eq!(patch.title.as_deref(), Some("Renamed"));
        assert!(patch.data.is_none());
        assert!(sync.has_pending_save());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_save() {
        let store = Arc::new(MockStore::default());
        let sync = persisted(&store);
        sync.on_mutation(with_text(&SheetData::blank(10), 0, "late"));
        drop(sync);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_flushes_and_cancels_timer() {
        let store = Arc::new(MockStore::default());
        let sync = persisted(&store);
        sync.on_mutation(with_text(&SheetData::blank(10), 0, "now"));
        sync.save_now().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.update_count(), 1);
        let patch = store.last_update().unwrap();
        assert_eq!(patch.title.as_deref(), Some("Order"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_record_is_terminal() {
        let store = Arc::new(MockStore { missing: true, ..Default::default() });
        let sync = persisted(&store);
        let err = sync.commit_title("x").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(id) if id.as_str() == "abc"));

        sync.on_mutation(with_text(&SheetData::blank(10), 0, "a"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!sync.has_pending_save());
    }
}
