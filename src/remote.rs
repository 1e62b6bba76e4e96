//! Collaborator interfaces for the record store and blob storage.
//!
//! The editor core only sees these traits. [`crate::store::SqliteStore`] and
//! [`crate::uploads::UploadDir`] are the bundled implementations; tests
//! substitute in-memory fakes.

use std::future::Future;

use crate::record::{RecordId, SheetData, SheetPatch, SheetRecord, SheetSummary};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sheet {0} not found")]
    NotFound(RecordId),
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("unsupported content type `{0}`, expected image/*")]
    UnsupportedType(String),
    #[error("empty upload body")]
    Empty,
    #[error("upload i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload failed: {0}")]
    Failed(String),
}

/// Record persistence addressed by id.
pub trait SheetStore: Send + Sync + 'static {
    /// Most recently updated first.
    fn list(&self, limit: usize) -> impl Future<Output = Result<Vec<SheetSummary>, StoreError>> + Send;

    /// Case-insensitive title substring match.
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SheetSummary>, StoreError>> + Send;

    fn create(
        &self,
        title: &str,
        data: &SheetData,
    ) -> impl Future<Output = Result<SheetRecord, StoreError>> + Send;

    fn get(&self, id: &RecordId) -> impl Future<Output = Result<SheetRecord, StoreError>> + Send;

    fn update(
        &self,
        id: &RecordId,
        patch: SheetPatch,
    ) -> impl Future<Output = Result<SheetRecord, StoreError>> + Send;
}

/// Image storage scoped by record id.
pub trait BlobStore: Send + Sync + 'static {
    /// Stores `bytes` and returns a URL the grid can reference.
    fn upload(
        &self,
        bytes: Vec<u8>,
        mime: &str,
        scope: &str,
    ) -> impl Future<Output = Result<String, UploadError>> + Send;
}
