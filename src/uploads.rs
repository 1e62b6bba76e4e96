//! Pasted images written under a public upload directory.

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::info;
use regex::Regex;
use uuid::Uuid;

use crate::clipboard::is_image_mime;
use crate::remote::{BlobStore, UploadError};

lazy_static! {
    static ref UNSAFE_SCOPE_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
}

pub const DEFAULT_SCOPE: &str = "common";

/// Strips everything but `[A-Za-z0-9_-]`; empty results map to `common`.
pub fn sanitize_scope(scope: &str) -> String {
    let clean = UNSAFE_SCOPE_CHARS.replace_all(scope, "");
    if clean.is_empty() { DEFAULT_SCOPE.to_string() } else { clean.into_owned() }
}

pub fn ext_from_mime(mime: &str) -> &'static str {
    let base = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match base.as_str() {
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/png" => ".png",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        "image/bmp" => ".bmp",
        "image/svg+xml" => ".svg",
        "image/tiff" => ".tiff",
        "image/heic" => ".heic",
        "image/heif" => ".heif",
        _ => ".bin",
    }
}

/// Checks an upload before anything touches the disk.
pub fn validate_upload(bytes: &[u8], mime: &str) -> Result<(), UploadError> {
    if !is_image_mime(mime) {
        return Err(UploadError::UnsupportedType(mime.to_string()));
    }
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    Ok(())
}

/// Files land in `<root>/<scope>/<uuid><ext>` and are served from
/// `/uploads/<scope>/<uuid><ext>`.
#[derive(Clone, Debug)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        UploadDir { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for UploadDir {
    async fn upload(&self, bytes: Vec<u8>, mime: &str, scope: &str) -> Result<String, UploadError> {
        validate_upload(&bytes, mime)?;
        let scope = sanitize_scope(scope);
        let dir = self.root.join(&scope);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{}{}", Uuid::new_v4(), ext_from_mime(mime));
        tokio::fs::write(dir.join(&file_name), &bytes).await?;
        info!("stored {} byte upload as {}/{}", bytes.len(), scope, file_name);
        Ok(format!("/uploads/{}/{}", scope, file_name))
    }
}
