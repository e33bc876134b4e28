//! Upload artifact lifecycle: store, replace, delete and read back.
//!
//! Artifacts live at `{root}/{category}/{storage_key}` and are published as
//! `{base_url}/uploads/{category}/{storage_key}`.

use super::config::AppConfig;
use super::error::{UploadError, UploadResult};
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// URL path segment under which every category is published.
pub const PUBLIC_PREFIX: &str = "uploads";

const FALLBACK_BASE_URL: &str = "http://localhost:5000";

/// An incoming file part.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub original_name: String,
    pub mime_type: String,
}

impl Payload {
    pub fn new(bytes: Vec<u8>, original_name: &str, mime_type: &str) -> Self {
        Self {
            bytes,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
        }
    }

    /// Builds a payload whose mime type is inferred from the file name.
    pub fn from_named(bytes: Vec<u8>, original_name: &str) -> Self {
        let mime_type = mime_for_name(original_name);
        Self::new(bytes, original_name, mime_type)
    }
}

/// Scheme and host of the inbound request, used when no base URL is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: &str, host: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
        }
    }

    fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub category: String,
    pub storage_key: String,
    pub public_locator: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub original_name: String,
}

/// Bytes read back from the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

pub struct UploadArtifactManager {
    root: PathBuf,
    base_url: Option<String>,
}

impl UploadArtifactManager {
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(config.upload_root()?, config.upload_base_url()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn base_url_for(&self, origin: Option<&RequestOrigin>) -> String {
        match (&self.base_url, origin) {
            (Some(base_url), _) => base_url.clone(),
            (None, Some(origin)) => origin.base_url(),
            (None, None) => FALLBACK_BASE_URL.to_string(),
        }
    }

    pub fn locator_for(
        &self,
        category: &str,
        storage_key: &str,
        origin: Option<&RequestOrigin>,
    ) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url_for(origin),
            PUBLIC_PREFIX,
            category,
            storage_key
        )
    }

    /// Persists `payload` under a fresh storage key in `category`.
    ///
    /// The file is created exclusively and its size checked after the write;
    /// on any failure the partial file is removed before the error surfaces.
    pub async fn store(
        &self,
        payload: &Payload,
        category: &str,
        origin: Option<&RequestOrigin>,
    ) -> UploadResult<Artifact> {
        validate_category(category)?;
        let dir = self.root.join(category);
        let storage_key = generate_storage_key(&payload.original_name);

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| write_error(&storage_key, e))?;

        let path = dir.join(&storage_key);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| write_error(&storage_key, e))?;

        let written = async {
            file.write_all(&payload.bytes).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            discard(&path).await;
            return Err(write_error(&storage_key, e));
        }

        let size_bytes = match fs::metadata(&path).await {
            Ok(meta) if meta.len() == payload.bytes.len() as u64 => meta.len(),
            Ok(meta) => {
                discard(&path).await;
                return Err(UploadError::StorageWrite {
                    key: storage_key,
                    reason: format!(
                        "size mismatch: expected {} bytes, found {}",
                        payload.bytes.len(),
                        meta.len()
                    ),
                });
            }
            Err(e) => {
                discard(&path).await;
                return Err(write_error(&storage_key, e));
            }
        };

        let artifact = Artifact {
            category: category.to_string(),
            public_locator: self.locator_for(category, &storage_key, origin),
            storage_key,
            size_bytes,
            mime_type: payload.mime_type.clone(),
            original_name: payload.original_name.clone(),
        };
        info!(
            category,
            key = %artifact.storage_key,
            size = artifact.size_bytes,
            mime = %artifact.mime_type,
            "Artifact stored"
        );
        Ok(artifact)
    }

    /// Stores the replacement first, then retires the previous artifact.
    ///
    /// Failing to delete the old file never fails the replace.
    pub async fn replace(
        &self,
        existing_locator: Option<&str>,
        payload: &Payload,
        category: &str,
        origin: Option<&RequestOrigin>,
    ) -> UploadResult<Artifact> {
        let artifact = self.store(payload, category, origin).await?;

        if let Some(locator) = existing_locator.filter(|l| !l.trim().is_empty()) {
            match self.remove(locator, category).await {
                Ok(()) => debug!(%locator, "Previous artifact deleted"),
                Err(e) => warn!(
                    %locator,
                    error = %e,
                    "Could not delete previous artifact (may not exist)"
                ),
            }
        }
        Ok(artifact)
    }

    /// Best-effort delete. Missing artifacts and I/O failures are logged only;
    /// an invalid category or locator is still an error.
    pub async fn delete(&self, locator: &str, category: &str) -> UploadResult<()> {
        match self.remove(locator, category).await {
            Ok(()) => info!(%locator, category, "Artifact deleted"),
            Err(UploadError::NotFound(key)) => debug!(%key, "Artifact already gone"),
            Err(e @ UploadError::Io { .. }) => {
                warn!(%locator, error = %e, "Failed to delete artifact")
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Removes the artifact behind `locator`, reporting a missing file as
    /// [`UploadError::NotFound`].
    pub async fn remove(&self, locator: &str, category: &str) -> UploadResult<()> {
        validate_category(category)?;
        let key = resolve_storage_key(locator)?;
        let path = self.root.join(category).join(&key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(UploadError::NotFound(key)),
            Err(e) => Err(UploadError::Io { key, source: e }),
        }
    }

    pub async fn retrieve(&self, locator: &str, category: &str) -> UploadResult<Retrieved> {
        validate_category(category)?;
        let key = resolve_storage_key(locator)?;
        let path = self.root.join(category).join(&key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Retrieved {
                bytes,
                mime_type: mime_for_name(&key).to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(UploadError::NotFound(key)),
            Err(e) => Err(UploadError::Io { key, source: e }),
        }
    }

    /// Stores `payload` and hands the artifact to `persist`, the owner-record
    /// write. When that write fails the new artifact is deleted again.
    pub async fn store_with_owner<T, F, Fut>(
        &self,
        payload: &Payload,
        category: &str,
        origin: Option<&RequestOrigin>,
        persist: F,
    ) -> Result<T>
    where
        F: FnOnce(Artifact) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let artifact = self.store(payload, category, origin).await?;
        let locator = artifact.public_locator.clone();

        match persist(artifact).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(%locator, error = %e, "Owner write failed, cleaning up artifact");
                if let Err(cleanup) = self.delete(&locator, category).await {
                    warn!(%locator, error = %cleanup, "Could not clean up artifact");
                }
                Err(e)
            }
        }
    }
}

fn write_error(key: &str, e: std::io::Error) -> UploadError {
    UploadError::StorageWrite {
        key: key.to_string(),
        reason: e.to_string(),
    }
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Cleaned up partial artifact"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to clean up partial artifact"),
    }
}

fn is_safe_segment(segment: &str, allow_dot: bool) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || (allow_dot && c == '.'))
}

pub fn validate_category(category: &str) -> UploadResult<()> {
    let lowercase = category.chars().all(|c| !c.is_ascii_uppercase());
    if lowercase && is_safe_segment(category, false) {
        Ok(())
    } else {
        Err(UploadError::InvalidCategory(category.to_string()))
    }
}

/// Time-ordered, collision-resistant key that keeps the original extension.
pub fn generate_storage_key(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        Uuid::now_v7().simple(),
        extension
    )
}

/// Extracts the storage key from a locator.
///
/// Accepts absolute URLs under any host (configured base URL or a historical
/// request origin) as well as relative paths like `uploads/carousel/x.jpg`.
pub fn resolve_storage_key(locator: &str) -> UploadResult<String> {
    let invalid = || UploadError::InvalidLocator(locator.to_string());
    let trimmed = locator.trim();

    let path = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        match Url::parse(trimmed) {
            Ok(url) => url.path().to_string(),
            Err(_) => {
                let rest = trimmed.split_once("://").map(|(_, rest)| rest).unwrap_or("");
                rest.split_once('/')
                    .map(|(_, path)| path.to_string())
                    .unwrap_or_default()
            }
        }
    } else {
        trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    };

    let key = path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .ok_or_else(invalid)?;
    if !is_safe_segment(key, true) {
        return Err(invalid());
    }
    Ok(key.to_string())
}

pub fn mime_for_name(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
