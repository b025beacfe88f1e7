//! `POST /upload`: stores a multipart `file` field and answers with the URL
//! it is served under.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file data received.")]
    NoFile,

    #[error("File is too large.")]
    TooLarge,

    #[error("Malformed upload: {0}")]
    Malformed(String),

    #[error("Failed to upload file.")]
    Io(#[from] std::io::Error),
}

impl From<MultipartError> for UploadError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge
        } else {
            Self::Malformed(e.body_text())
        }
    }
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoFile | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        if let Self::Io(e) = &self {
            error!("Upload write failed: {e}");
        }
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub message: String,
}

/// Where uploaded files land on disk.
#[derive(Debug, Clone)]
pub struct UploadStore {
    inner: Arc<UploadInner>,
}

#[derive(Debug)]
struct UploadInner {
    dir: PathBuf,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(UploadInner {
                dir: dir.into(),
                max_bytes,
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.inner.max_bytes
    }

    /// Writes `bytes` under a fresh name and returns its public URL.
    pub async fn store(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String, UploadError> {
        let name = generated_name(original_name);
        tokio::fs::create_dir_all(&self.inner.dir).await?;
        tokio::fs::write(self.inner.dir.join(&name), bytes).await?;
        Ok(format!("/uploads/{name}"))
    }
}

/// `upload_<millis>_<6 chars><.ext>`. The client file name only contributes
/// a short alphanumeric extension.
fn generated_name(original_name: Option<&str>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let ext = original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("upload_{}_{}{}", Utc::now().timestamp_millis(), &suffix[..6], ext)
}

pub async fn upload_file(
    State(uploads): State<UploadStore>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(UploadError::NoFile);
        }

        let url = uploads.store(original_name.as_deref(), &bytes).await?;
        info!(url = %url, size = bytes.len(), "File uploaded");

        return Ok(Json(UploadResponse {
            url,
            message: "File uploaded successfully".to_string(),
        }));
    }

    Err(UploadError::NoFile)
}
