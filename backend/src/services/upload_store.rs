use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

const ALLOWED_EXTENSIONS: [&str; 1] = ["csv"];

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file selected")]
    NoFile,
    #[error("Unsupported file type, please upload a CSV file")]
    UnsupportedType,
    #[error("File not found")]
    NotFound,
    #[error("Failed to store upload: {0}")]
    Io(#[from] io::Error),
}

/// Directory holding uploaded files between `/upload` and `/import`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Writes `bytes` under a sanitized version of `original_name` and
    /// returns the stored file name.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        if original_name.is_empty() {
            return Err(UploadError::NoFile);
        }
        if !allowed_file(original_name) {
            return Err(UploadError::UnsupportedType);
        }
        let filename = stored_name(original_name);
        self.ensure_dir().await?;
        tokio::fs::write(self.dir.join(&filename), bytes).await?;
        debug!(original = original_name, stored = %filename, size = bytes.len(), "Stored upload");
        Ok(filename)
    }

    /// Path of a previously stored file. The name is sanitized again, so a
    /// caller cannot step outside the upload directory.
    pub async fn locate(&self, filename: &str) -> Result<PathBuf, UploadError> {
        let clean = sanitize_filename(filename);
        if clean.is_empty() {
            return Err(UploadError::NotFound);
        }
        let path = self.dir.join(clean);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(UploadError::NotFound),
        }
    }
}

/// Removes the uploaded file when dropped.
#[derive(Debug)]
pub struct UploadGuard {
    path: PathBuf,
}

impl UploadGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed uploaded file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove uploaded file"),
        }
    }
}

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Reduces a client supplied name to ASCII letters, digits, `_`, `.` and `-`.
/// Accented letters keep their base letter (NFKD). Whitespace runs and path separators become a single `_`; leading and
/// trailing `.` and `_` are stripped.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

fn stored_name(original_name: &str) -> String {
    let clean = sanitize_filename(original_name);
    if allowed_file(&clean) && clean.len() > ".csv".len() {
        clean
    } else {
        format!("upload-{}.csv", Uuid::new_v4())
    }
}
