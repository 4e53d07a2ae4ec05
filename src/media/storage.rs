use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;

pub const PUBLIC_PREFIX: &str = "/uploads/";
const REFERENCE_DIR: &str = "reference";
const BRAND_DIR: &str = "brands";
const EXTRACTED_TEXT_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Document,
    Other,
    Unknown,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Document => "document",
            FileKind::Other => "other",
            FileKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("No file provided")]
    MissingFile,
    #[error("File type not allowed. Allowed types: {0}")]
    NotAllowed(String),
    #[error("File too large. Maximum size: {0}MB")]
    TooLarge(u64),
    #[error("File content does not match its '.{0}' extension")]
    ContentMismatch(String),
}

pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Extension and size rules for uploaded files.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub image_types: Vec<String>,
    pub document_types: Vec<String>,
    pub max_file_size_mb: u64,
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image_types: config.allowed_image_types.clone(),
            document_types: config.allowed_document_types.clone(),
            max_file_size_mb: config.max_file_size_mb,
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn all_types(&self) -> Vec<String> {
        self.image_types
            .iter()
            .chain(self.document_types.iter())
            .cloned()
            .collect()
    }

    pub fn file_kind(&self, filename: &str) -> FileKind {
        let Some(ext) = file_extension(filename) else {
            return FileKind::Unknown;
        };
        if self.image_types.contains(&ext) {
            FileKind::Image
        } else if self.document_types.contains(&ext) {
            FileKind::Document
        } else {
            FileKind::Other
        }
    }

    /// Validates name, size and content of an upload restricted to `allowed`
    /// extensions. Returns the lowercase extension on success.
    pub fn check(
        &self,
        filename: &str,
        bytes: &[u8],
        allowed: &[String],
    ) -> Result<String, UploadRejection> {
        let ext = file_extension(filename)
            .filter(|ext| allowed.contains(ext))
            .ok_or_else(|| UploadRejection::NotAllowed(allowed.join(", ")))?;
        if bytes.len() as u64 > self.max_file_size_bytes() {
            return Err(UploadRejection::TooLarge(self.max_file_size_mb));
        }
        if self.image_types.contains(&ext) && !infer::is_image(bytes) {
            return Err(UploadRejection::ContentMismatch(ext));
        }
        Ok(ext)
    }
}

pub fn extract_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(EXTRACTED_TEXT_LIMIT)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub url: String,
}

/// Files on disk under the upload root, addressed publicly as `/uploads/...`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [REFERENCE_DIR, BRAND_DIR] {
            let path = self.root.join(dir);
            fs::create_dir_all(&path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
        }
        Ok(())
    }

    async fn write(&self, relative: String, bytes: &[u8]) -> Result<StoredFile> {
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(StoredFile {
            path,
            url: format!("{PUBLIC_PREFIX}{relative}"),
        })
    }

    pub async fn save_reference(&self, ext: &str, bytes: &[u8]) -> Result<StoredFile> {
        self.write(format!("{REFERENCE_DIR}/{}.{ext}", Uuid::new_v4()), bytes)
            .await
    }

    pub async fn save_logo(&self, brand_id: i64, ext: &str, bytes: &[u8]) -> Result<StoredFile> {
        self.write(
            format!("{BRAND_DIR}/logo_{brand_id}_{}.{ext}", Uuid::new_v4()),
            bytes,
        )
        .await
    }

    /// Maps a public URL back to a path under the root. URLs outside
    /// `/uploads/` or with parent components resolve to nothing.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let relative = Path::new(url.strip_prefix(PUBLIC_PREFIX)?);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Deletes the file behind a public URL. Returns whether a file was removed.
    pub async fn remove_by_url(&self, url: &str) -> bool {
        let Some(path) = self.path_for_url(url) else {
            return false;
        };
        match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to remove upload {}: {err}", path.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::media::analysis::encode_png;

    fn policy() -> UploadPolicy {
        UploadPolicy {
            image_types: vec!["png".into(), "jpg".into()],
            document_types: vec!["txt".into(), "pdf".into()],
            max_file_size_mb: 1,
        }
    }

    #[test]
    fn classifies_by_extension() {
        let policy = policy();
        assert_eq!(policy.file_kind("Logo.PNG"), FileKind::Image);
        assert_eq!(policy.file_kind("brief.txt"), FileKind::Document);
        assert_eq!(policy.file_kind("archive.zip"), FileKind::Other);
        assert_eq!(policy.file_kind("README"), FileKind::Unknown);
    }

    #[test]
    fn rejects_disallowed_oversized_and_mismatched_files() {
        let policy = policy();
        let all = policy.all_types();
        assert_eq!(
            policy.check("virus.exe", b"MZ", &all),
            Err(UploadRejection::NotAllowed("png, jpg, txt, pdf".into()))
        );
        let big = vec![b'a'; 1024 * 1024 + 1];
        assert_eq!(
            policy.check("notes.txt", &big, &all),
            Err(UploadRejection::TooLarge(1))
        );
        assert_eq!(
            policy.check("fake.png", b"just text", &all),
            Err(UploadRejection::ContentMismatch("png".into()))
        );
        assert_eq!(policy.check("notes.TXT", b"hello", &all), Ok("txt".into()));

        let png = encode_png(&RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        assert_eq!(policy.check("logo.png", &png, &policy.image_types), Ok("png".into()));
        assert!(policy.check("notes.txt", b"hi", &policy.image_types).is_err());
    }

    #[test]
    fn extracted_text_is_truncated() {
        let long = "x".repeat(EXTRACTED_TEXT_LIMIT + 50);
        assert_eq!(extract_text(long.as_bytes()).len(), EXTRACTED_TEXT_LIMIT);
    }

    #[tokio::test]
    async fn saves_and_removes_files_by_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        store.ensure_dirs().await.unwrap();

        let stored = store.save_reference("txt", b"hello").await.unwrap();
        assert!(stored.url.starts_with("/uploads/reference/"));
        assert!(stored.url.ends_with(".txt"));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"hello");

        let logo = store.save_logo(7, "png", b"png").await.unwrap();
        assert!(logo.url.starts_with("/uploads/brands/logo_7_"));

        assert!(store.remove_by_url(&stored.url).await);
        assert!(!stored.path.exists());
        assert!(!store.remove_by_url(&stored.url).await);
        assert!(store.path_for_url("/uploads/../secret").is_none());
        assert!(store.path_for_url("https://cdn.example.com/a.png").is_none());
    }
}
