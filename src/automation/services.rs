//! Collaborators the runner drives: screen capture, UI input, post sources
//! and text storage. Platform-specific implementations live outside this
//! crate; the file-backed ones here cover storage and recorded payloads.

use super::error::ServiceError;
use super::types::Post;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const MAX_NAME_ATTEMPTS: u32 = 1000;

#[allow(async_fn_in_trait)]
pub trait ScreenCaptureService {
    /// Capture the screen to an image file and return its path
    async fn capture(&self) -> Result<PathBuf, ServiceError>;
}

#[allow(async_fn_in_trait)]
pub trait UiActionService {
    async fn move_and_double_click(&self, x: u32, y: u32) -> Result<(), ServiceError>;
    async fn send_keys(&self, sequence: &str) -> Result<(), ServiceError>;
    /// Bring the first window with this exact title to the front; false if none exists
    async fn activate_window_by_title(&self, title: &str) -> bool;
}

#[allow(async_fn_in_trait)]
pub trait PostSource {
    async fn fetch_posts(&self, limit: usize) -> Result<Vec<Post>, ServiceError>;
}

#[allow(async_fn_in_trait)]
pub trait TextStore {
    /// Persist `content` at `path`, or at a suffixed sibling if `path` exists.
    /// Returns the path actually written.
    async fn save_text(&self, path: &Path, content: &str) -> Result<PathBuf, ServiceError>;
}

/// Decode a JSON array of posts and keep the first `limit`
pub fn parse_posts_json(text: &str, limit: usize) -> Result<Vec<Post>, ServiceError> {
    let mut posts: Vec<Post> = serde_json::from_str(text.trim())?;
    posts.truncate(limit);
    Ok(posts)
}

/// Tries `primary` first and falls back to `fallback` on any error
pub struct FallbackPostSource<P, F> {
    primary: P,
    fallback: F,
}

impl<P: PostSource, F: PostSource> FallbackPostSource<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: PostSource, F: PostSource> PostSource for FallbackPostSource<P, F> {
    async fn fetch_posts(&self, limit: usize) -> Result<Vec<Post>, ServiceError> {
        match self.primary.fetch_posts(limit).await {
            Ok(posts) => Ok(posts),
            Err(e) => {
                log::warn!("⚠️ Primary post source failed ({e}), using fallback");
                self.fallback.fetch_posts(limit).await
            }
        }
    }
}

/// Posts from a JSON file, e.g. a payload saved from a browser session
#[derive(Debug, Clone)]
pub struct JsonFilePostSource {
    path: PathBuf,
}

impl JsonFilePostSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PostSource for JsonFilePostSource {
    async fn fetch_posts(&self, limit: usize) -> Result<Vec<Post>, ServiceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ServiceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let posts = parse_posts_json(&text, limit)?;
        log::debug!("📄 {} posts read from {}", posts.len(), self.path.display());
        Ok(posts)
    }
}

/// Local filesystem store. Never overwrites: `post_1.txt` becomes
/// `post_1_1.txt`, `post_1_2.txt`, ... when taken.
#[derive(Debug, Clone, Default)]
pub struct FsTextStore;

impl FsTextStore {
    fn candidate(path: &Path, attempt: u32) -> PathBuf {
        if attempt == 0 {
            return path.to_path_buf();
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!("{stem}_{attempt}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{attempt}"),
        };
        path.with_file_name(name)
    }
}

impl TextStore for FsTextStore {
    async fn save_text(&self, path: &Path, content: &str) -> Result<PathBuf, ServiceError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ServiceError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let target = Self::candidate(path, attempt);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(ServiceError::Io { path: target, source }),
            };

            file.write_all(content.as_bytes())
                .await
                .map_err(|source| ServiceError::Io {
                    path: target.clone(),
                    source,
                })?;
            file.flush().await.map_err(|source| ServiceError::Io {
                path: target.clone(),
                source,
            })?;

            log::debug!("💾 Saved {} bytes to {}", content.len(), target.display());
            return Ok(target);
        }

        Err(ServiceError::NameExhausted {
            path: path.to_path_buf(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }
}
