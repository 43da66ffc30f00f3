pub mod handle;

use axum::http::StatusCode;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::upload::{StoredFile, Uploader};

pub use media_posts_shared::post::handle::*;
pub use media_posts_shared::post::*;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("post not found")]
    NotFound,
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("post store unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("post store is not a valid document: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Missing(_) => StatusCode::BAD_REQUEST,
            Error::Io(_) | Error::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The persisted, newest-first list of posts.
///
/// Every operation reloads the whole document from disk and every mutation
/// rewrites it. Mutations of one store are serialized by a lock, so two
/// concurrent requests can't lose each other's writes. Separate stores
/// opened on the same path don't share that lock.
pub struct PostStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PostStore {
    /// Opens the document at `path`, creating an empty one if it doesn't exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if !tokio::fs::try_exists(&path).await? {
            tracing::info!("creating post store at {}", path.display());
            write_document(&path, &[]).await?;
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All posts, newest first.
    pub async fn list_all(&self) -> Result<Vec<Post>, Error> {
        self.load().await
    }

    pub async fn get(&self, id: u64) -> Result<Post, Error> {
        self.load()
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(Error::NotFound)
    }

    /// Validates `descriptor` and prepends a post backed by `file`.
    ///
    /// The store doesn't own `file`: when this errors the caller has to
    /// remove it.
    pub async fn create(
        &self,
        descriptor: CreatePostDescriptor,
        file: &StoredFile,
    ) -> Result<Post, Error> {
        let title = required("title", descriptor.title)?;
        let description = required("description", descriptor.description)?;
        let date = non_blank(descriptor.date)
            .unwrap_or_else(|| Utc::now().date_naive().format("%Y-%m-%d").to_string());

        let _guard = self.lock.lock().await;
        let mut posts = self.load().await?;

        let post = Post {
            id: next_id(&posts),
            kind: MediaKind::from_mime(&file.content_type),
            url: file.url.clone(),
            title,
            description,
            date,
            tags: decode_tags(&descriptor.tags),
            external_link: normalize_link(descriptor.external_link.as_deref()),
        };

        posts.insert(0, post.clone());
        self.persist(&posts).await?;

        tracing::info!("created post {} ({}, {})", post.id, post.kind, post.url);
        Ok(post)
    }

    /// Applies the non-empty fields of `descriptor` to a post.
    pub async fn update(&self, id: u64, descriptor: UpdatePostDescriptor) -> Result<Post, Error> {
        let _guard = self.lock.lock().await;
        let mut posts = self.load().await?;

        let post = posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(Error::NotFound)?;

        if let Some(title) = descriptor.title.filter(|t| !t.trim().is_empty()) {
            post.title = title;
        }
        if let Some(description) = descriptor.description.filter(|d| !d.trim().is_empty()) {
            post.description = description;
        }
        if let Some(date) = descriptor.date.and_then(non_blank) {
            post.date = date;
        }
        if let Some(tags) = descriptor.tags.and_then(supplied_tags) {
            post.tags = tags;
        }
        if let Some(link) = descriptor.external_link {
            post.external_link = normalize_link(link.as_deref());
        }

        let post = post.clone();
        self.persist(&posts).await?;

        Ok(post)
    }

    /// Removes a post and, best-effort, its backing file.
    pub async fn delete(&self, id: u64, uploader: &Uploader) -> Result<Post, Error> {
        let _guard = self.lock.lock().await;
        let mut posts = self.load().await?;

        let index = posts
            .iter()
            .position(|p| p.id == id)
            .ok_or(Error::NotFound)?;

        match uploader.remove(&posts[index].url).await {
            Ok(true) => (),
            Ok(false) => tracing::warn!(
                "file {} of post {} was already missing",
                posts[index].url,
                id
            ),
            Err(err) => tracing::warn!(
                "failed to remove file {} of post {}: {}",
                posts[index].url,
                id,
                err
            ),
        }

        let post = posts.remove(index);
        self.persist(&posts).await?;

        tracing::info!("deleted post {}", id);
        Ok(post)
    }

    async fn load(&self) -> Result<Vec<Post>, Error> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn persist(&self, posts: &[Post]) -> Result<(), Error> {
        write_document(&self.path, posts).await
    }
}

/// Writes the document through a sibling temporary file and a rename.
async fn write_document(path: &Path, posts: &[Post]) -> Result<(), Error> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    tokio::fs::write(&tmp, serde_json::to_vec_pretty(posts)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Millisecond timestamp, bumped past every existing id.
fn next_id(posts: &[Post]) -> u64 {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    match posts.iter().map(|p| p.id).max() {
        Some(max) if max >= now => max + 1,
        _ => now,
    }
}

fn required(field: &'static str, value: String) -> Result<String, Error> {
    if value.trim().is_empty() {
        Err(Error::Missing(field))
    } else {
        Ok(value)
    }
}

/// Trims `value`, blank being no value.
fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Trims an external link, treating a blank value as absent.
pub fn normalize_link(link: Option<&str>) -> Option<String> {
    link.map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
}

/// Decodes the string form of a tag list.
///
/// Accepts a JSON array of strings; anything else is read as
/// comma-separated values. Blank input yields no tags.
pub fn decode_tags(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if let Ok(tags) = serde_json::from_str::<Vec<String>>(raw) {
        return tags;
    }

    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Tags an update should apply, `None` for a blank encoded list.
///
/// A real list is applied as is, even when empty.
fn supplied_tags(input: TagsInput) -> Option<Vec<String>> {
    match input {
        TagsInput::List(tags) => Some(tags),
        TagsInput::Encoded(raw) if raw.trim().is_empty() => None,
        TagsInput::Encoded(raw) => Some(decode_tags(&raw)),
    }
}
