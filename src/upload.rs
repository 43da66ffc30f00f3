use axum::body::Bytes;
use axum::http::StatusCode;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use media_posts_shared::post::MediaKind;
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Public path prefix the content directory is served under.
pub const URL_PREFIX: &str = "/uploads";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("file extension \"{0}\" is not allowed, only images and videos are accepted")]
    Extension(String),
    #[error("content type \"{0}\" is not allowed, only images and videos are accepted")]
    ContentType(String),
    #[error("content type \"{content_type}\" doesn't match a .{extension} file")]
    KindMismatch {
        extension: String,
        content_type: String,
    },
    #[error("file too large, max {0} bytes")]
    TooLarge(u64),
    #[error("upload interrupted: {0}")]
    Interrupted(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// One accepted file type.
struct Capability {
    extension: &'static str,
    kind: MediaKind,
    content_types: &'static [&'static str],
}

const CAPABILITIES: &[Capability] = &[
    Capability {
        extension: "jpeg",
        kind: MediaKind::Image,
        content_types: &["image/jpeg"],
    },
    Capability {
        extension: "jpg",
        kind: MediaKind::Image,
        content_types: &["image/jpeg"],
    },
    Capability {
        extension: "png",
        kind: MediaKind::Image,
        content_types: &["image/png"],
    },
    Capability {
        extension: "gif",
        kind: MediaKind::Image,
        content_types: &["image/gif"],
    },
    Capability {
        extension: "webp",
        kind: MediaKind::Image,
        content_types: &["image/webp"],
    },
    Capability {
        extension: "mp4",
        kind: MediaKind::Video,
        content_types: &["video/mp4"],
    },
    Capability {
        extension: "mov",
        kind: MediaKind::Video,
        content_types: &["video/quicktime"],
    },
    Capability {
        extension: "avi",
        kind: MediaKind::Video,
        content_types: &["video/x-msvideo", "video/avi"],
    },
    Capability {
        extension: "webm",
        kind: MediaKind::Video,
        content_types: &["video/webm"],
    },
];

/// Checks a declared filename and content type against the capability table,
/// returning the original extension on success.
pub fn check(filename: &str, content_type: &str) -> Result<String, Error> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let capability = CAPABILITIES
        .iter()
        .find(|c| c.extension.eq_ignore_ascii_case(extension))
        .ok_or_else(|| Error::Extension(extension.to_owned()))?;

    let essence = content_type
        .parse::<mime::Mime>()
        .map(|m| m.essence_str().to_ascii_lowercase())
        .map_err(|_| Error::ContentType(content_type.to_owned()))?;

    if !CAPABILITIES
        .iter()
        .any(|c| c.content_types.contains(&essence.as_str()))
    {
        return Err(Error::ContentType(content_type.to_owned()));
    }

    if MediaKind::from_mime(&essence) != capability.kind {
        return Err(Error::KindMismatch {
            extension: extension.to_owned(),
            content_type: content_type.to_owned(),
        });
    }

    Ok(extension.to_owned())
}

/// A file persisted in the content directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Generated file name, `<millis>-<random>.<extension>`.
    pub name: String,
    /// Public path, see [`URL_PREFIX`].
    pub url: String,
    pub content_type: String,
    pub size: u64,
}

/// Persists uploads into the content directory.
pub struct Uploader {
    dir: PathBuf,
    max_size: u64,
}

impl Uploader {
    /// Creates an uploader, creating the content directory if missing.
    pub async fn open(dir: impl Into<PathBuf>, max_size: u64) -> Result<Self, std::io::Error> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir, max_size })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Validates and stores a file read from `chunks`.
    ///
    /// Nothing is written if validation fails, and a partially written
    /// file is removed if the stream errors or exceeds the size limit.
    pub async fn accept<S, E>(
        &self,
        filename: &str,
        content_type: &str,
        chunks: S,
    ) -> Result<StoredFile, Error>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let extension = check(filename, content_type)?;

        let name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            rand::thread_rng().gen_range(0..1_000_000_000u32),
            extension
        );
        let path = self.dir.join(&name);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        match write_limited(&mut file, chunks, self.max_size).await {
            Ok(size) => {
                tracing::debug!("stored upload {} ({} bytes)", name, size);
                Ok(StoredFile {
                    url: format!("{URL_PREFIX}/{name}"),
                    name,
                    content_type: content_type.to_owned(),
                    size,
                })
            }
            Err(err) => {
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("failed to remove partial upload {}: {}", path.display(), rm);
                }
                Err(err)
            }
        }
    }

    /// Removes a stored file by its public url.
    ///
    /// Returns whether a file was removed; a missing file is not an error.
    /// Only the last path component of `url` is used.
    pub async fn remove(&self, url: &str) -> Result<bool, std::io::Error> {
        let Some(name) = Path::new(url).file_name() else {
            return Ok(false);
        };

        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Writes every chunk into `file`, failing once more than `max` bytes arrive.
async fn write_limited<S, E>(file: &mut tokio::fs::File, chunks: S, max: u64) -> Result<u64, Error>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    futures_util::pin_mut!(chunks);
    let mut size = 0u64;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|err| Error::Interrupted(err.to_string()))?;
        size += chunk.len() as u64;
        if size > max {
            return Err(Error::TooLarge(max));
        }
        file.write_all(&chunk).await?;
    }

    file.sync_all().await?;
    Ok(size)
}
