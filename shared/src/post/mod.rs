pub mod handle;

use serde::{Deserialize, Serialize};

/// Represents a media item posted to the board.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// The only id of this post, derived from its creation time in milliseconds.
    pub id: u64,
    /// Kind of the backing file, fixed at creation.
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Public path of the stored file, e.g. `/uploads/1700000000000-42.jpg`.
    pub url: String,
    pub title: String,
    pub description: String,
    /// Calendar date as sent by the client, `YYYY-MM-DD` when defaulted.
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Serialized as `null` when absent.
    #[serde(rename = "externalLink", default)]
    pub external_link: Option<String>,
}

/// Describes what kind of media a post carries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Derives the kind from a declared MIME type.
    ///
    /// Anything whose top-level type is not `image` counts as a video.
    pub fn from_mime(mime: &str) -> Self {
        let top = mime.split('/').next().unwrap_or_default().trim();
        if top.eq_ignore_ascii_case("image") {
            Self::Image
        } else {
            Self::Video
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}
