use serde::Deserialize;
use std::{net::SocketAddr, path::PathBuf};

/// Environment variable overriding the config file location.
pub const PATH_VAR: &str = "MEDIA_POSTS_CONFIG";
const DEFAULT_PATH: &str = "./data/config.toml";

/// Describing the server configuration.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Socket the server listens on.
    pub address: SocketAddr,
    pub storage: Storage,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 5000)),
            storage: Storage::default(),
        }
    }
}

/// Describing where posts and their files live.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Storage {
    /// The JSON document holding every post.
    pub posts: PathBuf,
    /// The content directory holding uploaded files.
    pub uploads: PathBuf,
    /// Largest accepted upload in bytes.
    pub max_upload_size: u64,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            posts: PathBuf::from("./data/posts.json"),
            uploads: PathBuf::from("./data/uploads"),
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads the config from `path`, falling back to defaults if the file
    /// doesn't exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, crate::Error> {
        let path = path.into();

        match std::fs::read_to_string(&path) {
            Ok(string) => toml::from_str(&string).map_err(|err| crate::Error::Config {
                path,
                reason: err.to_string(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("config {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(crate::Error::Config {
                path,
                reason: err.to_string(),
            }),
        }
    }

    /// Reads the config from the location named by [`PATH_VAR`], or the default one.
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::load(std::env::var_os(PATH_VAR).unwrap_or_else(|| DEFAULT_PATH.into()))
    }
}
