use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};

pub mod config;

pub mod post;
pub mod upload;

/// The module for unit testing, will only be availabled in dev env.
#[cfg(test)]
mod tests;

use config::Config;
use post::PostStore;
use upload::Uploader;

/// Room left in a request body for multipart boundaries and text fields,
/// on top of the upload size limit.
const FORM_ALLOWANCE: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Post(post::Error),
    #[error(transparent)]
    Upload(upload::Error),
    #[error("no file uploaded")]
    MissingFile,
    #[error("malformed multipart body: {0}")]
    Multipart(MultipartError),
    #[error("invalid form: {}", .0.body_text())]
    Form(MultipartRejection),
    #[error("invalid JSON body: {}", .0.body_text())]
    Json(JsonRejection),

    #[error("invalid config {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
    #[error("io error: {0}")]
    Io(std::io::Error),
    #[error("server errored: {0}")]
    Server(hyper::Error),
}

impl Error {
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            Error::Post(err) => err.to_status_code(),
            Error::Upload(err) => err.to_status_code(),
            Error::MissingFile | Error::Multipart(_) | Error::Form(_) | Error::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Config { .. } | Error::Io(_) | Error::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    #[inline]
    fn into_response(self) -> axum::response::Response {
        #[derive(Serialize)]
        struct ErrorInfo {
            error: String,
        }

        let status = self.to_status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        (
            status,
            axum::Json(ErrorInfo {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Implements `From<T>` for [`Error`].
macro_rules! impl_from {
    ($($t:ty => $v:ident),* $(,)?) => {
        $(
            impl From<$t> for $crate::Error {
                #[inline]
                fn from(err: $t) -> Self {
                    Self::$v(err)
                }
            }
        )*
    };
}

impl_from! {
    post::Error => Post,
    upload::Error => Upload,
    MultipartError => Multipart,
    MultipartRejection => Form,
    JsonRejection => Json,
    std::io::Error => Io,
    hyper::Error => Server,
}

/// Everything a request handler needs.
pub struct AppState {
    pub config: Config,
    pub store: PostStore,
    pub uploader: Uploader,
}

impl AppState {
    /// Opens the post store and the content directory named by `config`.
    pub async fn open(config: Config) -> Result<Self, Error> {
        let store = PostStore::open(&config.storage.posts).await?;
        let uploader =
            Uploader::open(&config.storage.uploads, config.storage.max_upload_size).await?;

        Ok(Self {
            config,
            store,
            uploader,
        })
    }
}

/// Construct a router.
pub fn router(state: Arc<AppState>) -> axum::Router {
    let body_limit: usize = state
        .uploader
        .max_size()
        .saturating_add(FORM_ALLOWANCE)
        .try_into()
        .unwrap_or(usize::MAX);

    axum::Router::new()
        .route(
            "/api/posts",
            get(post::handle::list_posts).post(post::handle::create_post),
        )
        .route(
            "/api/posts/:id",
            get(post::handle::get_post)
                .put(post::handle::update_post)
                .delete(post::handle::delete_post),
        )
        // uploaded content
        .nest_service(
            upload::URL_PREFIX,
            tower_http::services::ServeDir::new(state.uploader.dir()),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
