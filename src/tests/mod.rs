mod upload;

use crate::config::{Config, Storage};
use crate::AppState;
use axum::http::{self, Request};
use hyper::Body;
use std::sync::Arc;
use tempfile::TempDir;

const BOUNDARY: &str = "media-posts-test-boundary";

/// A temporary deployment: the directory must outlive the app.
struct TestApp {
    dir: TempDir,
    state: Arc<AppState>,
    app: axum::Router,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_max_upload(50 * 1024 * 1024).await
    }

    async fn with_max_upload(max_upload_size: u64) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: Storage {
                posts: dir.path().join("data/posts.json"),
                uploads: dir.path().join("data/uploads"),
                max_upload_size,
            },
            ..Default::default()
        };

        let state = Arc::new(AppState::open(config).await.unwrap());
        let app = crate::router(state.clone());

        Self { dir, state, app }
    }

    /// Names of every file in the content directory.
    fn uploads(&self) -> Vec<String> {
        std::fs::read_dir(self.dir.path().join("data/uploads"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

/// A hand-built `multipart/form-data` body.
#[derive(Default)]
struct Form {
    body: Vec<u8>,
}

impl Form {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn into_request(mut self) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .uri("/api/posts")
            .method("POST")
            .header(
                http::header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(self.body.into())
            .unwrap()
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&hyper::body::to_bytes(response.into_body()).await.unwrap()).unwrap()
}
