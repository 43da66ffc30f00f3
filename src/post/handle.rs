use super::{CreatePostDescriptor, DeleteResult, Post, UpdatePostDescriptor};
use crate::upload::{StoredFile, Uploader};
use crate::{AppState, Error};
use axum::extract::{multipart::MultipartRejection, rejection::JsonRejection};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

/// Parses an id path segment, anything non-numeric can't match a post.
fn parse_id(raw: &str) -> Result<u64, Error> {
    raw.parse::<u64>().map_err(|_| super::Error::NotFound.into())
}

pub async fn list_posts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Post>>, Error> {
    Ok(Json(state.store.list_all().await?))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Post>, Error> {
    Ok(Json(state.store.get(parse_id(&id)?).await?))
}

/// Store the uploaded file and create a post for it.
///
/// The stored file is removed again if the form turns out to be invalid.
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Post>), Error> {
    let multipart = multipart?;
    let mut descriptor = CreatePostDescriptor::default();
    let mut stored = None;

    let read = read_form(multipart, &state.uploader, &mut descriptor, &mut stored).await;

    let file = match (read, stored) {
        (Ok(()), Some(file)) => file,
        (Ok(()), None) => return Err(Error::MissingFile),
        (Err(err), file) => {
            if let Some(file) = file {
                discard(&state.uploader, &file).await;
            }
            return Err(err);
        }
    };

    match state.store.create(descriptor, &file).await {
        Ok(post) => Ok((StatusCode::CREATED, Json(post))),
        Err(err) => {
            discard(&state.uploader, &file).await;
            Err(err.into())
        }
    }
}

/// Reads every form field, storing the first `file` part through `uploader`.
async fn read_form(
    mut multipart: Multipart,
    uploader: &Uploader,
    descriptor: &mut CreatePostDescriptor,
    stored: &mut Option<StoredFile>,
) -> Result<(), Error> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();

        match name.as_str() {
            "file" if stored.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().unwrap_or_default().to_owned();
                *stored = Some(uploader.accept(&filename, &content_type, field).await?);
            }
            "title" => descriptor.title = field.text().await?,
            "description" => descriptor.description = field.text().await?,
            "date" => descriptor.date = field.text().await?,
            "tags" => descriptor.tags = field.text().await?,
            "externalLink" => descriptor.external_link = Some(field.text().await?),
            _ => (),
        }
    }

    Ok(())
}

async fn discard(uploader: &Uploader, file: &StoredFile) {
    if let Err(err) = uploader.remove(&file.url).await {
        tracing::warn!("failed to remove rejected upload {}: {}", file.name, err);
    }
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    descriptor: Result<Json<UpdatePostDescriptor>, JsonRejection>,
) -> Result<Json<Post>, Error> {
    let id = parse_id(&id)?;
    let Json(descriptor) = descriptor?;
    Ok(Json(state.store.update(id, descriptor).await?))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, Error> {
    state.store.delete(parse_id(&id)?, &state.uploader).await?;

    Ok(Json(DeleteResult {
        message: "Post deleted successfully".to_string(),
    }))
}
