use crate::AppState;
use crate::api::page::UPLOAD_PAGE;
use axum::extract::multipart::Field;
use axum::extract::{Extension, Multipart};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use bytes::BytesMut;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

/// Uploaded bytes hit the disk in writes of exactly this size (the last one
/// may be shorter).
pub const UPLOAD_CHUNK_SIZE: usize = 4096;

const FILE_FIELD: &str = "file";

/// Reduces a client-supplied name to a single safe path component.
/// Returns `None` when nothing usable is left.
pub fn sanitize_upload_name(raw: &str) -> Option<String> {
    let cleaned = sanitize_filename::sanitize(raw);
    let cleaned = cleaned
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_end();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

pub async fn upload_page() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}

pub async fn upload_file(
    Extension(state): Extension<AppState>,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return (StatusCode::BAD_REQUEST, "No file part").into_response(),
            Err(error) => {
                warn!(?error, "Malformed multipart body");
                return (error.status(), error.body_text()).into_response();
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // a browser sends an empty filename when nothing was picked
        let raw_name = field.file_name().unwrap_or_default().to_string();
        if raw_name.is_empty() {
            return (StatusCode::BAD_REQUEST, "No selected file").into_response();
        }
        let Some(name) = sanitize_upload_name(&raw_name) else {
            warn!(%raw_name, "Upload filename sanitized to nothing");
            return (StatusCode::BAD_REQUEST, "Invalid filename").into_response();
        };

        info!(%raw_name, %name, "Receiving upload");
        return match store_field(field, state.workspace(), &name).await {
            Ok((_, size)) => {
                info!(%name, size, "Upload stored");
                (StatusCode::OK, format!("Uploaded: {name}")).into_response()
            }
            Err(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error saving file: {error}"),
            )
                .into_response(),
        };
    }
}

/// Saves `field` as `dir/name`, overwriting any existing file. A partially
/// written file is removed when saving fails.
pub(crate) async fn store_field(
    field: Field<'_>,
    dir: &Path,
    name: &str,
) -> std::io::Result<(PathBuf, u64)> {
    let dst = dir.join(name);
    match save_field(field, &dst).await {
        Ok(size) => Ok((dst, size)),
        Err(error) => {
            error!(dst = %dst.display(), ?error, "Failed to store upload");
            if let Err(cleanup) = tokio::fs::remove_file(&dst).await {
                debug!(dst = %dst.display(), ?cleanup, "Nothing to clean up after failed upload");
            }
            Err(error)
        }
    }
}

/// Streams the field body to `dst`, creating or truncating it.
async fn save_field(mut field: Field<'_>, dst: &Path) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(dst).await?;
    let mut pending = BytesMut::with_capacity(UPLOAD_CHUNK_SIZE * 2);
    let mut total = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(std::io::Error::other)? {
        pending.extend_from_slice(&chunk);
        while pending.len() >= UPLOAD_CHUNK_SIZE {
            let block = pending.split_to(UPLOAD_CHUNK_SIZE);
            file.write_all(&block).await?;
            total += block.len() as u64;
        }
    }

    if !pending.is_empty() {
        file.write_all(&pending).await?;
        total += pending.len() as u64;
    }

    file.flush().await?;
    Ok(total)
}
