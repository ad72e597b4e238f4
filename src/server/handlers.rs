//! HTTP request handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::AppState;
use crate::error::Error;
use crate::vfs::{ListMode, VirtualListing};

/// Handle GET /list/<path>.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<VirtualListing>, AppError> {
    list_impl(&state, &path, ListMode::All).await
}

/// Handle GET /list/ (the root).
pub async fn list_root(State(state): State<Arc<AppState>>) -> Result<Json<VirtualListing>, AppError> {
    list_impl(&state, "", ListMode::All).await
}

/// Handle GET /listimg/<path>: image files only, no directories.
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<VirtualListing>, AppError> {
    list_impl(&state, &path, ListMode::ImagesOnly).await
}

/// Handle GET /listimg/ (the root).
pub async fn list_images_root(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VirtualListing>, AppError> {
    list_impl(&state, "", ListMode::ImagesOnly).await
}

async fn list_impl(state: &AppState, path: &str, mode: ListMode) -> Result<Json<VirtualListing>, AppError> {
    tracing::debug!("Handling {:?} list request for '{}'", mode, path);
    let listing = state.vfs.list(path, mode).await?;
    Ok(Json(listing))
}

/// Handle GET /archive_file/<archive>//<entry>.
///
/// The body is streamed; a read failure after the headers went out
/// truncates the response.
pub async fn archive_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    tracing::debug!("Handling archive file request for '{}'", path);

    let (reader, entry) = state.vfs.open_archive_file(&path).await?;
    let content_type = mime_guess::from_path(&entry).first_or_octet_stream();

    Ok((
        [(header::CONTENT_TYPE, content_type.to_string())],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}

/// Handle GET /: the landing page.
pub async fn index(State(state): State<Arc<AppState>>) -> Response {
    match tokio::fs::read_to_string(&state.index).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            tracing::warn!("Cannot read index page {:?}: {}", state.index, e);
            (StatusCode::NOT_FOUND, "index page not found").into_response()
        }
    }
}

/// Every browsing failure is reported as a server error with the message as body.
#[derive(Debug)]
pub struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!("Request failed: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArchiveCache;
    use crate::resolver::PathResolver;
    use crate::vfs::{ImageFilter, VirtualFs};

    fn state_for(root: &std::path::Path) -> Arc<AppState> {
        let vfs = VirtualFs::new(
            PathResolver::new(root),
            Arc::new(ArchiveCache::default()),
            ImageFilter::default(),
        );
        Arc::new(AppState::new(vfs, root.join("index.html")))
    }

    #[tokio::test]
    async fn list_root_returns_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"").unwrap();

        let Json(listing) = list_root(State(state_for(dir.path()))).await.unwrap();
        assert_eq!(listing.files, vec!["a.png"]);
    }

    #[tokio::test]
    async fn plain_path_is_not_an_archive_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = archive_file(State(state_for(dir.path())), Path("a.png".to_string())).await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn missing_index_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let response = index(State(state_for(dir.path()))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
