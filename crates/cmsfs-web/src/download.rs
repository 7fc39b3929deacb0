use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use cmsfs_core::BinaryResponse;
use tokio_util::io::ReaderStream;

use crate::error::AppError;

/// Streams the file behind a [`BinaryResponse`] with its download headers.
pub async fn stream_attachment(resp: BinaryResponse) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(&resp.path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound(format!("File not found: {}", resp.filename))
        } else {
            AppError::Internal(format!("Failed to open {}: {e}", resp.path.display()))
        }
    })?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut builder = Response::builder().status(StatusCode::OK);
    for (name, value) in resp.headers() {
        builder = builder.header(name, value);
    }
    builder
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {e}")))
}
