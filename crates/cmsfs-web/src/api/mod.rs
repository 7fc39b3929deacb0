pub mod files;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files", delete(files::delete_file))
        .route("/files/info", get(files::file_info))
        .route(
            "/files/content",
            get(files::read_content).put(files::write_content),
        )
        .route("/files/append", post(files::append_content))
        .route("/files/prepend", post(files::prepend_content))
        .route("/files/truncate", post(files::truncate_file))
        .route("/files/rename", post(files::rename_file))
        .route("/files/copy", post(files::copy_file))
        .route("/files/resize", post(files::resize_image))
        .route("/files/download", get(files::download))
}
