use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cmsfs_core::{File, FileContext};

use crate::download::stream_attachment;
use crate::dto::{
    ConcatRequest, DownloadQuery, FileInfoDto, OpResponse, PathQuery, ResizeRequest,
    ResizeResponse, TransferRequest,
};
use crate::error::AppError;
use crate::state::AppState;

/// Rejects empty, absolute and parent-relative paths.
fn checked_path(raw: &str) -> Result<String, AppError> {
    let path = raw.trim();
    if path.is_empty() {
        return Err(AppError::BadRequest("Missing path".to_string()));
    }
    if path.starts_with(['/', '\\']) || Path::new(path).is_absolute() {
        return Err(AppError::BadRequest(format!("Absolute path not allowed: {path}")));
    }
    // Path traversal protection
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(AppError::BadRequest(format!("Path traversal not allowed: {path}")));
    }
    Ok(path.to_string())
}

/// Rejects `rel` if it resolves outside `root` through a symlink.
///
/// The deepest existing ancestor of the target is canonicalized, so paths
/// that do not exist yet are checked through the directory they would be
/// created in.
fn ensure_within_root(root: &Path, rel: &str) -> Result<(), AppError> {
    let canonical_root = root
        .canonicalize()
        .map_err(|e| AppError::Internal(format!("Failed to resolve root path: {e}")))?;

    let mut candidate = root.join(rel);
    let resolved = loop {
        match candidate.canonicalize() {
            Ok(resolved) => break resolved,
            // A dangling symlink exists but cannot be resolved.
            Err(_) if candidate.symlink_metadata().is_ok() => {
                return Err(AppError::NotFound("Access denied".to_string()));
            }
            Err(_) => {
                if !candidate.pop() {
                    return Err(AppError::NotFound("Access denied".to_string()));
                }
            }
        }
    };

    if !resolved.starts_with(&canonical_root) {
        tracing::warn!("rejected {rel}: resolves outside the root");
        return Err(AppError::NotFound("Access denied".to_string()));
    }
    Ok(())
}

/// Opens a handle on `path` and runs `f` on the blocking pool.
async fn with_file<T, F>(ctx: Arc<FileContext>, path: String, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&mut File) -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        ensure_within_root(ctx.root(), &path)?;
        let mut file = File::new(ctx, &path)?;
        f(&mut file)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Blocking task failed: {e}")))?
}

fn require_existing(file: &File) -> Result<(), AppError> {
    if file.exists() {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("File not found: {}", file.path())))
    }
}

pub async fn file_info(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<FileInfoDto>, AppError> {
    let path = checked_path(&query.path)?;
    let info = with_file(state.ctx.clone(), path, |file| {
        require_existing(file)?;
        Ok(FileInfoDto::from_file(file)?)
    })
    .await?;
    Ok(Json(info))
}

pub async fn read_content(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Response, AppError> {
    let path = checked_path(&query.path)?;
    let (mime, content) = with_file(state.ctx.clone(), path, |file| {
        let content = file.get_content()?;
        Ok((file.mime(), content))
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, mime)], content).into_response())
}

pub async fn write_content(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    body: Bytes,
) -> Result<Json<OpResponse>, AppError> {
    let path = checked_path(&query.path)?;
    let written = with_file(state.ctx.clone(), path, move |file| {
        file.write(body)?;
        file.close()?;
        Ok(file.path().to_string())
    })
    .await?;
    tracing::info!("wrote {written}");
    Ok(Json(OpResponse::ok(written)))
}

pub async fn append_content(
    State(state): State<AppState>,
    Json(req): Json<ConcatRequest>,
) -> Result<Json<OpResponse>, AppError> {
    let path = checked_path(&req.path)?;
    let written = with_file(state.ctx.clone(), path, move |file| {
        file.append(req.content, &req.separator)?;
        file.close()?;
        Ok(file.path().to_string())
    })
    .await?;
    Ok(Json(OpResponse::ok(written)))
}

pub async fn prepend_content(
    State(state): State<AppState>,
    Json(req): Json<ConcatRequest>,
) -> Result<Json<OpResponse>, AppError> {
    let path = checked_path(&req.path)?;
    let written = with_file(state.ctx.clone(), path, move |file| {
        file.prepend(req.content, &req.separator)?;
        file.close()?;
        Ok(file.path().to_string())
    })
    .await?;
    Ok(Json(OpResponse::ok(written)))
}

pub async fn truncate_file(
    State(state): State<AppState>,
    Json(req): Json<PathQuery>,
) -> Result<Json<OpResponse>, AppError> {
    let path = checked_path(&req.path)?;
    let truncated = with_file(state.ctx.clone(), path, |file| {
        require_existing(file)?;
        file.truncate()?;
        file.close()?;
        Ok(file.path().to_string())
    })
    .await?;
    Ok(Json(OpResponse::ok(truncated)))
}

pub async fn rename_file(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<OpResponse>, AppError> {
    let from = checked_path(&req.from)?;
    let to = checked_path(&req.to)?;
    let root = state.ctx.root().to_path_buf();
    let renamed = with_file(state.ctx.clone(), from.clone(), move |file| {
        ensure_within_root(&root, &to)?;
        file.rename_to(&to)?;
        Ok(file.path().to_string())
    })
    .await?;
    tracing::info!("renamed {from} to {renamed}");
    Ok(Json(OpResponse::ok(renamed)))
}

pub async fn copy_file(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<OpResponse>, AppError> {
    let from = checked_path(&req.from)?;
    let to = checked_path(&req.to)?;
    let target = to.clone();
    let root = state.ctx.root().to_path_buf();
    with_file(state.ctx.clone(), from, move |file| {
        ensure_within_root(&root, &target)?;
        Ok(file.copy_to(&target)?)
    })
    .await?;
    Ok(Json(OpResponse::ok(to)))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<OpResponse>, AppError> {
    let path = checked_path(&query.path)?;
    let deleted = with_file(state.ctx.clone(), path, |file| {
        file.delete()?;
        Ok(file.path().to_string())
    })
    .await?;
    tracing::info!("deleted {deleted}");
    Ok(Json(OpResponse::ok(deleted)))
}

pub async fn resize_image(
    State(state): State<AppState>,
    Json(req): Json<ResizeRequest>,
) -> Result<Json<ResizeResponse>, AppError> {
    let path = checked_path(&req.path)?;
    let url = with_file(state.ctx.clone(), path, move |file| {
        require_existing(file)?;
        Ok(file.resize_to(req.width, req.height, req.mode)?)
    })
    .await?;
    Ok(Json(ResizeResponse { success: true, url }))
}

pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let path = checked_path(&query.path)?;
    let name = query.name;
    let resp = with_file(state.ctx.clone(), path, move |file| {
        Ok(file.send_to_browser(name.as_deref())?)
    })
    .await?;
    stream_attachment(resp).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(tmp: &TempDir) -> Router {
        let mut config = ServerConfig::default();
        config.core.files.root_dir = tmp.path().to_path_buf();
        Router::new()
            .nest("/api", crate::api::router())
            .with_state(AppState::new(config))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    #[test]
    fn checked_path_rejects_escapes() {
        assert!(checked_path("files/a.txt").is_ok());
        assert!(checked_path("").is_err());
        assert!(checked_path("/etc/passwd").is_err());
        assert!(checked_path("\\windows").is_err());
        assert!(checked_path("files/../../etc").is_err());
        assert!(checked_path("files\\..\\x").is_err());
    }

    #[tokio::test]
    async fn put_then_read_and_describe() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/files/content?path=files/docs/a.txt")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["success"], true);

        let resp = app
            .clone()
            .oneshot(empty_request("GET", "/api/files/content?path=files/docs/a.txt"))
            .await
            .unwrap();
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_bytes(resp).await, b"hello");

        let resp = app
            .oneshot(empty_request("GET", "/api/files/info?path=files/docs/a.txt"))
            .await
            .unwrap();
        let info = body_json(resp).await;
        assert_eq!(info["name"], "a.txt");
        assert_eq!(info["size"], 5);
        assert_eq!(info["hash"], "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(info["is_image"], false);
        assert!(info["uuid"].is_string());
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let tmp = TempDir::new().unwrap();

        let resp = app(&tmp)
            .oneshot(empty_request("GET", "/api/files/info?path=../secret.txt"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["success"], false);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "TOP SECRET").unwrap();
        fs::create_dir_all(tmp.path().join("files")).unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("files/link")).unwrap();
        let app = app(&tmp);

        let resp = app
            .clone()
            .oneshot(empty_request("GET", "/api/files/content?path=files/link/secret.txt"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_ne!(body_bytes(resp).await, b"TOP SECRET");

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/files/content?path=files/link/new.txt")
                    .body(Body::from("x"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(!outside.path().join("new.txt").exists());

        fs::write(tmp.path().join("files/a.txt"), "x").unwrap();
        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files/copy",
                serde_json::json!({ "from": "files/a.txt", "to": "files/link/copy.txt" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(!outside.path().join("copy.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_within_root_is_followed() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("files/real")).unwrap();
        fs::write(tmp.path().join("files/real/a.txt"), "inside").unwrap();
        std::os::unix::fs::symlink(
            tmp.path().join("files/real"),
            tmp.path().join("files/alias"),
        )
        .unwrap();

        let resp = app(&tmp)
            .oneshot(empty_request("GET", "/api/files/content?path=files/alias/a.txt"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"inside");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();

        let resp = app(&tmp)
            .oneshot(empty_request("GET", "/api/files/info?path=files/none.txt"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn directory_is_bad_request() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("files/docs")).unwrap();

        let resp = app(&tmp)
            .oneshot(empty_request("GET", "/api/files/info?path=files/docs"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn append_and_prepend_compose_content() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("files")).unwrap();
        fs::write(tmp.path().join("files/log.txt"), "middle\n").unwrap();
        let app = app(&tmp);

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/files/append",
                serde_json::json!({ "path": "files/log.txt", "content": "last" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(json_request(
                "POST",
                "/api/files/prepend",
                serde_json::json!({ "path": "files/log.txt", "content": "first", "separator": "|" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        assert_eq!(
            fs::read_to_string(tmp.path().join("files/log.txt")).unwrap(),
            "first|middle\nlast\n"
        );
    }

    #[tokio::test]
    async fn truncate_empties_file() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("files")).unwrap();
        fs::write(tmp.path().join("files/a.txt"), "content").unwrap();

        let resp = app(&tmp)
            .oneshot(json_request(
                "POST",
                "/api/files/truncate",
                serde_json::json!({ "path": "files/a.txt" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(fs::read(tmp.path().join("files/a.txt")).unwrap(), b"");
    }

    #[tokio::test]
    async fn rename_copy_delete() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("files")).unwrap();
        fs::write(tmp.path().join("files/a.txt"), "x").unwrap();
        let app = app(&tmp);

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/files/rename",
                serde_json::json!({ "from": "files/a.txt", "to": "files/moved/b.txt" }),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["path"], "files/moved/b.txt");
        assert!(tmp.path().join("files/moved/b.txt").exists());

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/files/copy",
                serde_json::json!({ "from": "files/moved/b.txt", "to": "files/c.txt" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(fs::read(tmp.path().join("files/c.txt")).unwrap(), b"x");

        let resp = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/files?path=files/c.txt"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!tmp.path().join("files/c.txt").exists());

        let resp = app
            .oneshot(empty_request("DELETE", "/api/files?path=files/c.txt"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rename_to_absolute_path_is_rejected() {
        let tmp = TempDir::new().unwrap();

        let resp = app(&tmp)
            .oneshot(json_request(
                "POST",
                "/api/files/rename",
                serde_json::json!({ "from": "files/a.txt", "to": "/tmp/a.txt" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn resize_non_image_returns_no_url() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("files")).unwrap();
        fs::write(tmp.path().join("files/a.txt"), "x").unwrap();

        let resp = app(&tmp)
            .oneshot(json_request(
                "POST",
                "/api/files/resize",
                serde_json::json!({ "path": "files/a.txt", "width": 10, "height": 10 }),
            ))
            .await
            .unwrap();

        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert!(body["url"].is_null());
    }

    #[tokio::test]
    async fn download_sends_attachment() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("files")).unwrap();
        fs::write(tmp.path().join("files/report.pdf"), "%PDF-1.4").unwrap();

        let resp = app(&tmp)
            .oneshot(empty_request(
                "GET",
                "/api/files/download?path=files/report.pdf&name=R%C3%A9sum%C3%A9.pdf",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(headers[header::CONTENT_LENGTH], "8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Resume.pdf\""
        );
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "must-revalidate, post-check=0, pre-check=0"
        );
        assert_eq!(headers[header::CONNECTION], "close");
        assert_eq!(body_bytes(resp).await, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn download_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();

        let resp = app(&tmp)
            .oneshot(empty_request("GET", "/api/files/download?path=files/none.pdf"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
