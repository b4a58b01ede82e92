//! HTTP server: rendered post pages, the content API and media uploads
//!
//! Admin routes expect `Authorization: Bearer <token>`, compared with the
//! token read from the environment variable named in the config when the
//! server starts.

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::content::{NewPost, Post};
use crate::document::{try_coerce, RichContent};
use crate::editor::{store_media, MediaFile};
use crate::error::EditorError;
use crate::helpers::{html_escape, url_for};
use crate::render::{post_path, render_post_page, HtmlRenderer};
use crate::storage::{BlobStore, JsonPostStore, PostStore, StorageError};
use crate::Site;

/// Header carrying the original name of an uploaded file
const FILE_NAME_HEADER: &str = "x-file-name";

/// Server state
struct ServerState {
    site: Site,
    posts: JsonPostStore,
    blobs: Arc<dyn BlobStore>,
    renderer: HtmlRenderer,
    admin_token: Option<String>,
}

type SharedState = Arc<ServerState>;

#[derive(Debug, Error)]
enum ApiError {
    #[error("admin token is not configured")]
    Misconfigured,
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => ApiError::NotFound(id),
            StorageError::Invalid(msg) | StorageError::InvalidPath(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EditorError> for ApiError {
    fn from(e: EditorError) -> Self {
        match e {
            EditorError::UploadFailed(_) => ApiError::Internal(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Misconfigured | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

/// Build the application router
pub fn router(site: &Site) -> Router {
    let env = &site.config.server.admin_token_env;
    let admin_token = std::env::var(env).ok().filter(|t| !t.trim().is_empty());
    if admin_token.is_none() {
        tracing::warn!("{} is not set; admin routes will fail", env);
    }
    app(site, admin_token)
}

fn app(site: &Site, admin_token: Option<String>) -> Router {
    let config = &site.config;
    let state = Arc::new(ServerState {
        site: site.clone(),
        posts: site.post_store(),
        blobs: Arc::new(site.blob_store()),
        renderer: site.renderer(),
        admin_token,
    });

    // Pages are linked as `<dir>/<id>/`; both forms resolve
    let post_route = match config.post_dir.trim_matches('/') {
        "" => "/:id".to_string(),
        dir => format!("/{}/:id", dir),
    };
    let post_route_slash = format!("{}/", post_route);
    let media_route = match config.media.base_url.trim_end_matches('/') {
        base if base.starts_with('/') && base.len() > 1 => base.to_string(),
        _ => "/media".to_string(),
    };

    Router::new()
        .route("/", get(index_handler))
        .route(&post_route, get(post_page_handler))
        .route(&post_route_slash, get(post_page_handler))
        .route("/api/posts", get(list_posts))
        .route("/api/posts/:id", get(get_post))
        .route("/api/posts/:id/content", get(get_post_content))
        .route("/api/admin/posts", post(create_post))
        .route("/api/admin/posts/:id", axum::routing::delete(delete_post))
        .route(
            "/api/admin/posts/:id/content",
            axum::routing::put(save_post_content),
        )
        .route(
            "/api/admin/media",
            post(upload_media).layer(DefaultBodyLimit::max(config.server.max_upload_bytes)),
        )
        .nest_service(&media_route, ServeDir::new(&site.media_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(site: &Site, ip: &str, port: u16, open: bool) -> Result<()> {
    let app = router(site);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(), ApiError> {
    let expected = state.admin_token.as_deref().ok_or(ApiError::Misconfigured)?;
    let given = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let matches = given.is_some_and(|given| bool::from(given.as_bytes().ct_eq(expected.as_bytes())));
    if !matches {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

/// Run a post store call on the blocking thread pool
async fn with_posts<T, F>(state: &SharedState, f: F) -> Result<T, StorageError>
where
    F: FnOnce(&JsonPostStore) -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.posts))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
}

/// Post with its body in the current envelope
fn with_current_content(mut post: Post) -> Post {
    post.content = Some(RichContent::new(post.document()).to_value());
    post
}

async fn index_handler(State(state): State<SharedState>) -> Result<Html<String>, ApiError> {
    let config = &state.site.config;
    let items: String = with_posts(&state, |posts| posts.load_posts())
        .await?
        .iter()
        .filter(|p| p.published)
        .map(|p| {
            format!(
                r#"<li><a href="{}">{}</a> <small>{}</small></li>"#,
                html_escape(&url_for(config, &post_path(config, &p.id))),
                html_escape(&p.title),
                html_escape(&p.date)
            )
        })
        .collect();

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{site}</title>\n</head>\n<body>\n<h1>{site}</h1>\n<ul class=\"posts\">{items}</ul>\n</body>\n</html>\n",
        site = html_escape(&config.title),
        items = items
    )))
}

async fn post_page_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Response {
    match with_posts(&state, move |posts| posts.load_post(&id)).await {
        Ok(post) if post.published => {
            Html(render_post_page(&state.site.config, &state.renderer, &post)).into_response()
        }
        Ok(_) | Err(StorageError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Html("<h1>Post not found</h1>")).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn list_posts(State(state): State<SharedState>) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = with_posts(&state, |posts| posts.load_posts())
        .await?
        .into_iter()
        .filter(|p| p.published)
        .map(|mut p| {
            p.content = None;
            p
        })
        .collect();
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiError> {
    let post = with_posts(&state, move |posts| posts.load_post(&id)).await?;
    Ok(Json(with_current_content(post)))
}

async fn get_post_content(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let post = with_posts(&state, move |posts| posts.load_post(&id)).await?;
    Ok(Json(RichContent::new(post.document()).to_value()))
}

async fn create_post(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(new): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    authorize(&state, &headers)?;
    let post = with_posts(&state, move |posts| posts.create_post(new)).await?;
    Ok((StatusCode::CREATED, Json(with_current_content(post))))
}

async fn delete_post(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &headers)?;
    let target = id.clone();
    with_posts(&state, move |posts| posts.delete_post(&target)).await?;
    tracing::info!("Deleted post {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Replace a post's body. Accepts anything that reads as a document and
/// refuses the rest instead of storing an empty body.
async fn save_post_content(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Post>, ApiError> {
    authorize(&state, &headers)?;
    let doc = try_coerce(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let post = with_posts(&state, move |posts| posts.save_post_content(&id, &doc)).await?;
    Ok(Json(post))
}

/// Store a raw upload body. The MIME type comes from `Content-Type`, the
/// original name from `X-File-Name`.
async fn upload_media(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let name = match header(FILE_NAME_HEADER) {
        n if n.trim().is_empty() => "upload".to_string(),
        n => n,
    };
    let file = MediaFile::new(name, header(CONTENT_TYPE.as_str()), body.to_vec());

    let kind = file
        .kind()
        .ok_or_else(|| ApiError::BadRequest("only image and video uploads are accepted".to_string()))?;
    if file.bytes.is_empty() {
        return Err(ApiError::BadRequest("upload is empty".to_string()));
    }

    let url = store_media(state.blobs.as_ref(), &state.site.config.media, &file, kind).await?;
    Ok(Json(json!({ "url": url })))
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
