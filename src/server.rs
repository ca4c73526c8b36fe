//! HTTP render service: accepts composition props, renders to the output
//! store, and serves finished videos back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bundle::BundleCache;
use crate::compositor::Composition;
use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::render::render_media;
use crate::schema::CompositionProps;

pub struct AppState {
    pub config: ServerConfig,
    pub bundle: BundleCache,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let bundle = BundleCache::new(config.font_path.clone());
        Self { config, bundle }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/render", post(render))
        .route("/health", get(health))
        .route("/videos/{file}", get(serve_video))
        .route("/output/{file}", get(serve_video))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and run the service. The bundle is prewarmed in the background so
/// the first `/render` does not pay the build.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let port = config.port;
    let state = Arc::new(AppState::new(config));

    let prewarm = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(error) = prewarm.bundle.get_or_build().await {
            warn!(%error, "bundle prewarm failed; first render will retry");
        }
    });

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "render service listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn check_auth(state: &AppState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let Some(secret) = &state.config.secret else {
        return Ok(());
    };
    let expected = format!("Bearer {secret}");
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized)
    }
}

/// Restrict the filename's user segment to a safe alphabet.
fn sanitize_user(raw: Option<&str>) -> String {
    let cleaned: String = raw
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "anon".to_owned()
    } else {
        cleaned
    }
}

fn output_filename(user: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let tag = Uuid::new_v4().simple().to_string();
    format!("reel-{user}-{millis}-{}.mp4", &tag[..8])
}

async fn render(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServiceError> {
    // Authentication is checked before the body is even parsed.
    check_auth(&state, &headers)?;
    let started = Instant::now();

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|error| ServiceError::Validation(format!("Invalid JSON body: {error}")))?;
    let composition_id = payload.get("composition").and_then(Value::as_str);
    let input_props = payload.get("inputProps").filter(|props| props.is_object());
    let (Some(composition_id), Some(input_props)) = (composition_id, input_props) else {
        return Err(ServiceError::Validation(
            "Missing composition or inputProps".to_owned(),
        ));
    };

    let props: CompositionProps = serde_json::from_value(input_props.clone())
        .map_err(|error| ServiceError::Validation(format!("Invalid inputProps: {error}")))?;
    let composition = Composition::prepare(&props)
        .map_err(|error| ServiceError::Validation(error.to_string()))?;

    let bundle = state
        .bundle
        .get_or_build()
        .await
        .map_err(|error| ServiceError::Build(format!("{error:#}")))?;
    let descriptor = *bundle.composition(composition_id).ok_or_else(|| {
        ServiceError::Render(format!("Unknown composition '{composition_id}'"))
    })?;

    let user = sanitize_user(payload.get("userId").and_then(Value::as_str));
    let filename = output_filename(&user);
    let output_dir = state.config.output_dir.clone();
    let output_path = output_dir.join(&filename);
    let ffmpeg_mode = state.config.ffmpeg_mode;

    info!(composition = composition_id, %user, file = %filename, "render requested");

    let render_path = output_path.clone();
    let stats = tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&output_dir)?;
        let font = bundle.font();
        render_media(&descriptor, &composition, font, &render_path, ffmpeg_mode)
    })
    .await
    .map_err(|_| ServiceError::Render("render task panicked".to_owned()))?
    .map_err(|error| {
        error!(error = %format!("{error:#}"), file = %filename, "render failed");
        ServiceError::Render(format!("{error:#}"))
    })?;

    Ok(Json(json!({
        "status": "completed",
        "videoUrl": format!("/videos/{filename}"),
        "outputPath": output_path.to_string_lossy(),
        "renderTime": started.elapsed().as_secs_f64(),
        "frames": stats.frames,
    })))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "bundled": state.bundle.is_built(),
    }))
}

async fn serve_video(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<Response, ServiceError> {
    // Path extraction never yields separators, but keep the guard anyway.
    if file.contains('/') || file.contains('\\') || file.contains("..") {
        return Err(ServiceError::NotFound);
    }
    let path: PathBuf = state.config.output_dir.join(&file);
    let handle = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ServiceError::NotFound)?;
    let stream = ReaderStream::new(handle);
    let response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "video/mp4")],
        Body::from_stream(stream),
    );
    Ok(response.into_response())
}
