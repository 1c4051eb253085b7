//! HTTP surface over the plate pipeline.
//!
//! | Route | |
//! |---|---|
//! | `GET /` | welcome message |
//! | `GET /health` | liveness |
//! | `GET /metrics` | Prometheus exposition |
//! | `POST /api/v1/detect` | multipart `image` → `{"detections": [...]}` |
//! | `POST /api/v1/process` | multipart `car_image`, `custom_image`?, `custom_text`? → JPEG |
//! | `GET /editor` | browser upload form |
//! | `POST /process` | same as `/api/v1/process`, dark plate style (used by the form) |

pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::OverlayStyle;
use crate::config::PlateStyle;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::plate_editing::pipeline::PlateEditor;

#[derive(Clone)]
pub struct AppState {
    pub editor: Arc<PlateEditor>,
    /// Backs the browser form; shares the detector pool with `editor`.
    pub web_editor: Arc<PlateEditor>,
}

pub fn router(editor: Arc<PlateEditor>, config: &ServerConfig) -> Router {
    let web_editor = Arc::new(editor.with_style(OverlayStyle::from_preset(PlateStyle::Dark)));

    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/v1/detect", post(handlers::detect_handler))
        .route("/api/v1/process", post(handlers::process_handler))
        .route("/editor", get(handlers::editor_page_handler))
        .route("/process", post(handlers::web_process_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { editor, web_editor })
}

pub async fn serve(editor: Arc<PlateEditor>, config: ServerConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("API server listening on {}", config.bind);

    axum::serve(listener, router(editor, &config)).await?;

    Ok(())
}
