use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use axum_extra::extract::multipart::MultipartError;
use axum_extra::extract::Multipart;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinError;
use tracing::debug;
use tracing::error;

use super::AppState;
use crate::error::Error;
use crate::error::ErrorClass;
use crate::metrics;
use crate::plate_editing::pipeline::PlateEditor;
use crate::plate_editing::DetectionResult;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

/// Everything a handler can fail with, mapped to a status in [`IntoResponse`].
#[derive(Debug)]
pub enum ApiError {
    Pipeline(Error),
    Upload(MultipartError),
    Task(JoinError),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Pipeline(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Upload(err)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        Self::Task(err)
    }
}

pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::BadInput => StatusCode::BAD_REQUEST,
        ErrorClass::NotFound => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Pipeline(err) => (
                status_for(err.class()),
                ErrorBody {
                    error: err.label(),
                    detail: err.to_string(),
                },
            ),
            Self::Upload(err) => (
                err.status(),
                ErrorBody {
                    error: "invalid_upload",
                    detail: err.body_text(),
                },
            ),
            Self::Task(err) => {
                error!("Pipeline task did not complete: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal",
                        detail: "processing was interrupted".to_string(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default)]
struct UploadForm {
    image: Option<Bytes>,
    car_image: Option<Bytes>,
    custom_image: Option<Bytes>,
    custom_text: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => form.image = Some(field.bytes().await?),
            "car_image" => form.car_image = Some(field.bytes().await?),
            "custom_image" => form.custom_image = Some(field.bytes().await?),
            "custom_text" => form.custom_text = Some(field.text().await?),
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }
    Ok(form)
}

pub async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to License Plate Detection API" }))
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics_handler() -> Result<Response, ApiError> {
    let text = metrics::render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

/// POST /api/v1/detect - plate boxes for the uploaded `image`.
pub async fn detect_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DetectionResult>, ApiError> {
    let form = read_form(multipart).await?;
    let image = form.image.ok_or(Error::InvalidImage)?;

    let editor = state.editor.clone();
    let detections = tokio::task::spawn_blocking(move || editor.detect(&image)).await??;

    Ok(Json(detections))
}

/// POST /api/v1/process - the uploaded `car_image` with its plate replaced, as JPEG.
///
/// `custom_image` wins over `custom_text` when both are sent.
pub async fn process_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    process_with(state.editor, multipart).await
}

/// POST /process - the browser form's endpoint, painting text on a dark plate.
pub async fn web_process_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    process_with(state.web_editor, multipart).await
}

pub async fn editor_page_handler() -> Html<&'static str> {
    Html(EDITOR_PAGE)
}

const EDITOR_PAGE: &str = include_str!("editor.html");

async fn process_with(editor: Arc<PlateEditor>, multipart: Multipart) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let car_image = form.car_image.ok_or(Error::InvalidImage)?;
    let UploadForm {
        custom_image,
        custom_text,
        ..
    } = form;

    let jpeg = tokio::task::spawn_blocking(move || {
        editor.edit(&car_image, custom_image.as_deref(), custom_text.as_deref())
    })
    .await??;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response())
}
