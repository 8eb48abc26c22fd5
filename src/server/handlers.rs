//! Route handlers.

use super::error::ApiError;
use super::AppState;
use crate::cover::{self, CoverRequest};
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const NO_FILE_MESSAGE: &str =
    "No file uploaded. Use multipart/form-data with field name 'file'";
pub const NOT_A_PDF_MESSAGE: &str = "File must be a PDF";

const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub status: &'static str,
    pub title: Option<String>,
    pub language: Option<String>,
    #[serde(rename = "pageCount")]
    pub page_count: usize,
}

/// The `file` part of an upload.
#[derive(Debug)]
struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    title: Option<String>,
    language: Option<String>,
}

impl UploadForm {
    /// Drain the multipart stream. Unknown fields are ignored.
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, ApiError> {
        let mut multipart =
            multipart.map_err(|_| ApiError::BadRequest(NO_FILE_MESSAGE.to_string()))?;

        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            match field.name() {
                Some("file") => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.map_err(multipart_error)?;
                    form.file = Some(UploadedFile {
                        file_name,
                        content_type,
                        data,
                    });
                }
                Some("title") => form.title = Some(field.text().await.map_err(multipart_error)?),
                Some("language") => {
                    form.language = Some(field.text().await.map_err(multipart_error)?)
                }
                other => debug!("Ignoring multipart field {:?}", other),
            }
        }
        Ok(form)
    }

    /// The uploaded file, unless it is missing or empty.
    fn take_file(&mut self) -> Result<UploadedFile, ApiError> {
        self.file
            .take()
            .filter(|f| !f.data.is_empty())
            .ok_or_else(|| ApiError::BadRequest(NO_FILE_MESSAGE.to_string()))
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(format!("Malformed multipart body: {}", e.body_text()))
    }
}

/// `GET /` and `GET /health`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "PDF Cover Service is running",
    })
}

/// `POST /cover`: multipart `file` plus optional `title` and `language`.
pub async fn create_cover(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file()?;

    if file.content_type.as_deref() != Some(PDF_CONTENT_TYPE) {
        return Err(ApiError::BadRequest(NOT_A_PDF_MESSAGE.to_string()));
    }

    let mut request = CoverRequest::new();
    if let Some(title) = form.title {
        request = request.with_title(title);
    }
    if let Some(language) = form.language {
        request = request.with_language(language);
    }

    info!(
        "Cover request: {:?} ({} bytes)",
        file.file_name.as_deref().unwrap_or("<unnamed>"),
        file.data.len()
    );
    let output = cover::create_cover(file.data.to_vec(), &request, &state.captioner).await?;

    let filename = cover::cover_filename(file.file_name.as_deref());
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"cover.pdf\""));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        output.pdf,
    )
        .into_response())
}

/// `POST /metadata`: multipart `file`. The content type is not checked.
pub async fn extract_metadata(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file()?;

    let meta = cover::extract_metadata(file.data.to_vec()).await?;
    Ok(Json(MetadataResponse {
        status: "ok",
        title: meta.title,
        language: meta.language,
        page_count: meta.page_count,
    }))
}
