use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Local;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assembler::DOCX_CONTENT_TYPE;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::generator::IcfGenerator;
use crate::models::{DownloadQuery, GenerateResponse};
use crate::store::OutputStore;

#[derive(Clone)]
struct AppState {
    generator: IcfGenerator,
    store: OutputStore,
}

pub async fn run_server(
    config: AppConfig,
    generator: IcfGenerator,
    store: OutputStore,
) -> Result<()> {
    tokio::fs::create_dir_all(store.dir()).await?;

    let app = router(generator, store, config.max_upload_bytes);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(generator: IcfGenerator, store: OutputStore, max_upload_bytes: usize) -> Router {
    let state = AppState { generator, store };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/generate_icf/", post(generate_icf))
        .route("/api/download_icf/", get(download_icf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn generate_icf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(err.to_string()))?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }

    let (file_name, bytes) = upload.ok_or(PipelineError::MissingFile)?;
    tracing::info!(%file_name, bytes = bytes.len(), "received protocol upload");

    let report = state.generator.generate(&file_name, bytes).await?;
    let token = state.store.save(&report.document).await?;

    Ok(Json(report.into_response(format!(
        "/api/download_icf/?file={token}"
    ))))
}

async fn download_icf(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let token = query
        .file
        .filter(|file| !file.is_empty())
        .ok_or_else(|| ApiError::bad_request("File not specified".to_string()))?;

    let bytes = state.store.load(&token).await?;
    let download_name = format!(
        "Protocol_Extracted_Information_{}.docx",
        Local::now().format("%Y%m%d_%H%M%S")
    );

    let headers = [
        (header::CONTENT_TYPE, DOCX_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{download_name}\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(value: PipelineError) -> Self {
        let status = match &value {
            PipelineError::OutputNotFound(_) => StatusCode::NOT_FOUND,
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            PipelineError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &value {
            PipelineError::UnsupportedFormat { .. } => "Unsupported file type".to_string(),
            PipelineError::OutputNotFound(_) => "File not found".to_string(),
            PipelineError::InvalidReference(_) => "Invalid file reference".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", value);
        }

        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
