use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::{LIST_LIMIT, NUM_ROWS, SEARCH_LIMIT, ServerConfig};
use crate::record::{RecordId, SheetData, SheetPatch};
use crate::remote::{BlobStore, SheetStore, StoreError, UploadError};
use crate::report::{self, PrintMode};
use crate::store::SqliteStore;
use crate::uploads::{DEFAULT_SCOPE, UploadDir};

pub struct AppState {
    pub store: SqliteStore,
    pub uploads: UploadDir,
}

#[derive(Deserialize)]
struct ListQuery {
    q: Option<String>,
}

#[derive(Deserialize, Default)]
struct SheetBody {
    title: Option<String>,
    data: Option<Value>,
}

#[derive(Deserialize)]
struct PrintQuery {
    format: Option<String>,
}

/// Error half of every handler.
#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    Upload(UploadError),
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        ApiError::Upload(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Store(StoreError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("sheet {} not found", id))
            }
            ApiError::Upload(UploadError::UnsupportedType(ct)) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("unsupported content-type {}", ct),
            ),
            ApiError::Upload(UploadError::Empty) => (StatusCode::BAD_REQUEST, "empty body".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Upload(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            error!("request failed: {}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let upload_root = state.uploads.root().to_path_buf();
    Router::new()
        .route("/api/sheets", get(list_sheets).post(create_sheet))
        .route("/api/sheets/:id", get(get_sheet).put(update_sheet))
        .route("/api/sheets/:id/print/:mode", get(print_sheet))
        .route("/api/uploads", post(upload_image))
        .nest_service("/uploads", ServeDir::new(upload_root))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::open(&config.storage.db_path)?;
    let uploads = UploadDir::new(&config.storage.upload_dir);
    let app = router(Arc::new(AppState { store, uploads }));

    let listener = TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn list_sheets(
    Query(params): Query<ListQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let items = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => state.store.search(q, SEARCH_LIMIT).await?,
        _ => state.store.list(LIST_LIMIT).await?,
    };
    Ok(Json(json!({ "items": items })))
}

async fn create_sheet(
    State(state): State<Arc<AppState>>,
    body: Option<Json<SheetBody>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let data = match &body.data {
        Some(v) => SheetData::from_value(v, NUM_ROWS),
        None => SheetData::blank(NUM_ROWS),
    };
    let sheet = state
        .store
        .create(body.title.as_deref().unwrap_or(""), &data)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "sheet": sheet }))))
}

async fn get_sheet(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let sheet = state.store.get(&RecordId(id)).await?;
    Ok(Json(json!({ "sheet": sheet })))
}

async fn update_sheet(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SheetBody>,
) -> Result<Json<Value>, ApiError> {
    let patch = SheetPatch {
        title: body.title,
        data: body.data.as_ref().map(|v| SheetData::from_value(v, NUM_ROWS)),
    };
    let sheet = state.store.update(&RecordId(id), patch).await?;
    Ok(Json(json!({ "sheet": sheet })))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let content_type = header_value(&headers, header::CONTENT_TYPE.as_str())
        .unwrap_or("application/octet-stream");
    let scope = header_value(&headers, "x-sheet-id").unwrap_or(DEFAULT_SCOPE);

    let url = state.uploads.upload(body.to_vec(), content_type, scope).await?;
    Ok(Json(json!({ "url": url })))
}

async fn print_sheet(
    Path((id, mode)): Path<(String, String)>,
    Query(params): Query<PrintQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let mode: PrintMode = mode.parse().map_err(ApiError::BadRequest)?;
    let sheet = state.store.get(&RecordId(id)).await?;
    let doc = report::build_report(&sheet.data, mode);
    let stem = format!("{}-{}", sheet.id, mode);

    match params.format.as_deref().unwrap_or("csv") {
        "csv" => Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}.csv\"", stem)),
            ],
            report::to_csv(&doc),
        )
            .into_response()),
        "xlsx" => {
            let bytes = report::to_xlsx(&doc).map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok((
                [
                    (
                        header::CONTENT_TYPE,
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
                    ),
                    (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}.xlsx\"", stem)),
                ],
                bytes,
            )
                .into_response())
        }
        other => Err(ApiError::BadRequest(format!("unknown format: {}", other))),
    }
}
