//! HTTP API for uploading documents and asking questions.
//!
//! Uploaded documents are staged in the server's [`SessionDocuments`];
//! every `/ask` runs the shared [`Pipeline`] over the whole staged set.
//! The `/documents` routes manage the persistent [`Catalog`], which is
//! separate from the staged set.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/loaded_docs` | Summaries of the staged documents |
//! | `POST` | `/upload` | Stage one document (multipart `file` or JSON) |
//! | `POST` | `/ask` | Answer a question from the staged documents |
//! | `POST` | `/clear_docs` | Drop staged documents and clear the collection |
//! | `GET`  | `/documents` | List catalogued documents |
//! | `POST` | `/documents` | Catalogue a document |
//! | `GET`  | `/documents/{id}` | Fetch one catalogued document |
//! | `PUT`  | `/documents/{id}` | Replace a catalogued document |
//! | `PATCH` | `/documents/{id}` | Update some fields of a catalogued document |
//! | `DELETE` | `/documents/{id}` | Remove a catalogued document |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Query is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends
//! can call the API directly.

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use finrag_core::models::RawDocument;
use finrag_core::pipeline::Pipeline;

use crate::catalog::{Catalog, CatalogDocument, CatalogError, DocumentPatch, NewDocument};
use crate::config::Config;
use crate::documents;
use crate::runtime;
use crate::session::{DocumentSummary, SessionDocuments};

/// Largest accepted `/upload` body; filings as PDFs routinely exceed
/// axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    session: Arc<SessionDocuments>,
    catalog: Arc<Catalog>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, catalog: Arc<Catalog>) -> Self {
        Self {
            pipeline,
            session: Arc::new(SessionDocuments::new()),
            catalog,
        }
    }
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = runtime::pipeline(config).await?;
    let catalog = Arc::new(Catalog::open(config).await?);
    let app = build_router(AppState::new(pipeline, catalog));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("finrag server listening on http://{}", config.server.bind);
    tracing::info!(bind = %config.server.bind, "server started");

    axum::serve(listener, app).await?;
    Ok(())
}

/// All routes with permissive CORS.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/loaded_docs", get(handle_loaded_docs))
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/ask", post(handle_ask))
        .route("/clear_docs", post(handle_clear))
        .route(
            "/documents",
            get(handle_list_documents).post(handle_create_document),
        )
        .route(
            "/documents/{id}",
            get(handle_get_document)
                .put(handle_update_document)
                .patch(handle_patch_document)
                .delete(handle_delete_document),
        )
        .layer(cors)
        .with_state(state)
}

// ============ Errors ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Invalid(message) => bad_request(message),
            CatalogError::Database(e) => internal(e.into()),
        }
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /loaded_docs ============

#[derive(Serialize)]
struct LoadedDocsResponse {
    documents: Vec<DocumentSummary>,
}

async fn handle_loaded_docs(State(state): State<AppState>) -> Json<LoadedDocsResponse> {
    Json(LoadedDocsResponse {
        documents: state.session.summaries().await,
    })
}

// ============ POST /upload ============

/// JSON body for `POST /upload`. Only `content` is required.
#[derive(Deserialize)]
struct UploadRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    doc_type: Option<String>,
    content: String,
    #[serde(default)]
    date_filed: Option<NaiveDate>,
}

#[derive(Serialize)]
struct UploadResponse {
    status: String,
    loaded_docs: usize,
}

impl UploadRequest {
    fn into_document(self) -> RawDocument {
        let mut document = RawDocument::uploaded(
            self.title.unwrap_or_else(|| "Uploaded document".to_string()),
            self.content,
        );
        if let Some(company) = self.company {
            document.company = company;
        }
        if let Some(doc_type) = self.doc_type {
            document.doc_type = doc_type;
        }
        document.date_filed = self.date_filed;
        document
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

/// Read the `file` field of a multipart upload, plus optional `company`
/// and `doc_type` text fields.
async fn document_from_multipart(mut multipart: Multipart) -> Result<RawDocument, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut company = None;
    let mut doc_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.txt").to_string();
                let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
                file = Some((file_name, bytes.to_vec()));
            }
            "company" => {
                company = Some(field.text().await.map_err(|e| bad_request(e.body_text()))?);
            }
            "doc_type" => {
                doc_type = Some(field.text().await.map_err(|e| bad_request(e.body_text()))?);
            }
            _ => {}
        }
    }

    let Some((file_name, bytes)) = file else {
        return Err(bad_request("No file uploaded"));
    };

    let mut document = tokio::task::spawn_blocking(move || {
        documents::upload_from_bytes(&file_name, &bytes)
    })
    .await
    .map_err(|e| internal(e.into()))?
    .map_err(|e| bad_request(e.to_string()))?;

    if let Some(company) = company.filter(|c| !c.trim().is_empty()) {
        document.company = company;
    }
    if let Some(doc_type) = doc_type.filter(|d| !d.trim().is_empty()) {
        document.doc_type = doc_type;
    }
    Ok(document)
}

/// Accepts either a `multipart/form-data` body with a `.txt`/`.md`/`.pdf`
/// `file` field, or a JSON [`UploadRequest`].
async fn handle_upload(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<UploadResponse>, AppError> {
    let document = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        document_from_multipart(multipart).await?
    } else {
        let Json(body) = Json::<UploadRequest>::from_request(req, &state)
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        body.into_document()
    };

    tracing::info!(title = %document.title, chars = document.content.len(), "staged upload");
    let loaded_docs = state.session.add(document).await;

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        loaded_docs,
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let query = req.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(bad_request("Query is required"));
    }

    let documents = state.session.snapshot().await;
    let answer = state
        .pipeline
        .answer(&documents, &query)
        .await
        .map_err(internal)?;

    tracing::info!(outcome = ?answer.outcome, "answered query");
    Ok(Json(AskResponse {
        answer: answer.text,
    }))
}

// ============ POST /clear_docs ============

#[derive(Serialize)]
struct ClearResponse {
    status: String,
    docs_remaining: usize,
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    let removed = state.session.clear().await;
    state.pipeline.clear().await.map_err(internal)?;
    tracing::info!(removed, "cleared documents");

    Ok(Json(ClearResponse {
        status: "cleared".to_string(),
        docs_remaining: state.session.len().await,
    }))
}

// ============ /documents ============

#[derive(Serialize)]
struct CatalogListResponse {
    documents: Vec<CatalogDocument>,
}

fn missing_document(id: i64) -> AppError {
    not_found(format!("Document {} not found", id))
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<CatalogListResponse>, AppError> {
    Ok(Json(CatalogListResponse {
        documents: state.catalog.list().await?,
    }))
}

async fn handle_create_document(
    State(state): State<AppState>,
    Json(doc): Json<NewDocument>,
) -> Result<(StatusCode, Json<CatalogDocument>), AppError> {
    let created = state.catalog.create(doc).await?;
    tracing::info!(id = created.id, title = %created.title, "catalogued document");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CatalogDocument>, AppError> {
    state
        .catalog
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| missing_document(id))
}

async fn handle_update_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(doc): Json<NewDocument>,
) -> Result<Json<CatalogDocument>, AppError> {
    state
        .catalog
        .update(id, doc)
        .await?
        .map(Json)
        .ok_or_else(|| missing_document(id))
}

async fn handle_patch_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<CatalogDocument>, AppError> {
    state
        .catalog
        .patch(id, patch)
        .await?
        .map(Json)
        .ok_or_else(|| missing_document(id))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.catalog.delete(id).await? {
        tracing::info!(id, "removed catalogued document");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(missing_document(id))
    }
}
