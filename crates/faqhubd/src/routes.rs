//! API routes for faqhubd

use crate::control::RestartMode;
use crate::server::AppState;
use crate::storage::{FaqEntry, FaqSummary, Localized};
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

type AppStateArc = Arc<AppState>;
type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

/// Languages filled from `ru` when left empty
const FALLBACK_LANGS: [&str; 2] = ["en", "ro"];
const PRIMARY_LANG: &str = "ru";

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "svg", "webp"];

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    error!("  Storage failure: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
}

// ============================================================================
// FAQ Routes
// ============================================================================

pub fn faq_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/all", get(list_faqs))
        .route("/get", get(get_faq))
}

async fn list_faqs(State(state): State<AppStateArc>) -> Json<Vec<FaqSummary>> {
    Json(state.store.list().await)
}

async fn get_faq(
    State(state): State<AppStateArc>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<FaqEntry>, ApiError> {
    let id = params.get("faq").map(String::as_str).unwrap_or_default();
    if id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No FAQ specified"));
    }

    state
        .store
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "FAQ not found"))
}

// ============================================================================
// Editor Routes (admin)
// ============================================================================

pub fn editor_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/edit", post(edit_faq))
        .route("/delete", post(delete_faq))
        .route("/upload", post(upload_file))
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub titles: Localized,
    #[serde(default)]
    pub contents: Localized,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EditRequest {
    /// Validate and fill missing translations from the primary language
    pub fn into_entry(self) -> Option<FaqEntry> {
        let id = self.id.trim().to_string();
        let primary_title = self.titles.get(PRIMARY_LANG).filter(|t| !t.is_empty()).cloned();
        if id.is_empty() || primary_title.is_none() {
            return None;
        }

        let mut titles = self.titles;
        let mut contents = self.contents;
        let primary_content = contents.get(PRIMARY_LANG).cloned();
        for lang in FALLBACK_LANGS {
            fill_if_empty(&mut titles, lang, primary_title.clone());
            fill_if_empty(&mut contents, lang, primary_content.clone());
        }

        Some(FaqEntry {
            id,
            titles,
            contents,
            tags: self.tags,
        })
    }
}

fn fill_if_empty(map: &mut Localized, lang: &str, fallback: Option<String>) {
    let empty = map.get(lang).map_or(true, String::is_empty);
    if empty {
        if let Some(fallback) = fallback {
            map.insert(lang.to_string(), fallback);
        }
    }
}

async fn edit_faq(State(state): State<AppStateArc>, Json(req): Json<EditRequest>) -> ApiResult {
    let entry = req
        .into_entry()
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing ID or RU title"))?;

    info!("  Saving FAQ {}", entry.id);
    state.store.upsert(entry).await.map_err(internal)?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "success" }))))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub id: String,
}

async fn delete_faq(State(state): State<AppStateArc>, Json(req): Json<DeleteRequest>) -> ApiResult {
    if req.id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No FAQ ID provided"));
    }

    info!("  Deleting FAQ {}", req.id);
    state.store.delete(&req.id).await.map_err(internal)?;
    Ok((StatusCode::OK, Json(json!({ "status": "deleted" }))))
}

/// Reduce a client-supplied name to a safe single path component
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// Final stored name for an upload
pub fn upload_name(original: &str, custom: Option<&str>) -> String {
    match custom.filter(|c| !c.is_empty()) {
        Some(custom) => {
            let ext = Path::new(original)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default();
            let mut name = custom.to_string();
            if !name.to_lowercase().ends_with(&ext) {
                name.push_str(&ext);
            }
            secure_filename(&name)
        }
        None => secure_filename(original),
    }
}

async fn upload_file(State(state): State<AppStateArc>, mut multipart: Multipart) -> ApiResult {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut custom_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.to_string()))?;
                file = Some((original, data.to_vec()));
            }
            "custom_name" => {
                custom_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let (original, data) = file.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "No file part"))?;
    if original.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No selected file"));
    }

    let filename = upload_name(&original, custom_name.as_deref());
    if filename.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Invalid file name"));
    }

    let path = state.static_dir.join(&filename);
    let mut out = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(out) => out,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err((
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "File already exists",
                    "code": "FILE_EXISTS",
                    "current_name": filename,
                })),
            ))
        }
        Err(e) => return Err(internal(e)),
    };
    let mut written = out.write_all(&data).await;
    if written.is_ok() {
        written = out.flush().await;
    }
    if let Err(e) = written {
        drop(out);
        // A partial file would block every retry with a conflict
        let _ = tokio::fs::remove_file(&path).await;
        return Err(internal(e));
    }

    info!("  Stored upload {} ({} bytes)", filename, data.len());
    Ok((StatusCode::OK, Json(json!({ "filename": filename }))))
}

// ============================================================================
// Asset Routes
// ============================================================================

pub fn asset_routes() -> Router<AppStateArc> {
    Router::new().route("/list_assets", get(list_assets))
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

async fn list_assets(State(state): State<AppStateArc>) -> Result<Json<Vec<String>>, ApiError> {
    let mut dir = tokio::fs::read_dir(&state.static_dir).await.map_err(internal)?;
    let mut images = Vec::new();

    while let Some(entry) = dir.next_entry().await.map_err(internal)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_image(&name) {
            images.push(name);
        }
    }

    images.sort();
    Ok(Json(images))
}

// ============================================================================
// Presence Routes
// ============================================================================

pub fn presence_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/heartbeat", post(heartbeat))
        .route("/online", get(online))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub id: String,
}

async fn heartbeat(State(state): State<AppStateArc>, Json(req): Json<HeartbeatRequest>) -> StatusCode {
    if req.id.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    state.presence.touch(&req.id);
    StatusCode::NO_CONTENT
}

async fn online(State(state): State<AppStateArc>) -> Json<Value> {
    Json(json!({ "online": state.presence.online() }))
}

// ============================================================================
// Control Routes (admin)
// ============================================================================

pub fn control_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/restart", post(restart))
        .route("/shutdown", post(shutdown))
}

async fn restart(State(state): State<AppStateArc>) -> (StatusCode, Json<Value>) {
    let mode = RestartMode::from_settings(state.settings.reload_with_updater);
    info!("  Restart requested ({:?})", mode);
    state.handoff.restart(mode);
    (StatusCode::ACCEPTED, Json(json!({ "status": "restarting" })))
}

async fn shutdown(State(state): State<AppStateArc>) -> (StatusCode, Json<Value>) {
    info!("  Shutdown requested");
    state.handoff.shutdown();
    (StatusCode::ACCEPTED, Json(json!({ "status": "shutting down" })))
}
