use super::AppState;
use super::error::ApiError;
use crate::adapters::export::ExportFormat;
use crate::domain::{ChatRecord, DomainError, ExportCategory, SpamBucket};
use crate::usecases::{ConnectStatus, ExportService, VerifyStatus};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ConfigBody {
    pub api_id: i32,
    pub api_hash: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectBody {
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
    pub ids: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "app": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "connected": state.chats.session().is_ready().await,
    }))
}

/// Never returns the api_hash.
pub async fn get_config(State(state): State<AppState>) -> ApiResult {
    let creds = state.chats.session().stored_credentials().await?;
    Ok(Json(json!({
        "configured": creds.is_some(),
        "api_id": creds.as_ref().map(|c| c.api_id),
        "phone": creds.and_then(|c| c.phone),
    })))
}

pub async fn save_config(State(state): State<AppState>, Json(body): Json<ConfigBody>) -> ApiResult {
    state
        .chats
        .session()
        .save_credentials(body.api_id, &body.api_hash)
        .await?;
    Ok(Json(json!({ "status": "saved" })))
}

pub async fn connect(State(state): State<AppState>, Json(body): Json<ConnectBody>) -> ApiResult {
    let status = state.chats.session().connect(body.phone.as_deref()).await?;
    Ok(Json(match status {
        ConnectStatus::Connected => json!({ "status": "connected", "needs_code": false }),
        ConnectStatus::CodeRequired => json!({ "status": "waiting_code", "needs_code": true }),
    }))
}

pub async fn verify(State(state): State<AppState>, Json(body): Json<VerifyBody>) -> ApiResult {
    let status = state
        .chats
        .session()
        .verify(body.code.as_deref(), body.password.as_deref())
        .await?;
    Ok(Json(match status {
        VerifyStatus::Connected => json!({ "status": "connected" }),
        VerifyStatus::PasswordRequired { hint } => {
            json!({ "status": "needs_password", "hint": hint })
        }
    }))
}

pub async fn me(State(state): State<AppState>) -> ApiResult {
    let me = state.chats.session().me().await?;
    Ok(Json(json!(me)))
}

/// Re-lists dialogs on every call so chats added or removed elsewhere show up.
pub async fn chats(State(state): State<AppState>) -> ApiResult {
    state.chats.refresh().await?;
    let set = state.chats.categories().await?;
    let records: Vec<ChatRecord> = set.iter().map(ChatRecord::from).collect();
    Ok(Json(json!({ "chats": records, "stats": set.stats() })))
}

pub async fn refresh(State(state): State<AppState>) -> ApiResult {
    let stats = state.chats.refresh().await?;
    Ok(Json(json!({ "status": "refreshed", "stats": stats })))
}

pub async fn analyze(State(state): State<AppState>) -> ApiResult {
    state.chats.refresh().await?;
    let analysis = state.chats.analyze().await?;
    let mut users = serde_json::Map::new();
    for bucket in SpamBucket::ALL {
        let records: Vec<ChatRecord> = analysis.bucket(bucket).iter().map(ChatRecord::from).collect();
        users.insert(bucket.name().to_string(), json!(records));
    }
    Ok(Json(json!({ "counts": analysis.counts(), "users": users })))
}

pub async fn delete_now(State(state): State<AppState>, Path(chat_id): Path<i64>) -> ApiResult {
    state.chats.delete_now(chat_id).await?;
    Ok(Json(json!({ "status": "deleted", "id": chat_id })))
}

pub async fn schedule(State(state): State<AppState>, Path(chat_id): Path<i64>) -> ApiResult {
    state.chats.stats().await?;
    let coordinator = state.chats.coordinator();
    let handle = coordinator.schedule(chat_id).await?;
    Ok(Json(json!({
        "status": "pending",
        "id": handle.entity_id,
        "undo_secs": coordinator.delay().as_secs(),
    })))
}

pub async fn undo(State(state): State<AppState>, Path(chat_id): Path<i64>) -> ApiResult {
    if state.chats.coordinator().undo(chat_id).await {
        Ok(Json(json!({ "status": "undone", "id": chat_id })))
    } else {
        Err(DomainError::NotFound(chat_id).into())
    }
}

/// Pending deletes plus failures since the last call.
pub async fn pending(State(state): State<AppState>) -> Json<Value> {
    let coordinator = state.chats.coordinator();
    let pending = coordinator.pending().await;
    let failures = coordinator.take_failures().await;
    Json(json!({ "pending": pending, "failures": failures }))
}

pub async fn schedule_batch(State(state): State<AppState>, Json(body): Json<BatchBody>) -> ApiResult {
    state.chats.stats().await?;
    let handle = state.chats.coordinator().schedule_batch(&body.ids).await?;
    info!(batch_id = handle.batch_id, scheduled = handle.scheduled.len(), "batch scheduled over http");
    Ok(Json(json!({
        "batch_id": handle.batch_id,
        "scheduled": handle.scheduled,
        "skipped": handle.skipped,
    })))
}

fn unknown_batch(batch_id: u64) -> ApiError {
    ApiError(DomainError::NotFound(batch_id as i64))
}

pub async fn undo_batch(State(state): State<AppState>, Path(batch_id): Path<u64>) -> ApiResult {
    if state.chats.coordinator().undo_batch(batch_id).await {
        Ok(Json(json!({ "status": "undone", "batch_id": batch_id })))
    } else {
        Err(unknown_batch(batch_id))
    }
}

pub async fn cancel_batch(State(state): State<AppState>, Path(batch_id): Path<u64>) -> ApiResult {
    if state.chats.coordinator().cancel_batch(batch_id).await {
        Ok(Json(json!({ "status": "cancelling", "batch_id": batch_id })))
    } else {
        Err(unknown_batch(batch_id))
    }
}

pub async fn batch_report(State(state): State<AppState>, Path(batch_id): Path<u64>) -> ApiResult {
    let coordinator = state.chats.coordinator();
    if let Some(report) = coordinator.batch_report(batch_id).await {
        return Ok(Json(json!({ "status": "finished", "report": report })));
    }
    if coordinator.batch_running(batch_id).await {
        return Ok(Json(json!({ "status": "running", "batch_id": batch_id })));
    }
    Err(unknown_batch(batch_id))
}

pub async fn export(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category: ExportCategory = category.parse().map_err(DomainError::InvalidRequest)?;
    let format: ExportFormat = match query.format.as_deref() {
        Some(f) => f.parse().map_err(DomainError::InvalidRequest)?,
        None => ExportFormat::default(),
    };
    let records = state.chats.records(category).await?;
    let body = ExportService::render(&records, format)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        ExportService::file_name(category, format)
    );
    info!(%category, %format, count = records.len(), "export served");
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub async fn logout(State(state): State<AppState>) -> ApiResult {
    state.chats.clear().await;
    state.chats.session().logout().await?;
    Ok(Json(json!({ "status": "logged_out" })))
}

pub async fn reset(State(state): State<AppState>) -> ApiResult {
    state.chats.clear().await;
    state.chats.session().reset().await?;
    Ok(Json(json!({ "status": "reset" })))
}

pub async fn shutdown(State(state): State<AppState>) -> Json<Value> {
    info!("shutdown requested over http");
    state.shutdown.cancel();
    Json(json!({ "status": "shutting_down" }))
}
