use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::letter::{CreateLetterRequest, Letter, UnreadCount};
use crate::AppState;

pub async fn create_letter(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateLetterRequest>,
) -> AppResult<(StatusCode, Json<Letter>)> {
    body.validate()?;
    let letter = body.into_letter(auth_user.id, Utc::now());
    state.store.create_letter(&letter).await?;
    Ok((StatusCode::CREATED, Json(letter)))
}

pub async fn list_letters(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Letter>>> {
    Ok(Json(state.store.list_letters(auth_user.id).await?))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<UnreadCount>> {
    let count = state.store.count_unread_letters(auth_user.id).await?;
    Ok(Json(UnreadCount { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    if !state.store.mark_letter_read(auth_user.id, &id).await? {
        return Err(AppError::NotFound("Letter not found".into()));
    }
    Ok(Json(json!({ "id": id, "isRead": true })))
}

pub async fn delete_letter(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    if !state.store.delete_letter(auth_user.id, &id).await? {
        return Err(AppError::NotFound("Letter not found".into()));
    }
    Ok(Json(json!({ "deleted": true, "id": id })))
}
