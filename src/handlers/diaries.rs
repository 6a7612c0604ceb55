use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::diary::{
    validate_diary_date, CreateDiaryRequest, Diary, DiaryQuery, ReplaceDiaryRequest,
};
use crate::services::DiarySaved;
use crate::AppState;

pub async fn create_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateDiaryRequest>,
) -> AppResult<(StatusCode, Json<DiarySaved>)> {
    body.validate()?;
    let saved = state.diaries.submit(auth_user.id, body).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn replace_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ReplaceDiaryRequest>,
) -> AppResult<Json<DiarySaved>> {
    body.validate()?;
    let saved = state.diaries.replace(auth_user.id, body).await?;
    Ok(Json(saved))
}

pub async fn list_diaries(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<DiaryQuery>,
) -> AppResult<Json<Vec<Diary>>> {
    if let Some(date) = &query.date {
        validate_diary_date(date)
            .map_err(|_| AppError::Validation("date must be YYYY-MM-DD".into()))?;
    }
    let diaries = state
        .diaries
        .list(auth_user.id, query.date.as_deref())
        .await?;
    Ok(Json(diaries))
}

pub async fn get_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Diary>> {
    let diary = state
        .diaries
        .get(auth_user.id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Diary not found".into()))?;
    Ok(Json(diary))
}

pub async fn delete_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    if !state.diaries.delete(auth_user.id, &id).await? {
        return Err(AppError::NotFound("Diary not found".into()));
    }
    Ok(Json(json!({ "deleted": true, "id": id })))
}
