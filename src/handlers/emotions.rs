use axum::{extract::State, Json};
use validator::Validate;

use crate::error::AppResult;
use crate::models::diary::AnalyzeRequest;
use crate::models::emotion::Classification;
use crate::AppState;

/// Scores text without saving anything.
pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> AppResult<Json<Classification>> {
    body.validate()?;
    Ok(Json(state.diaries.analyze(&body.content).await))
}
