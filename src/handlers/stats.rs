use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::services::stats::{self, OfficeStats};
use crate::AppState;

pub async fn office_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<OfficeStats>> {
    let diaries = state.diaries.list(auth_user.id, None).await?;
    let today = Utc::now().date_naive();
    Ok(Json(stats::office_stats(
        &diaries,
        today,
        &state.town.config().policy,
    )))
}
