use axum::{extract::State, Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::diary::validate_diary_date;
use crate::models::town::{
    FruitCount, HarvestOutcome, SubtractRequest, TreeView, WellState, WellView,
};
use crate::town::Gauge;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DateRequest {
    pub date: Option<String>,
}

fn date_or_today(date: Option<String>) -> AppResult<String> {
    match date {
        Some(date) => {
            validate_diary_date(&date)
                .map_err(|_| AppError::Validation("date must be YYYY-MM-DD".into()))?;
            Ok(date)
        }
        None => Ok(Utc::now().date_naive().format("%Y-%m-%d").to_string()),
    }
}

fn check_amount(body: &SubtractRequest) -> AppResult<()> {
    if body.amount < 0 {
        return Err(AppError::Validation("Amount must not be negative".into()));
    }
    Ok(())
}

pub async fn get_tree(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Json<TreeView> {
    Json(state.town.tree_view(auth_user.id).await)
}

pub async fn subtract_tree(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<SubtractRequest>,
) -> AppResult<Json<TreeView>> {
    check_amount(&body)?;
    state.town.subtract(Gauge::Tree, auth_user.id, body.amount).await?;
    Ok(Json(state.town.tree_view(auth_user.id).await))
}

pub async fn fruit_count(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Json<FruitCount> {
    Json(FruitCount {
        count: state.town.fruit_count(auth_user.id).await,
    })
}

pub async fn harvest_fruit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<DateRequest>,
) -> AppResult<Json<HarvestOutcome>> {
    let date = date_or_today(body.date)?;
    state
        .town
        .harvest_fruit(auth_user.id, &date)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Conflict("The tree is not fully grown yet".into()))
}

pub async fn get_well(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Json<WellView> {
    Json(state.town.well_view(auth_user.id).await)
}

pub async fn subtract_well(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<SubtractRequest>,
) -> AppResult<Json<WellView>> {
    check_amount(&body)?;
    state.town.subtract(Gauge::Well, auth_user.id, body.amount).await?;
    Ok(Json(state.town.well_view(auth_user.id).await))
}

pub async fn reset_well(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<WellState>> {
    Ok(Json(state.town.reset_well(auth_user.id).await?))
}

pub async fn mark_overflow(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<DateRequest>,
) -> AppResult<Json<WellState>> {
    let date = date_or_today(body.date)?;
    Ok(Json(state.town.mark_overflow(auth_user.id, &date).await?))
}
