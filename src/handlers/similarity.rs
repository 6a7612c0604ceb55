use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::emotion::EmotionScores;
use crate::similarity::{BestMatches, SearchOptions, SimilarityQuery, SimilarityResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SimilarParams {
    pub limit: Option<usize>,
    pub min_similarity: Option<f64>,
    pub exclude_same_date: Option<bool>,
    pub exclude_date: Option<String>,
}

impl SimilarParams {
    fn options(&self) -> AppResult<SearchOptions> {
        let defaults = SearchOptions::default();
        let limit = self.limit.unwrap_or(defaults.limit);
        if !(1..=50).contains(&limit) {
            return Err(AppError::Validation("limit must be between 1 and 50".into()));
        }
        let min_similarity = self.min_similarity.unwrap_or(defaults.min_similarity);
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(AppError::Validation(
                "min_similarity must be between 0 and 1".into(),
            ));
        }
        Ok(SearchOptions {
            limit,
            min_similarity,
            exclude_date: self.exclude_date.clone(),
            exclude_same_date: self.exclude_same_date.unwrap_or(defaults.exclude_same_date),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SimilarTextRequest {
    pub text: String,
    pub emotion_scores: Option<EmotionScores>,
    #[serde(flatten)]
    pub params: SimilarParams,
}

#[derive(Debug, Deserialize)]
pub struct CompareTextsRequest {
    pub a: String,
    pub b: String,
}

fn unavailable() -> AppError {
    AppError::Unavailable("Similarity search is not configured".into())
}

pub async fn similar_to_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> AppResult<Json<Vec<SimilarityResult>>> {
    let options = params.options()?;
    state
        .similarity
        .find_similar(auth_user.id, &SimilarityQuery::Diary(id), &options)
        .await
        .map(Json)
        .ok_or_else(unavailable)
}

pub async fn best_matches_for_diary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> AppResult<Json<BestMatches>> {
    let options = params.options()?;
    state
        .similarity
        .best_of_each_axis(auth_user.id, &SimilarityQuery::Diary(id), &options)
        .await
        .map(Json)
        .ok_or_else(unavailable)
}

pub async fn similar_to_text(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<SimilarTextRequest>,
) -> AppResult<Json<Vec<SimilarityResult>>> {
    if body.text.trim().is_empty() {
        return Err(AppError::Validation("text must not be empty".into()));
    }
    let options = body.params.options()?;
    let query = SimilarityQuery::Text {
        text: body.text,
        emotion_scores: body.emotion_scores,
    };
    state
        .similarity
        .find_similar(auth_user.id, &query, &options)
        .await
        .map(Json)
        .ok_or_else(unavailable)
}

pub async fn compare_texts(
    State(state): State<AppState>,
    Json(body): Json<CompareTextsRequest>,
) -> AppResult<Json<Value>> {
    let similarity = state
        .similarity
        .text_similarity(&body.a, &body.b)
        .ok_or_else(unavailable)?;
    Ok(Json(json!({ "similarity": similarity })))
}
