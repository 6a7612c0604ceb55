//! Similar-diary search: text-embedding cosine blended with emotion-profile
//! cosine, then penalized when the emotional tone disagrees.

use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::diary::Diary;
use crate::models::emotion::{EmotionCategory, EmotionScores};
use crate::store::Store;
use crate::text::preview;

mod embedder;

pub use embedder::{cosine_similarity, FileEmbedder, TextEmbedder, WordVectors};

#[derive(Debug, Clone)]
pub struct SimilarityWeights {
    pub text_weight: f64,
    pub emotion_weight: f64,
    /// Emotion similarity used when either side has no scores.
    pub missing_emotion_similarity: f64,
    pub emotion_floor: f64,
    /// Per point of emotion similarity below the floor.
    pub emotion_penalty: f64,
    pub opposite_valence_factor: f64,
    /// A side has a valence only when its positive or negative sum exceeds this.
    pub valence_threshold: u32,
    pub preview_chars: usize,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            text_weight: 0.5,
            emotion_weight: 0.5,
            missing_emotion_similarity: 0.5,
            emotion_floor: 0.4,
            emotion_penalty: 1.5,
            opposite_valence_factor: 0.6,
            valence_threshold: 50,
            preview_chars: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub min_similarity: f64,
    /// Also skip entries on this date (raw-text queries have no date of their own).
    pub exclude_date: Option<String>,
    /// Skip entries written on the query diary's date.
    pub exclude_same_date: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            min_similarity: 0.3,
            exclude_date: None,
            exclude_same_date: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SimilarityQuery {
    Diary(String),
    Text {
        text: String,
        emotion_scores: Option<EmotionScores>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub diary_id: String,
    pub date: String,
    pub title: String,
    pub preview: String,
    pub text_similarity: f64,
    pub emotion_similarity: f64,
    pub combined_similarity: f64,
    pub emotion_scores: Option<EmotionScores>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisMatch {
    #[serde(flatten)]
    pub result: SimilarityResult,
    /// False when this is only the best available candidate below the floor.
    pub meets_threshold: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestMatches {
    pub by_text: Option<AxisMatch>,
    pub by_emotion: Option<AxisMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Valence {
    Positive,
    Negative,
}

struct ResolvedQuery {
    vector: Vec<f32>,
    scores: Option<EmotionScores>,
    exclude_id: Option<String>,
    exclude_dates: Vec<String>,
}

pub struct SimilarityIndex {
    store: Arc<dyn Store>,
    embedder: Arc<dyn TextEmbedder>,
    weights: SimilarityWeights,
}

impl SimilarityIndex {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn TextEmbedder>,
        weights: SimilarityWeights,
    ) -> Self {
        Self {
            store,
            embedder,
            weights,
        }
    }

    pub fn is_available(&self) -> bool {
        self.embedder.is_available()
    }

    /// Top matches by combined similarity. `None` means the embedding model is
    /// unavailable; any other failure yields an empty list.
    pub async fn find_similar(
        &self,
        user_id: Uuid,
        query: &SimilarityQuery,
        options: &SearchOptions,
    ) -> Option<Vec<SimilarityResult>> {
        let mut scored = self.score_candidates(user_id, query, options).await?;
        scored.retain(|r| r.combined_similarity >= options.min_similarity);
        scored.sort_by(|a, b| desc(a.combined_similarity, b.combined_similarity));
        scored.truncate(options.limit);
        Some(scored)
    }

    /// Best text match and best emotion match, each reported even when it falls
    /// below `min_similarity`.
    pub async fn best_of_each_axis(
        &self,
        user_id: Uuid,
        query: &SimilarityQuery,
        options: &SearchOptions,
    ) -> Option<BestMatches> {
        let scored = self.score_candidates(user_id, query, options).await?;

        let pick = |key: fn(&SimilarityResult) -> f64| {
            scored
                .iter()
                .max_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal))
                .map(|best| AxisMatch {
                    meets_threshold: key(best) >= options.min_similarity,
                    result: best.clone(),
                })
        };

        Some(BestMatches {
            by_text: pick(|r| r.text_similarity),
            by_emotion: pick(|r| r.emotion_similarity),
        })
    }

    /// Cosine similarity of two raw texts. `None` when the model is unavailable.
    pub fn text_similarity(&self, a: &str, b: &str) -> Option<f64> {
        let va = self.embedder.embed(a)?;
        let vb = self.embedder.embed(b)?;
        Some(f64::from(cosine_similarity(&va, &vb)))
    }

    async fn resolve(
        &self,
        user_id: Uuid,
        query: &SimilarityQuery,
        options: &SearchOptions,
    ) -> Option<ResolvedQuery> {
        let mut exclude_dates: Vec<String> = options.exclude_date.iter().cloned().collect();
        let (text, scores, exclude_id) = match query {
            SimilarityQuery::Diary(id) => {
                let diary = match self.store.get_diary(user_id, id).await {
                    Ok(Some(diary)) => diary,
                    Ok(None) => {
                        tracing::debug!(%user_id, diary_id = %id, "Query diary not found");
                        return None;
                    }
                    Err(e) => {
                        tracing::warn!(%user_id, error = %e, "Failed to load query diary");
                        return None;
                    }
                };
                if options.exclude_same_date {
                    exclude_dates.push(diary.date.clone());
                }
                (diary.content, diary.emotion_scores, Some(diary.id))
            }
            SimilarityQuery::Text {
                text,
                emotion_scores,
            } => (text.clone(), *emotion_scores, None),
        };

        let vector = self.embedder.embed(&text)?;
        Some(ResolvedQuery {
            vector,
            scores,
            exclude_id,
            exclude_dates,
        })
    }

    /// Every eligible candidate, scored. Outer `None` only for an unavailable model.
    async fn score_candidates(
        &self,
        user_id: Uuid,
        query: &SimilarityQuery,
        options: &SearchOptions,
    ) -> Option<Vec<SimilarityResult>> {
        if !self.embedder.is_available() {
            tracing::info!(%user_id, "Similarity model unavailable");
            return None;
        }

        let Some(resolved) = self.resolve(user_id, query, options).await else {
            return Some(Vec::new());
        };

        let corpus = match self.store.list_diaries(user_id).await {
            Ok(corpus) => corpus,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Failed to load similarity corpus");
                return Some(Vec::new());
            }
        };

        let results = corpus
            .into_iter()
            .filter(|d| resolved.exclude_id.as_deref() != Some(d.id.as_str()))
            .filter(|d| !resolved.exclude_dates.contains(&d.date))
            .filter_map(|d| self.score_one(&resolved, d))
            .collect();
        Some(results)
    }

    fn score_one(&self, query: &ResolvedQuery, candidate: Diary) -> Option<SimilarityResult> {
        let Some(vector) = self.embedder.embed(&candidate.content) else {
            tracing::debug!(diary_id = %candidate.id, "Skipping candidate that failed to embed");
            return None;
        };

        let text_similarity = f64::from(cosine_similarity(&query.vector, &vector));
        let emotion_similarity =
            self.emotion_similarity(query.scores.as_ref(), candidate.emotion_scores.as_ref());
        let combined_similarity = self.combine(
            text_similarity,
            emotion_similarity,
            query.scores.as_ref(),
            candidate.emotion_scores.as_ref(),
        );

        Some(SimilarityResult {
            preview: preview(&candidate.content, self.weights.preview_chars),
            diary_id: candidate.id,
            date: candidate.date,
            title: candidate.title,
            text_similarity,
            emotion_similarity,
            combined_similarity,
            emotion_scores: candidate.emotion_scores,
        })
    }

    pub fn emotion_similarity(&self, a: Option<&EmotionScores>, b: Option<&EmotionScores>) -> f64 {
        match (a, b) {
            (Some(a), Some(b)) => {
                let va: Vec<f32> = a.as_array().iter().map(|v| *v as f32 / 100.0).collect();
                let vb: Vec<f32> = b.as_array().iter().map(|v| *v as f32 / 100.0).collect();
                f64::from(cosine_similarity(&va, &vb))
            }
            _ => self.weights.missing_emotion_similarity,
        }
    }

    /// Weighted blend with the low-emotion penalty and the opposite-valence
    /// damping, clamped to `[0, 1]`.
    pub fn combine(
        &self,
        text_similarity: f64,
        emotion_similarity: f64,
        query_scores: Option<&EmotionScores>,
        candidate_scores: Option<&EmotionScores>,
    ) -> f64 {
        let w = &self.weights;
        let mut combined = w.text_weight * text_similarity + w.emotion_weight * emotion_similarity;

        if emotion_similarity < w.emotion_floor {
            let penalty = (w.emotion_floor - emotion_similarity) * w.emotion_penalty;
            combined = (combined - penalty).max(0.0);
        }

        let opposite = match (
            query_scores.and_then(|s| self.valence(s)),
            candidate_scores.and_then(|s| self.valence(s)),
        ) {
            (Some(q), Some(c)) => q != c,
            _ => false,
        };
        if opposite {
            combined *= w.opposite_valence_factor;
        }

        combined.clamp(0.0, 1.0)
    }

    fn valence(&self, scores: &EmotionScores) -> Option<Valence> {
        use EmotionCategory::*;
        let positive = scores.sum_of(&[Joy, Love]);
        let negative = scores.sum_of(&[Anger, Sadness, Fear]);
        if positive > self.weights.valence_threshold {
            Some(Valence::Positive)
        } else if negative > self.weights.valence_threshold {
            Some(Valence::Negative)
        } else {
            None
        }
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
