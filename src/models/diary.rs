use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::emotion::{EmotionCategory, EmotionScores, ModelType, PolarityPair};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diary {
    pub id: String,
    pub user_id: Uuid,
    pub date: String,
    pub title: String,
    pub content: String,
    /// Older records may predate scoring; absent is "unknown", not "all zero".
    pub emotion_scores: Option<EmotionScores>,
    #[serde(default)]
    pub emotion_polarity: PolarityPair,
    #[serde(default)]
    pub top_emotions: Vec<EmotionCategory>,
    pub model_type: Option<ModelType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Diary {
    /// Scores that feed the tree and well. Unscored entries contribute nothing.
    pub fn scores_or_zero(&self) -> EmotionScores {
        self.emotion_scores.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDiaryRequest {
    #[validate(length(min = 1, max = 64, message = "Diary id must be 1-64 characters"))]
    pub id: Option<String>,

    #[validate(custom = "validate_diary_date")]
    pub date: String,

    #[serde(default)]
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: String,

    #[validate(length(max = 20000, message = "Diary content is too long"))]
    pub content: String,

    /// Pre-computed scores. When absent the diary is classified on submit.
    pub emotion_scores: Option<EmotionScores>,
    pub emotion_polarity: Option<PolarityPair>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReplaceDiaryRequest {
    #[validate(custom = "validate_diary_date")]
    pub date: String,
    #[validate]
    pub new_diary: CreateDiaryRequest,
}

#[derive(Debug, Deserialize)]
pub struct DiaryQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    #[validate(length(max = 20000, message = "Diary content is too long"))]
    pub content: String,
}

/// Diary dates are calendar days in `YYYY-MM-DD` form.
pub fn validate_diary_date(date: &str) -> Result<(), ValidationError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ValidationError::new("date must be YYYY-MM-DD"))
}

/// Time-based id for diaries submitted without one.
pub fn new_diary_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_diary_date() {
        assert!(validate_diary_date("2024-03-01").is_ok());
        assert!(validate_diary_date("2024-13-01").is_err());
        assert!(validate_diary_date("yesterday").is_err());
    }

    #[test]
    fn test_create_request_rejects_bad_date() {
        let req = CreateDiaryRequest {
            id: None,
            date: "03/01/2024".into(),
            title: String::new(),
            content: "hello".into(),
            emotion_scores: None,
            emotion_polarity: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_new_diary_id_is_time_prefixed() {
        let now = Utc::now();
        let id = new_diary_id(now);
        assert!(id.starts_with(&now.timestamp_millis().to_string()));
        assert_ne!(id, new_diary_id(now));
    }
}
