use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::diary::validate_diary_date;

/// A letter from one of the emotion residents. Stored and listed only;
/// generation lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Letter {
    pub id: String,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub from_character: String,
    #[serde(rename = "type")]
    pub letter_type: String,
    pub date: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLetterRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Letter content must be 1-5000 characters"))]
    pub content: String,
    #[validate(length(min = 1, max = 32))]
    pub from_character: String,
    #[serde(rename = "type", default = "default_letter_type")]
    pub letter_type: String,
    #[validate(custom = "validate_diary_date")]
    pub date: String,
}

fn default_letter_type() -> String {
    "normal".into()
}

impl CreateLetterRequest {
    pub fn into_letter(self, user_id: Uuid, now: DateTime<Utc>) -> Letter {
        Letter {
            id: Uuid::new_v4().to_string(),
            user_id,
            title: self.title,
            content: self.content,
            from_character: self.from_character,
            letter_type: self.letter_type,
            date: self.date,
            is_read: false,
            created_at: now,
        }
    }
}
