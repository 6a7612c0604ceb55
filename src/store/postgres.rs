use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::diary::Diary;
use crate::models::emotion::{EmotionCategory, EmotionScores, ModelType, PolarityPair};
use crate::models::letter::Letter;
use crate::models::town::{TreeState, WellState};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }
}

#[derive(FromRow)]
struct DiaryRow {
    id: String,
    user_id: Uuid,
    date: String,
    title: String,
    content: String,
    emotion_scores: Option<Json<EmotionScores>>,
    emotion_polarity: Json<PolarityPair>,
    top_emotions: Json<Vec<EmotionCategory>>,
    model_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<DiaryRow> for Diary {
    fn from(row: DiaryRow) -> Self {
        Diary {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            title: row.title,
            content: row.content,
            emotion_scores: row.emotion_scores.map(|j| j.0),
            emotion_polarity: row.emotion_polarity.0,
            top_emotions: row.top_emotions.0,
            model_type: row.model_type.and_then(|m| {
                serde_json::from_value::<ModelType>(serde_json::Value::String(m)).ok()
            }),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TreeRow {
    growth: i64,
    stage: i16,
    last_fruit_date: Option<String>,
}

impl From<TreeRow> for TreeState {
    fn from(r: TreeRow) -> Self {
        TreeState {
            growth: r.growth,
            stage: r.stage.clamp(0, u8::MAX as i16) as u8,
            last_fruit_date: r.last_fruit_date,
        }
    }
}

#[derive(FromRow)]
struct WellRow {
    water_level: i64,
    stage: i16,
    is_overflowing: bool,
    last_overflow_date: Option<String>,
}

impl From<WellRow> for WellState {
    fn from(r: WellRow) -> Self {
        WellState {
            water_level: r.water_level,
            stage: r.stage.clamp(0, u8::MAX as i16) as u8,
            is_overflowing: r.is_overflowing,
            last_overflow_date: r.last_overflow_date,
        }
    }
}

#[derive(FromRow)]
struct LetterRow {
    id: String,
    user_id: Uuid,
    title: String,
    content: String,
    from_character: String,
    letter_type: String,
    date: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<LetterRow> for Letter {
    fn from(row: LetterRow) -> Self {
        Letter {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            content: row.content,
            from_character: row.from_character,
            letter_type: row.letter_type,
            date: row.date,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

fn model_type_text(model_type: Option<ModelType>) -> StoreResult<Option<String>> {
    Ok(match model_type {
        Some(m) => serde_json::to_value(m)?.as_str().map(str::to_string),
        None => None,
    })
}

const DIARY_COLUMNS: &str = "id, user_id, date, title, content, emotion_scores, emotion_polarity, \
     top_emotions, model_type, created_at, updated_at";

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.db)
            .await?;
        Ok(())
    }

    async fn save_diary(&self, diary: &Diary) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO diaries (id, user_id, date, title, content, emotion_scores,
                                 emotion_polarity, top_emotions, model_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                date = EXCLUDED.date,
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                emotion_scores = EXCLUDED.emotion_scores,
                emotion_polarity = EXCLUDED.emotion_polarity,
                top_emotions = EXCLUDED.top_emotions,
                model_type = EXCLUDED.model_type,
                updated_at = NOW()
            WHERE diaries.user_id = EXCLUDED.user_id
            "#,
        )
        .bind(&diary.id)
        .bind(diary.user_id)
        .bind(&diary.date)
        .bind(&diary.title)
        .bind(&diary.content)
        .bind(diary.emotion_scores.map(Json))
        .bind(Json(diary.emotion_polarity))
        .bind(Json(&diary.top_emotions))
        .bind(model_type_text(diary.model_type)?)
        .bind(diary.created_at)
        .bind(diary.updated_at)
        .execute(&self.db)
        .await?;
        // the guarded upsert touches nothing when the id belongs to someone else
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "diary id {} is already in use",
                diary.id
            )));
        }
        Ok(())
    }

    async fn get_diary(&self, user_id: Uuid, id: &str) -> StoreResult<Option<Diary>> {
        let row = sqlx::query_as::<_, DiaryRow>(&format!(
            "SELECT {} FROM diaries WHERE user_id = $1 AND id = $2",
            DIARY_COLUMNS
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Diary::from))
    }

    async fn list_diaries(&self, user_id: Uuid) -> StoreResult<Vec<Diary>> {
        let rows = sqlx::query_as::<_, DiaryRow>(&format!(
            "SELECT {} FROM diaries WHERE user_id = $1 ORDER BY date DESC, created_at DESC, id DESC",
            DIARY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Diary::from).collect())
    }

    async fn diaries_by_date(&self, user_id: Uuid, date: &str) -> StoreResult<Vec<Diary>> {
        let rows = sqlx::query_as::<_, DiaryRow>(&format!(
            "SELECT {} FROM diaries WHERE user_id = $1 AND date = $2 ORDER BY created_at DESC, id DESC",
            DIARY_COLUMNS
        ))
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Diary::from).collect())
    }

    async fn delete_diary(&self, user_id: Uuid, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM diaries WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_other_diaries_on_date(
        &self,
        user_id: Uuid,
        date: &str,
        keep_id: &str,
    ) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM diaries WHERE user_id = $1 AND date = $2 AND id <> $3")
                .bind(user_id)
                .bind(date)
                .bind(keep_id)
                .execute(&self.db)
                .await?;
        Ok(result.rows_affected())
    }

    async fn get_tree(&self, user_id: Uuid) -> StoreResult<Option<TreeState>> {
        let row = sqlx::query_as::<_, TreeRow>(
            "SELECT growth, stage, last_fruit_date FROM trees WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(TreeState::from))
    }

    async fn update_tree(
        &self,
        user_id: Uuid,
        f: &(dyn Fn(TreeState) -> TreeState + Send + Sync),
    ) -> StoreResult<TreeState> {
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT INTO trees (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let current = sqlx::query_as::<_, TreeRow>(
            "SELECT growth, stage, last_fruit_date FROM trees WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let tree = f(current.into());
        sqlx::query(
            r#"
            UPDATE trees
            SET growth = $2, stage = $3, last_fruit_date = $4, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(tree.growth)
        .bind(i16::from(tree.stage))
        .bind(&tree.last_fruit_date)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(tree)
    }

    async fn get_well(&self, user_id: Uuid) -> StoreResult<Option<WellState>> {
        let row = sqlx::query_as::<_, WellRow>(
            "SELECT water_level, stage, is_overflowing, last_overflow_date \
             FROM wells WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(WellState::from))
    }

    async fn update_well(
        &self,
        user_id: Uuid,
        f: &(dyn Fn(WellState) -> WellState + Send + Sync),
    ) -> StoreResult<WellState> {
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT INTO wells (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let current = sqlx::query_as::<_, WellRow>(
            "SELECT water_level, stage, is_overflowing, last_overflow_date \
             FROM wells WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let well = f(current.into());
        sqlx::query(
            r#"
            UPDATE wells
            SET water_level = $2, stage = $3, is_overflowing = $4,
                last_overflow_date = $5, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(well.water_level)
        .bind(i16::from(well.stage))
        .bind(well.is_overflowing)
        .bind(&well.last_overflow_date)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(well)
    }

    async fn get_fruit_count(&self, user_id: Uuid) -> StoreResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT count FROM happy_fruits WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;
        Ok(count.unwrap_or(0))
    }

    async fn add_fruit(&self, user_id: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO happy_fruits (user_id, count, updated_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (user_id) DO UPDATE
                SET count = happy_fruits.count + 1, updated_at = NOW()
            RETURNING count
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    async fn create_letter(&self, letter: &Letter) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO letters (id, user_id, title, content, from_character, letter_type, date, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&letter.id)
        .bind(letter.user_id)
        .bind(&letter.title)
        .bind(&letter.content)
        .bind(&letter.from_character)
        .bind(&letter.letter_type)
        .bind(&letter.date)
        .bind(letter.is_read)
        .bind(letter.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_letters(&self, user_id: Uuid) -> StoreResult<Vec<Letter>> {
        let rows = sqlx::query_as::<_, LetterRow>(
            r#"
            SELECT id, user_id, title, content, from_character, letter_type, date, is_read, created_at
            FROM letters
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Letter::from).collect())
    }

    async fn mark_letter_read(&self, user_id: Uuid, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE letters SET is_read = TRUE WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_letter(&self, user_id: Uuid, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM letters WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_unread_letters(&self, user_id: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM letters WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }
}
