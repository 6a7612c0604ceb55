use async_trait::async_trait;
use uuid::Uuid;

use crate::models::diary::Diary;
use crate::models::letter::Letter;
use crate::models::town::{TreeState, WellState};

mod memory;
mod postgres;

pub use memory::{FaultMode, MemoryStore};
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record id is taken by another user.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Record store behind diaries, town state and letters.
///
/// State getters return `Ok(None)` for users that have never written one;
/// callers decide what a fresh state looks like. State updates are atomic
/// read-modify-write steps, serialized per user across every process that
/// shares the store.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// Inserts, or replaces the caller's record with the same id. An id owned
    /// by another user is a [`StoreError::Conflict`] and nothing is written.
    async fn save_diary(&self, diary: &Diary) -> StoreResult<()>;
    async fn get_diary(&self, user_id: Uuid, id: &str) -> StoreResult<Option<Diary>>;
    /// Newest first.
    async fn list_diaries(&self, user_id: Uuid) -> StoreResult<Vec<Diary>>;
    async fn diaries_by_date(&self, user_id: Uuid, date: &str) -> StoreResult<Vec<Diary>>;
    /// Returns whether a record was removed.
    async fn delete_diary(&self, user_id: Uuid, id: &str) -> StoreResult<bool>;
    /// Removes every record on `date` except `keep_id`. Returns how many went.
    async fn delete_other_diaries_on_date(
        &self,
        user_id: Uuid,
        date: &str,
        keep_id: &str,
    ) -> StoreResult<u64>;

    async fn get_tree(&self, user_id: Uuid) -> StoreResult<Option<TreeState>>;
    /// Stores `f(current)`, starting from a default tree for new users.
    async fn update_tree(
        &self,
        user_id: Uuid,
        f: &(dyn Fn(TreeState) -> TreeState + Send + Sync),
    ) -> StoreResult<TreeState>;
    async fn get_well(&self, user_id: Uuid) -> StoreResult<Option<WellState>>;
    /// Stores `f(current)`, starting from a default well for new users.
    async fn update_well(
        &self,
        user_id: Uuid,
        f: &(dyn Fn(WellState) -> WellState + Send + Sync),
    ) -> StoreResult<WellState>;

    async fn get_fruit_count(&self, user_id: Uuid) -> StoreResult<i64>;
    /// Adds one fruit and returns the new count.
    async fn add_fruit(&self, user_id: Uuid) -> StoreResult<i64>;

    async fn create_letter(&self, letter: &Letter) -> StoreResult<()>;
    /// Newest first.
    async fn list_letters(&self, user_id: Uuid) -> StoreResult<Vec<Letter>>;
    async fn mark_letter_read(&self, user_id: Uuid, id: &str) -> StoreResult<bool>;
    async fn delete_letter(&self, user_id: Uuid, id: &str) -> StoreResult<bool>;
    async fn count_unread_letters(&self, user_id: Uuid) -> StoreResult<i64>;
}
