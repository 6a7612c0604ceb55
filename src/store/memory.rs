use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::diary::Diary;
use crate::models::letter::Letter;
use crate::models::town::{TreeState, WellState};

/// Failure injection for exercising degraded paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    None = 0,
    /// Every call fails.
    All = 1,
    /// Tree, well and fruit writes fail; everything else works.
    StateWrites = 2,
    /// Tree and well reads fail; everything else works.
    StateReads = 3,
    /// Only tree writes fail.
    TreeWrites = 4,
}

#[derive(Default)]
struct Tables {
    diaries: HashMap<String, Diary>,
    trees: HashMap<Uuid, TreeState>,
    wells: HashMap<Uuid, WellState>,
    fruits: HashMap<Uuid, i64>,
    letters: HashMap<String, Letter>,
}

/// In-process store used when no database is configured, and in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    fault: Arc<AtomicU8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fault(&self, mode: FaultMode) {
        self.fault.store(mode as u8, Ordering::SeqCst);
    }

    fn fault(&self) -> FaultMode {
        match self.fault.load(Ordering::SeqCst) {
            1 => FaultMode::All,
            2 => FaultMode::StateWrites,
            3 => FaultMode::StateReads,
            4 => FaultMode::TreeWrites,
            _ => FaultMode::None,
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.fault() == FaultMode::All {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn check_state_write(&self) -> StoreResult<()> {
        self.check()?;
        if self.fault() == FaultMode::StateWrites {
            return Err(StoreError::Unavailable("injected state write failure".into()));
        }
        Ok(())
    }

    fn check_tree_write(&self) -> StoreResult<()> {
        self.check_state_write()?;
        if self.fault() == FaultMode::TreeWrites {
            return Err(StoreError::Unavailable("injected tree write failure".into()));
        }
        Ok(())
    }

    fn check_state_read(&self) -> StoreResult<()> {
        self.check()?;
        if self.fault() == FaultMode::StateReads {
            return Err(StoreError::Unavailable("injected state read failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn save_diary(&self, diary: &Diary) -> StoreResult<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.diaries.get(&diary.id) {
            if existing.user_id != diary.user_id {
                return Err(StoreError::Conflict(format!(
                    "diary id {} is already in use",
                    diary.id
                )));
            }
        }
        tables.diaries.insert(diary.id.clone(), diary.clone());
        Ok(())
    }

    async fn get_diary(&self, user_id: Uuid, id: &str) -> StoreResult<Option<Diary>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .diaries
            .get(id)
            .filter(|d| d.user_id == user_id)
            .cloned())
    }

    async fn list_diaries(&self, user_id: Uuid) -> StoreResult<Vec<Diary>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut diaries: Vec<Diary> = tables
            .diaries
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        diaries.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(diaries)
    }

    async fn diaries_by_date(&self, user_id: Uuid, date: &str) -> StoreResult<Vec<Diary>> {
        Ok(self
            .list_diaries(user_id)
            .await?
            .into_iter()
            .filter(|d| d.date == date)
            .collect())
    }

    async fn delete_diary(&self, user_id: Uuid, id: &str) -> StoreResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let owned = tables
            .diaries
            .get(id)
            .map(|d| d.user_id == user_id)
            .unwrap_or(false);
        if owned {
            tables.diaries.remove(id);
        }
        Ok(owned)
    }

    async fn delete_other_diaries_on_date(
        &self,
        user_id: Uuid,
        date: &str,
        keep_id: &str,
    ) -> StoreResult<u64> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let before = tables.diaries.len();
        tables
            .diaries
            .retain(|id, d| !(d.user_id == user_id && d.date == date && id != keep_id));
        Ok((before - tables.diaries.len()) as u64)
    }

    async fn get_tree(&self, user_id: Uuid) -> StoreResult<Option<TreeState>> {
        self.check_state_read()?;
        Ok(self.tables.read().await.trees.get(&user_id).cloned())
    }

    async fn update_tree(
        &self,
        user_id: Uuid,
        f: &(dyn Fn(TreeState) -> TreeState + Send + Sync),
    ) -> StoreResult<TreeState> {
        self.check_state_read()?;
        self.check_tree_write()?;
        let mut tables = self.tables.write().await;
        let tree = f(tables.trees.get(&user_id).cloned().unwrap_or_default());
        tables.trees.insert(user_id, tree.clone());
        Ok(tree)
    }

    async fn get_well(&self, user_id: Uuid) -> StoreResult<Option<WellState>> {
        self.check_state_read()?;
        Ok(self.tables.read().await.wells.get(&user_id).cloned())
    }

    async fn update_well(
        &self,
        user_id: Uuid,
        f: &(dyn Fn(WellState) -> WellState + Send + Sync),
    ) -> StoreResult<WellState> {
        self.check_state_read()?;
        self.check_state_write()?;
        let mut tables = self.tables.write().await;
        let well = f(tables.wells.get(&user_id).cloned().unwrap_or_default());
        tables.wells.insert(user_id, well.clone());
        Ok(well)
    }

    async fn get_fruit_count(&self, user_id: Uuid) -> StoreResult<i64> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .fruits
            .get(&user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn add_fruit(&self, user_id: Uuid) -> StoreResult<i64> {
        self.check_state_write()?;
        let mut tables = self.tables.write().await;
        let count = tables.fruits.entry(user_id).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn create_letter(&self, letter: &Letter) -> StoreResult<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables.letters.insert(letter.id.clone(), letter.clone());
        Ok(())
    }

    async fn list_letters(&self, user_id: Uuid) -> StoreResult<Vec<Letter>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut letters: Vec<Letter> = tables
            .letters
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        letters.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(letters)
    }

    async fn mark_letter_read(&self, user_id: Uuid, id: &str) -> StoreResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        match tables.letters.get_mut(id) {
            Some(letter) if letter.user_id == user_id => {
                letter.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_letter(&self, user_id: Uuid, id: &str) -> StoreResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let owned = tables
            .letters
            .get(id)
            .map(|l| l.user_id == user_id)
            .unwrap_or(false);
        if owned {
            tables.letters.remove(id);
        }
        Ok(owned)
    }

    async fn count_unread_letters(&self, user_id: Uuid) -> StoreResult<i64> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .letters
            .values()
            .filter(|l| l.user_id == user_id && !l.is_read)
            .count() as i64)
    }
}
