//! Per-user happiness tree and stress well.
//!
//! Both gauges are accumulators whose stage is a pure function of the
//! accumulator. Reads never fail (a broken store reads as a fresh user);
//! writes report their failure so callers can decide whether it matters.
//! Every write is one atomic store update, so concurrent requests for the
//! same user never lose a delta, whichever process serves them.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::emotion::EmotionScores;
use crate::models::town::{HarvestOutcome, TreeState, TreeView, WellState, WellView};
use crate::store::{Store, StoreResult};

mod stages;

pub use stages::{
    ContributionPolicy, StageTable, TREE_THRESHOLDS, WELL_OVERFLOW_LEVEL, WELL_THRESHOLDS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gauge {
    Tree,
    Well,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GaugeState {
    Tree(TreeState),
    Well(WellState),
}

#[derive(Debug, Clone)]
pub struct TownConfig {
    pub tree_stages: StageTable,
    pub well_stages: StageTable,
    pub overflow_level: i64,
    pub policy: ContributionPolicy,
    /// Water drained from the well when a fruit is harvested.
    pub harvest_well_relief: i64,
}

impl Default for TownConfig {
    fn default() -> Self {
        Self {
            tree_stages: StageTable::tree(),
            well_stages: StageTable::well(),
            overflow_level: WELL_OVERFLOW_LEVEL,
            policy: ContributionPolicy::default(),
            harvest_well_relief: 50,
        }
    }
}

#[derive(Clone)]
pub struct TownEngine {
    store: Arc<dyn Store>,
    config: Arc<TownConfig>,
}

impl TownEngine {
    pub fn new(store: Arc<dyn Store>, config: TownConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TownConfig {
        &self.config
    }

    fn derive_tree(&self, mut tree: TreeState) -> TreeState {
        tree.growth = tree.growth.max(0);
        tree.stage = self.config.tree_stages.stage_for(tree.growth);
        tree
    }

    fn derive_well(&self, mut well: WellState) -> WellState {
        well.water_level = well.water_level.max(0);
        well.stage = self.config.well_stages.stage_for(well.water_level);
        well.is_overflowing = well.water_level >= self.config.overflow_level;
        well
    }

    // ── reads ────────────────────────────────────────────────────────────

    pub async fn get_tree(&self, user_id: Uuid) -> TreeState {
        match self.store.get_tree(user_id).await {
            Ok(Some(stored)) => {
                let derived = self.derive_tree(stored.clone());
                if derived == stored {
                    return derived;
                }
                tracing::warn!(
                    %user_id,
                    growth = derived.growth,
                    stored_stage = stored.stage,
                    stage = derived.stage,
                    "Correcting drifted tree state"
                );
                let fix = |t: TreeState| self.derive_tree(t);
                match self.store.update_tree(user_id, &fix).await {
                    Ok(tree) => tree,
                    Err(e) => {
                        tracing::error!(%user_id, error = %e, "Failed to persist tree correction");
                        derived
                    }
                }
            }
            Ok(None) => TreeState::default(),
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Tree read failed, using empty state");
                TreeState::default()
            }
        }
    }

    pub async fn get_well(&self, user_id: Uuid) -> WellState {
        match self.store.get_well(user_id).await {
            Ok(Some(stored)) => {
                let derived = self.derive_well(stored.clone());
                if derived == stored {
                    return derived;
                }
                tracing::warn!(
                    %user_id,
                    water_level = derived.water_level,
                    stored_stage = stored.stage,
                    stage = derived.stage,
                    "Correcting drifted well state"
                );
                let fix = |w: WellState| self.derive_well(w);
                match self.store.update_well(user_id, &fix).await {
                    Ok(well) => well,
                    Err(e) => {
                        tracing::error!(%user_id, error = %e, "Failed to persist well correction");
                        derived
                    }
                }
            }
            Ok(None) => WellState::default(),
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "Well read failed, using empty state");
                WellState::default()
            }
        }
    }

    pub async fn tree_view(&self, user_id: Uuid) -> TreeView {
        let state = self.get_tree(user_id).await;
        let stages = &self.config.tree_stages;
        TreeView {
            progress: stages.progress(state.growth),
            points_to_next_stage: stages.points_to_next(state.growth),
            state,
        }
    }

    pub async fn well_view(&self, user_id: Uuid) -> WellView {
        let state = self.get_well(user_id).await;
        let capacity = self.config.overflow_level.max(1) as f64;
        let fill = (state.water_level as f64 / capacity * 100.0).min(100.0);
        WellView {
            fill_percent: stages::round1(fill),
            state,
        }
    }

    pub async fn fruit_count(&self, user_id: Uuid) -> i64 {
        self.store.get_fruit_count(user_id).await.unwrap_or_else(|e| {
            tracing::warn!(%user_id, error = %e, "Fruit count read failed");
            0
        })
    }

    // ── writes ───────────────────────────────────────────────────────────
    //
    // Writes read strictly inside the store update: a failed read must not be
    // mistaken for an empty gauge and then written back over the real one.

    async fn write_tree_delta(&self, user_id: Uuid, delta: i64) -> StoreResult<TreeState> {
        let grow = |mut tree: TreeState| {
            tree.growth = tree.growth.saturating_add(delta);
            self.derive_tree(tree)
        };
        self.store.update_tree(user_id, &grow).await
    }

    async fn write_well_delta(&self, user_id: Uuid, delta: i64) -> StoreResult<WellState> {
        let fill = |mut well: WellState| {
            well.water_level = well.water_level.saturating_add(delta);
            self.derive_well(well)
        };
        let well = self.store.update_well(user_id, &fill).await?;
        // an unclamped result means the level before was exactly `level - delta`
        let was_overflowing = well.water_level.saturating_sub(delta) >= self.config.overflow_level;
        if well.is_overflowing && !was_overflowing {
            tracing::info!(%user_id, water_level = well.water_level, "Stress well overflowed");
        }
        Ok(well)
    }

    /// `accumulator = max(0, accumulator + delta)`, stage re-derived.
    pub async fn apply_delta(
        &self,
        gauge: Gauge,
        user_id: Uuid,
        delta: i64,
    ) -> StoreResult<GaugeState> {
        match gauge {
            Gauge::Tree => self
                .write_tree_delta(user_id, delta)
                .await
                .map(GaugeState::Tree),
            Gauge::Well => self
                .write_well_delta(user_id, delta)
                .await
                .map(GaugeState::Well),
        }
    }

    pub fn contribution(&self, gauge: Gauge, scores: &EmotionScores) -> i64 {
        match gauge {
            Gauge::Tree => self.config.policy.tree_points(scores),
            Gauge::Well => self.config.policy.well_points(scores),
        }
    }

    /// Adds an entry's contribution. `Ok(None)` when it contributes nothing
    /// and no write happened.
    pub async fn apply_entry(
        &self,
        gauge: Gauge,
        user_id: Uuid,
        scores: &EmotionScores,
    ) -> StoreResult<Option<GaugeState>> {
        let points = self.contribution(gauge, scores);
        if points == 0 {
            return Ok(None);
        }
        self.apply_delta(gauge, user_id, points).await.map(Some)
    }

    /// Undoes an earlier [`apply_entry`](Self::apply_entry) of the same scores.
    pub async fn compensate_entry(
        &self,
        gauge: Gauge,
        user_id: Uuid,
        old_scores: &EmotionScores,
    ) -> StoreResult<Option<GaugeState>> {
        let points = self.contribution(gauge, old_scores);
        if points == 0 {
            return Ok(None);
        }
        self.apply_delta(gauge, user_id, -points).await.map(Some)
    }

    pub async fn subtract(
        &self,
        gauge: Gauge,
        user_id: Uuid,
        amount: i64,
    ) -> StoreResult<GaugeState> {
        self.apply_delta(gauge, user_id, -amount.max(0)).await
    }

    /// Empties the well. The last overflow date is kept.
    pub async fn reset_well(&self, user_id: Uuid) -> StoreResult<WellState> {
        let empty = |mut well: WellState| {
            well.water_level = 0;
            self.derive_well(well)
        };
        self.store.update_well(user_id, &empty).await
    }

    pub async fn mark_overflow(&self, user_id: Uuid, date: &str) -> StoreResult<WellState> {
        let stamp = |well: WellState| {
            let mut well = self.derive_well(well);
            well.last_overflow_date = Some(date.to_string());
            well
        };
        self.store.update_well(user_id, &stamp).await
    }

    /// Picks the fruit of a fully grown tree: replants the tree, then bumps the
    /// fruit counter and drains some water from the well. `Ok(None)` when the
    /// tree is not at its last stage.
    ///
    /// The tree is replanted first, so a failed write can lose a fruit but
    /// never award the same grown tree twice.
    pub async fn harvest_fruit(
        &self,
        user_id: Uuid,
        date: &str,
    ) -> StoreResult<Option<HarvestOutcome>> {
        let max_stage = self.config.tree_stages.max_stage();
        let picked = AtomicBool::new(false);
        let replant = |tree: TreeState| {
            let tree = self.derive_tree(tree);
            if tree.stage < max_stage {
                return tree;
            }
            picked.store(true, Ordering::SeqCst);
            self.derive_tree(TreeState {
                growth: 0,
                stage: 0,
                last_fruit_date: Some(date.to_string()),
            })
        };
        let tree = self.store.update_tree(user_id, &replant).await?;
        if !picked.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let fruit_count = self.store.add_fruit(user_id).await.map_err(|e| {
            tracing::error!(%user_id, error = %e, "Tree replanted but fruit was not counted");
            e
        })?;
        tracing::info!(%user_id, fruit_count, "Happy fruit harvested");

        let well = if self.config.harvest_well_relief > 0 {
            match self
                .write_well_delta(user_id, -self.config.harvest_well_relief)
                .await
            {
                Ok(well) => Some(well),
                Err(e) => {
                    tracing::error!(%user_id, error = %e, "Failed to relieve well after harvest");
                    None
                }
            }
        } else {
            None
        };

        Ok(Some(HarvestOutcome {
            fruit_count,
            tree,
            well,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::emotion::EmotionCategory::*;
    use crate::store::{FaultMode, MemoryStore};

    fn engine() -> (TownEngine, MemoryStore) {
        let store = MemoryStore::new();
        let engine = TownEngine::new(Arc::new(store.clone()), TownConfig::default());
        (engine, store)
    }

    fn scores(pairs: &[(crate::models::emotion::EmotionCategory, u32)]) -> EmotionScores {
        EmotionScores::from_pairs(pairs.iter().copied())
    }

    #[tokio::test]
    async fn test_fresh_user_reads_zeroed_state() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        assert_eq!(engine.get_tree(user).await, TreeState::default());
        assert_eq!(engine.get_well(user).await, WellState::default());
    }

    #[tokio::test]
    async fn test_large_negative_deltas_floor_at_zero() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine.apply_delta(Gauge::Tree, user, 30).await.unwrap();
        for _ in 0..3 {
            engine.apply_delta(Gauge::Tree, user, -10_000).await.unwrap();
        }
        let tree = engine.get_tree(user).await;
        assert_eq!(tree.growth, 0);
        assert_eq!(tree.stage, 0);

        engine.apply_delta(Gauge::Well, user, i64::MIN).await.unwrap();
        assert_eq!(engine.get_well(user).await.water_level, 0);
    }

    #[tokio::test]
    async fn test_compensation_is_exact_undo() {
        let e1 = scores(&[(Joy, 45), (Love, 25), (Anger, 10), (Sadness, 20)]);
        let e2 = scores(&[(Joy, 15), (Fear, 50), (Sadness, 35)]);

        let (replaced, _) = engine();
        let user = Uuid::new_v4();
        for gauge in [Gauge::Tree, Gauge::Well] {
            replaced.apply_entry(gauge, user, &e1).await.unwrap();
            replaced.compensate_entry(gauge, user, &e1).await.unwrap();
            replaced.apply_entry(gauge, user, &e2).await.unwrap();
        }

        let (direct, _) = engine();
        let other = Uuid::new_v4();
        for gauge in [Gauge::Tree, Gauge::Well] {
            direct.apply_entry(gauge, other, &e2).await.unwrap();
        }

        assert_eq!(replaced.get_tree(user).await, direct.get_tree(other).await);
        assert_eq!(replaced.get_well(user).await, direct.get_well(other).await);
    }

    #[tokio::test]
    async fn test_submit_then_replace_with_zero_joy() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let first = scores(&[(Joy, 60), (Love, 20), (Surprise, 20)]);

        let state = engine.apply_entry(Gauge::Tree, user, &first).await.unwrap();
        assert_eq!(
            state,
            Some(GaugeState::Tree(TreeState {
                growth: 80,
                stage: 1,
                last_fruit_date: None
            }))
        );

        let replacement = scores(&[(Surprise, 100)]);
        engine.compensate_entry(Gauge::Tree, user, &first).await.unwrap();
        assert_eq!(engine.apply_entry(Gauge::Tree, user, &replacement).await.unwrap(), None);

        let tree = engine.get_tree(user).await;
        assert_eq!(tree.growth, 0);
        assert_eq!(tree.stage, 0);
    }

    #[tokio::test]
    async fn test_zero_contribution_skips_write() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        store.set_fault(FaultMode::StateWrites);
        let joyful = scores(&[(Joy, 100)]);
        // would error if it tried to write
        assert_eq!(engine.apply_entry(Gauge::Well, user, &joyful).await.unwrap(), None);
        assert_eq!(engine.compensate_entry(Gauge::Well, user, &joyful).await.unwrap(), None);
        assert!(engine.apply_entry(Gauge::Tree, user, &joyful).await.is_err());
    }

    #[tokio::test]
    async fn test_read_failure_yields_default_and_write_failure_is_reported() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        engine.apply_delta(Gauge::Tree, user, 150).await.unwrap();

        store.set_fault(FaultMode::StateReads);
        assert_eq!(engine.get_tree(user).await, TreeState::default());
        // a failed read must not be written back as zero
        assert!(engine.apply_delta(Gauge::Tree, user, 10).await.is_err());

        store.set_fault(FaultMode::None);
        assert_eq!(engine.get_tree(user).await.growth, 150);
    }

    #[tokio::test]
    async fn test_drifted_stage_is_corrected_and_persisted() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        let drifted_tree = |_: TreeState| TreeState {
            growth: 230,
            stage: 0,
            last_fruit_date: None,
        };
        store.update_tree(user, &drifted_tree).await.unwrap();
        let drifted_well = |_: WellState| WellState {
            water_level: 520,
            stage: 1,
            is_overflowing: false,
            last_overflow_date: None,
        };
        store.update_well(user, &drifted_well).await.unwrap();

        assert_eq!(engine.get_tree(user).await.stage, 3);
        assert_eq!(store.get_tree(user).await.unwrap().unwrap().stage, 3);

        let well = engine.get_well(user).await;
        assert_eq!(well.stage, 5);
        assert!(well.is_overflowing);
        assert!(store.get_well(user).await.unwrap().unwrap().is_overflowing);
    }

    #[tokio::test]
    async fn test_well_overflow_tracks_level() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine.apply_delta(Gauge::Well, user, 499).await.unwrap();
        assert!(!engine.get_well(user).await.is_overflowing);
        engine.apply_delta(Gauge::Well, user, 1).await.unwrap();
        assert!(engine.get_well(user).await.is_overflowing);
        engine.apply_delta(Gauge::Well, user, 300).await.unwrap();
        assert_eq!(engine.get_well(user).await.water_level, 800);
        engine.subtract(Gauge::Well, user, 301).await.unwrap();
        assert!(!engine.get_well(user).await.is_overflowing);
    }

    #[tokio::test]
    async fn test_reset_well_keeps_overflow_date() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine.apply_delta(Gauge::Well, user, 600).await.unwrap();
        engine.mark_overflow(user, "2026-03-02").await.unwrap();
        let well = engine.reset_well(user).await.unwrap();
        assert_eq!(well.water_level, 0);
        assert!(!well.is_overflowing);
        assert_eq!(well.last_overflow_date.as_deref(), Some("2026-03-02"));
    }

    #[tokio::test]
    async fn test_harvest_requires_full_tree() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine.apply_delta(Gauge::Tree, user, 599).await.unwrap();
        assert!(engine.harvest_fruit(user, "2026-03-03").await.unwrap().is_none());

        engine.apply_delta(Gauge::Tree, user, 1).await.unwrap();
        engine.apply_delta(Gauge::Well, user, 120).await.unwrap();
        let outcome = engine.harvest_fruit(user, "2026-03-03").await.unwrap().unwrap();
        assert_eq!(outcome.fruit_count, 1);
        assert_eq!(outcome.tree.growth, 0);
        assert_eq!(outcome.tree.last_fruit_date.as_deref(), Some("2026-03-03"));
        assert_eq!(outcome.well.map(|w| w.water_level), Some(70));
        assert_eq!(engine.fruit_count(user).await, 1);
    }

    #[tokio::test]
    async fn test_failed_replant_awards_no_fruit() {
        let (engine, store) = engine();
        let user = Uuid::new_v4();
        engine.apply_delta(Gauge::Tree, user, 600).await.unwrap();

        store.set_fault(FaultMode::TreeWrites);
        assert!(engine.harvest_fruit(user, "2026-03-04").await.is_err());

        store.set_fault(FaultMode::None);
        assert_eq!(engine.fruit_count(user).await, 0);
        assert_eq!(engine.get_tree(user).await.growth, 600);

        let outcome = engine.harvest_fruit(user, "2026-03-04").await.unwrap().unwrap();
        assert_eq!(outcome.fruit_count, 1);
        // the replanted tree cannot be picked again
        assert!(engine.harvest_fruit(user, "2026-03-04").await.unwrap().is_none());
        assert_eq!(engine.fruit_count(user).await, 1);
    }

    #[tokio::test]
    async fn test_views_report_progress() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        engine.apply_delta(Gauge::Tree, user, 70).await.unwrap();
        engine.apply_delta(Gauge::Well, user, 125).await.unwrap();

        let tree = engine.tree_view(user).await;
        assert_eq!(tree.state.stage, 1);
        assert_eq!(tree.progress, 50.0);
        assert_eq!(tree.points_to_next_stage, 30);

        let well = engine.well_view(user).await;
        assert_eq!(well.fill_percent, 25.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deltas_for_one_user_are_not_lost() {
        let (engine, _) = engine();
        let user = Uuid::new_v4();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.apply_delta(Gauge::Tree, user, 3).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(engine.get_tree(user).await.growth, 150);
    }
}
