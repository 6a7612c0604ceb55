use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::diary::{new_diary_id, CreateDiaryRequest, Diary, ReplaceDiaryRequest};
use crate::models::emotion::{Classification, EmotionScores};
use crate::models::town::{TreeState, WellState};
use crate::scoring::EmotionClassifier;
use crate::store::{Store, StoreResult};
use crate::town::{Gauge, GaugeState, TownEngine};

/// Result of a diary write. `town_updated` is false when the diary was saved
/// but a tree or well update failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiarySaved {
    pub diary: Diary,
    pub tree: Option<TreeState>,
    pub well: Option<WellState>,
    pub town_updated: bool,
}

#[derive(Debug, Clone, Default)]
struct TownEffect {
    tree: Option<TreeState>,
    well: Option<WellState>,
    ok: bool,
}

/// Diary writes and their side effects on the town. The diary record is the
/// source of truth: its save errors are returned, town errors are only logged.
#[derive(Clone)]
pub struct DiaryService {
    store: Arc<dyn Store>,
    classifier: Arc<dyn EmotionClassifier>,
    town: TownEngine,
    compensate_on_delete: bool,
}

impl DiaryService {
    pub fn new(
        store: Arc<dyn Store>,
        classifier: Arc<dyn EmotionClassifier>,
        town: TownEngine,
        compensate_on_delete: bool,
    ) -> Self {
        Self {
            store,
            classifier,
            town,
            compensate_on_delete,
        }
    }

    pub async fn analyze(&self, text: &str) -> Classification {
        self.classifier.classify(text).await
    }

    pub async fn get(&self, user_id: Uuid, id: &str) -> StoreResult<Option<Diary>> {
        self.store.get_diary(user_id, id).await
    }

    pub async fn list(&self, user_id: Uuid, date: Option<&str>) -> StoreResult<Vec<Diary>> {
        match date {
            Some(date) => self.store.diaries_by_date(user_id, date).await,
            None => self.store.list_diaries(user_id).await,
        }
    }

    async fn build(&self, user_id: Uuid, req: CreateDiaryRequest) -> Diary {
        let now = Utc::now();

        // Supplied scores are taken as-is; only unscored diaries are classified.
        let (emotion_scores, emotion_polarity, top_emotions, model_type) =
            match req.emotion_scores {
                Some(scores) => (
                    scores,
                    req.emotion_polarity.unwrap_or_default().masked(&scores),
                    scores.ranked(),
                    None,
                ),
                None => {
                    let c = self.classifier.classify(&req.content).await;
                    let polarity = c.emotion_polarity.masked(&c.emotion_scores);
                    (c.emotion_scores, polarity, c.top_emotions, Some(c.model_type))
                }
            };

        Diary {
            id: req.id.unwrap_or_else(|| new_diary_id(now)),
            user_id,
            date: req.date,
            title: req.title,
            content: req.content,
            emotion_scores: Some(emotion_scores),
            emotion_polarity,
            top_emotions,
            model_type,
            created_at: now,
            updated_at: None,
        }
    }

    /// Saves the diary and returns the record it overwrote, if any.
    async fn persist(
        &self,
        user_id: Uuid,
        req: CreateDiaryRequest,
    ) -> StoreResult<(Diary, Option<Diary>)> {
        let diary = self.build(user_id, req).await;
        let previous = self.store.get_diary(user_id, &diary.id).await?;
        self.store.save_diary(&diary).await?;

        tracing::info!(
            %user_id,
            diary_id = %diary.id,
            date = %diary.date,
            model_type = ?diary.model_type,
            "Diary saved"
        );
        Ok((diary, previous))
    }

    /// Undoes the superseded entries, then applies the saved one.
    async fn settle(&self, user_id: Uuid, diary: Diary, superseded: &[&Diary]) -> DiarySaved {
        let mut compensated = true;
        for old in superseded {
            compensated &= self.compensate(user_id, &old.scores_or_zero()).await;
        }
        let effect = self.apply(user_id, &diary.scores_or_zero()).await;
        DiarySaved {
            diary,
            tree: effect.tree,
            well: effect.well,
            town_updated: effect.ok && compensated,
        }
    }

    pub async fn submit(&self, user_id: Uuid, req: CreateDiaryRequest) -> StoreResult<DiarySaved> {
        // Re-submitting an existing id overwrites it, so its old contribution goes too.
        let (diary, previous) = self.persist(user_id, req).await?;
        let superseded: Vec<&Diary> = previous.iter().collect();
        Ok(self.settle(user_id, diary, &superseded).await)
    }

    /// Replaces every diary on `req.date` with `req.new_diary`, undoing the old
    /// entries' town contributions before applying the new one.
    ///
    /// The new entry is saved before the old ones are deleted, so a failed save
    /// leaves the date as it was.
    pub async fn replace(
        &self,
        user_id: Uuid,
        req: ReplaceDiaryRequest,
    ) -> StoreResult<DiarySaved> {
        let old = self.store.diaries_by_date(user_id, &req.date).await?;

        let mut new_diary = req.new_diary;
        new_diary.date = req.date.clone();
        let (diary, previous) = self.persist(user_id, new_diary).await?;

        let mut superseded: Vec<&Diary> = previous.iter().collect();
        let deleted = self
            .store
            .delete_other_diaries_on_date(user_id, &req.date, &diary.id)
            .await;
        let removed = match deleted {
            Ok(removed) => removed,
            Err(e) => {
                // the old entries are still there; only the new one's effect lands
                self.settle(user_id, diary, &superseded).await;
                return Err(e);
            }
        };
        tracing::info!(%user_id, date = %req.date, removed, "Replaced diaries for date");

        superseded.extend(old.iter().filter(|d| d.id != diary.id));
        Ok(self.settle(user_id, diary, &superseded).await)
    }

    /// Returns false when no such diary exists for the user.
    pub async fn delete(&self, user_id: Uuid, id: &str) -> StoreResult<bool> {
        let Some(diary) = self.store.get_diary(user_id, id).await? else {
            return Ok(false);
        };
        if !self.store.delete_diary(user_id, id).await? {
            return Ok(false);
        }
        if self.compensate_on_delete {
            self.compensate(user_id, &diary.scores_or_zero()).await;
        }
        tracing::info!(%user_id, diary_id = %id, "Diary deleted");
        Ok(true)
    }

    async fn apply(&self, user_id: Uuid, scores: &EmotionScores) -> TownEffect {
        let mut effect = TownEffect {
            ok: true,
            ..Default::default()
        };
        for gauge in [Gauge::Tree, Gauge::Well] {
            match self.town.apply_entry(gauge, user_id, scores).await {
                Ok(Some(GaugeState::Tree(tree))) => effect.tree = Some(tree),
                Ok(Some(GaugeState::Well(well))) => effect.well = Some(well),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(%user_id, ?gauge, error = %e, "Failed to update town state");
                    effect.ok = false;
                }
            }
        }
        effect
    }

    async fn compensate(&self, user_id: Uuid, scores: &EmotionScores) -> bool {
        let mut ok = true;
        for gauge in [Gauge::Tree, Gauge::Well] {
            if let Err(e) = self.town.compensate_entry(gauge, user_id, scores).await {
                tracing::error!(%user_id, ?gauge, error = %e, "Failed to compensate town state");
                ok = false;
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::emotion::EmotionCategory::*;
    use crate::models::emotion::{ModelType, Polarity, PolarityPair};
    use crate::scoring::{LocalClassifier, ScoringPipeline};
    use crate::store::{FaultMode, MemoryStore, StoreError};
    use crate::town::TownConfig;

    fn setup(compensate_on_delete: bool) -> (DiaryService, MemoryStore, TownEngine) {
        let store = MemoryStore::new();
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let town = TownEngine::new(shared.clone(), TownConfig::default());
        let classifier = Arc::new(LocalClassifier::heuristic(ScoringPipeline::default()));
        let service = DiaryService::new(shared, classifier, town.clone(), compensate_on_delete);
        (service, store, town)
    }

    fn request(date: &str, content: &str, scores: Option<EmotionScores>) -> CreateDiaryRequest {
        CreateDiaryRequest {
            id: None,
            date: date.into(),
            title: "오늘".into(),
            content: content.into(),
            emotion_scores: scores,
            emotion_polarity: None,
        }
    }

    #[tokio::test]
    async fn test_submit_then_replace_restores_tree() {
        let (service, _, town) = setup(true);
        let user = Uuid::new_v4();

        let first = EmotionScores::from_pairs([(Joy, 60), (Love, 20), (Surprise, 20)]);
        let saved = service
            .submit(user, request("2026-03-01", "좋은 하루", Some(first)))
            .await
            .unwrap();
        assert!(saved.town_updated);
        assert_eq!(saved.tree.as_ref().map(|t| (t.growth, t.stage)), Some((80, 1)));
        assert_eq!(saved.diary.emotion_scores, Some(first));

        let flat = EmotionScores::from_pairs([(Surprise, 100)]);
        let replaced = service
            .replace(
                user,
                ReplaceDiaryRequest {
                    date: "2026-03-01".into(),
                    new_diary: request("2026-03-01", "다시 쓴 하루", Some(flat)),
                },
            )
            .await
            .unwrap();
        assert!(replaced.town_updated);

        let tree = town.get_tree(user).await;
        assert_eq!((tree.growth, tree.stage), (0, 0));
        let left = service.list(user, Some("2026-03-01")).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].content, "다시 쓴 하루");
    }

    #[tokio::test]
    async fn test_unscored_diary_is_classified() {
        let (service, _, town) = setup(true);
        let user = Uuid::new_v4();
        let saved = service
            .submit(
                user,
                request("2026-03-02", "오늘 정말 행복했다! 친구들과 즐거운 시간을 보냈어", None),
            )
            .await
            .unwrap();
        let diary = saved.diary;
        assert_eq!(diary.model_type, Some(ModelType::Heuristic));
        assert_eq!(diary.top_emotions.first(), Some(&Joy));
        assert_eq!(town.get_tree(user).await.growth, 100);
        assert_eq!(saved.well, None);
    }

    #[tokio::test]
    async fn test_town_failure_does_not_fail_save() {
        let (service, store, _) = setup(true);
        let user = Uuid::new_v4();
        let sad = EmotionScores::from_pairs([(Sadness, 100)]);
        store.set_fault(FaultMode::StateWrites);

        let saved = service
            .submit(
                user,
                request("2026-03-03", "힘든 하루", Some(sad)),
            )
            .await
            .unwrap();
        assert!(!saved.town_updated);
        assert!(service.get(user, &saved.diary.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_primary_save_failure_is_reported() {
        let (service, store, _) = setup(true);
        store.set_fault(FaultMode::All);
        let result = service
            .submit(Uuid::new_v4(), request("2026-03-04", "내용", None))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_compensation_is_configurable() {
        let scores = EmotionScores::from_pairs([(Anger, 70), (Joy, 30)]);

        let (service, _, town) = setup(true);
        let user = Uuid::new_v4();
        let saved = service
            .submit(user, request("2026-03-05", "화남", Some(scores)))
            .await
            .unwrap();
        assert!(service.delete(user, &saved.diary.id).await.unwrap());
        assert_eq!(town.get_well(user).await.water_level, 0);
        assert_eq!(town.get_tree(user).await.growth, 0);
        assert!(!service.delete(user, &saved.diary.id).await.unwrap());

        let (keeping, _, town) = setup(false);
        let saved = keeping
            .submit(user, request("2026-03-05", "화남", Some(scores)))
            .await
            .unwrap();
        assert!(keeping.delete(user, &saved.diary.id).await.unwrap());
        assert_eq!(town.get_well(user).await.water_level, 70);
    }

    #[tokio::test]
    async fn test_replace_compensates_every_entry_on_the_date() {
        let (service, _, town) = setup(true);
        let user = Uuid::new_v4();
        let sad = EmotionScores::from_pairs([(Sadness, 100)]);
        service.submit(user, request("2026-03-06", "a", Some(sad))).await.unwrap();
        service.submit(user, request("2026-03-06", "b", Some(sad))).await.unwrap();
        service.submit(user, request("2026-03-07", "c", Some(sad))).await.unwrap();
        assert_eq!(town.get_well(user).await.water_level, 300);

        let mixed = EmotionScores::from_pairs([(Fear, 40), (Joy, 60)]);
        service
            .replace(
                user,
                ReplaceDiaryRequest {
                    date: "2026-03-06".into(),
                    new_diary: request("2026-03-06", "d", Some(mixed)),
                },
            )
            .await
            .unwrap();
        assert_eq!(town.get_well(user).await.water_level, 140);
        assert_eq!(service.list(user, None).await.unwrap().len(), 2);
    }

    fn with_id(id: &str, mut req: CreateDiaryRequest) -> CreateDiaryRequest {
        req.id = Some(id.into());
        req
    }

    #[tokio::test]
    async fn test_diary_id_taken_by_another_user_is_rejected() {
        let (service, _, town) = setup(true);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let sad = EmotionScores::from_pairs([(Sadness, 100)]);
        let joy = EmotionScores::from_pairs([(Joy, 100)]);

        service
            .submit(alice, with_id("shared", request("2026-03-08", "alice", Some(sad))))
            .await
            .unwrap();
        let result = service
            .submit(bob, with_id("shared", request("2026-03-08", "bob", Some(joy))))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let kept = service.get(alice, "shared").await.unwrap().unwrap();
        assert_eq!(kept.content, "alice");
        assert!(service.get(bob, "shared").await.unwrap().is_none());
        assert_eq!(town.get_well(alice).await.water_level, 100);
        assert_eq!(town.get_tree(bob).await.growth, 0);
    }

    #[tokio::test]
    async fn test_failed_replacement_keeps_the_old_entries() {
        let (service, _, town) = setup(true);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let sad = EmotionScores::from_pairs([(Sadness, 100)]);
        service
            .submit(alice, with_id("taken", request("2026-03-09", "a", Some(sad))))
            .await
            .unwrap();
        service.submit(bob, request("2026-03-09", "b", Some(sad))).await.unwrap();

        let result = service
            .replace(
                bob,
                ReplaceDiaryRequest {
                    date: "2026-03-09".into(),
                    new_diary: with_id("taken", request("2026-03-09", "c", None)),
                },
            )
            .await;
        assert!(result.is_err());

        let left = service.list(bob, Some("2026-03-09")).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].content, "b");
        assert_eq!(town.get_well(bob).await.water_level, 100);
    }

    #[tokio::test]
    async fn test_replace_with_same_id_counts_the_old_entry_once() {
        let (service, _, town) = setup(true);
        let user = Uuid::new_v4();
        let sad = EmotionScores::from_pairs([(Sadness, 100)]);
        let calm = EmotionScores::from_pairs([(Sadness, 30), (Joy, 70)]);
        service
            .submit(user, with_id("d1", request("2026-03-10", "a", Some(sad))))
            .await
            .unwrap();

        service
            .replace(
                user,
                ReplaceDiaryRequest {
                    date: "2026-03-10".into(),
                    new_diary: with_id("d1", request("2026-03-10", "b", Some(calm))),
                },
            )
            .await
            .unwrap();
        assert_eq!(town.get_well(user).await.water_level, 30);
        assert_eq!(service.list(user, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_supplied_polarity_is_dropped_for_absent_categories() {
        let (service, _, _) = setup(true);
        let mut req = request(
            "2026-03-11",
            "그냥 기쁜 날",
            Some(EmotionScores::from_pairs([(Joy, 80), (Shame, 20)])),
        );
        req.emotion_polarity = Some(PolarityPair {
            surprise: Polarity::Positive,
            shame: Polarity::Negative,
        });
        let saved = service.submit(Uuid::new_v4(), req).await.unwrap();
        assert_eq!(saved.diary.emotion_polarity.surprise, Polarity::Unknown);
        assert_eq!(saved.diary.emotion_polarity.shame, Polarity::Negative);
    }
}
