use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::models::emotion::{Classification, EmotionCategory, ModelType, PolarityPair};
use crate::scoring::classifier::{EmotionClassifier, ScoringPipeline};
use crate::scoring::keywords;
use crate::scoring::normalizer::RawScore;
use crate::scoring::remap::{NativeLabel, NativeScores, RemapTable};
use crate::text::{contains_any, simple_tokenize};

/// Exported bag-of-words classifier: one weight row per label, softmax output.
#[derive(Debug, Deserialize)]
pub struct LinearTextModel {
    labels: Vec<String>,
    vocabulary: HashMap<String, usize>,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl LinearTextModel {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let model: LinearTextModel = serde_json::from_str(&raw)?;
        model.check_shape()?;
        Ok(model)
    }

    fn check_shape(&self) -> anyhow::Result<()> {
        let width = self.vocabulary.len();
        if self.labels.is_empty()
            || self.weights.len() != self.labels.len()
            || self.bias.len() != self.labels.len()
        {
            anyhow::bail!("model has mismatched label, weight and bias counts");
        }
        if self.weights.iter().any(|row| row.len() != width)
            || self.vocabulary.values().any(|idx| *idx >= width)
        {
            anyhow::bail!("model weight rows do not match vocabulary size {}", width);
        }
        Ok(())
    }

    pub fn predict_proba(&self, text: &str) -> HashMap<String, f64> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in simple_tokenize(text) {
            if let Some(idx) = self.vocabulary.get(&token) {
                *counts.entry(*idx).or_insert(0.0) += 1.0;
            }
        }

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| bias + counts.iter().map(|(idx, n)| row[*idx] * n).sum::<f64>())
            .collect();

        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();

        self.labels
            .iter()
            .cloned()
            .zip(exps.into_iter().map(|e| e / sum))
            .collect()
    }
}

/// Keyword cue for the heuristic fallback: any hit adds each boost once.
#[derive(Debug, Clone)]
pub struct HeuristicCue {
    pub keywords: &'static [&'static str],
    pub boosts: Vec<(NativeLabel, f64)>,
}

impl HeuristicCue {
    fn single(keywords: &'static [&'static str], label: NativeLabel, boost: f64) -> Self {
        Self {
            keywords,
            boosts: vec![(label, boost)],
        }
    }
}

pub fn default_cues() -> Vec<HeuristicCue> {
    use NativeLabel::*;

    vec![
        HeuristicCue::single(keywords::CUE_JOY, Joy, 0.7),
        HeuristicCue::single(keywords::CUE_ANXIETY, Anxiety, 0.6),
        HeuristicCue::single(keywords::CUE_ANGER, Anger, 0.65),
        HeuristicCue::single(keywords::CUE_SADNESS, Sadness, 0.65),
        HeuristicCue::single(keywords::CUE_EMBARRASSMENT, Embarrassment, 0.5),
        HeuristicCue::single(keywords::CUE_HURT, Hurt, 0.6),
        // fatigue reads as low mood plus some worry
        HeuristicCue {
            keywords: keywords::CUE_FATIGUE,
            boosts: vec![(Sadness, 0.6), (Anxiety, 0.4)],
        },
    ]
}

/// Native-label distribution from keyword cues. Empty when no cue matched.
pub fn heuristic_predict(text: &str, cues: &[HeuristicCue]) -> NativeScores {
    let lowered = text.to_lowercase();
    let mut scores = NativeScores::default();
    for cue in cues {
        if contains_any(&lowered, cue.keywords) {
            for (label, boost) in &cue.boosts {
                scores.add(*label, *boost);
            }
        }
    }
    scores
}

/// Local model when its artifact loads, keyword heuristic otherwise.
pub struct LocalClassifier {
    model_path: Option<PathBuf>,
    model: OnceLock<Option<Arc<LinearTextModel>>>,
    cues: Vec<HeuristicCue>,
    remap: RemapTable,
    pipeline: ScoringPipeline,
}

impl LocalClassifier {
    pub fn new(model_path: Option<PathBuf>, remap: RemapTable, pipeline: ScoringPipeline) -> Self {
        Self {
            model_path,
            model: OnceLock::new(),
            cues: default_cues(),
            remap,
            pipeline,
        }
    }

    /// Heuristic-only classifier.
    pub fn heuristic(pipeline: ScoringPipeline) -> Self {
        Self::new(None, RemapTable::default(), pipeline)
    }

    /// Loads the artifact on first use. A racing second load is harmless;
    /// `OnceLock` keeps whichever finished first.
    fn model(&self) -> Option<Arc<LinearTextModel>> {
        self.model
            .get_or_init(|| {
                let path = self.model_path.as_ref()?;
                match LinearTextModel::load(path) {
                    Ok(model) => {
                        tracing::info!(
                            path = %path.display(),
                            labels = model.labels.len(),
                            vocabulary = model.vocabulary.len(),
                            "Loaded local emotion model"
                        );
                        Some(Arc::new(model))
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Local emotion model unavailable, using heuristic fallback"
                        );
                        None
                    }
                }
            })
            .clone()
    }

    fn native_scores(&self, text: &str) -> (NativeScores, ModelType) {
        if let Some(model) = self.model() {
            let predicted: NativeScores = model
                .predict_proba(text)
                .into_iter()
                .filter_map(|(label, p)| label.parse::<NativeLabel>().ok().map(|l| (l, p)))
                .collect();
            if !predicted.is_empty() {
                return (predicted, ModelType::LocalModel);
            }
            tracing::debug!("Local model produced no known labels, using heuristic");
        }
        (heuristic_predict(text, &self.cues), ModelType::Heuristic)
    }
}

#[async_trait]
impl EmotionClassifier for LocalClassifier {
    async fn classify(&self, text: &str) -> Classification {
        if text.trim().is_empty() {
            return self.pipeline.finish(
                text,
                Vec::new(),
                PolarityPair::default(),
                ModelType::Heuristic,
            );
        }

        let (native, model_type) = self.native_scores(text);
        let target = self.remap.apply(&native, text);
        let total: f64 = target.iter().sum();

        let raw: Vec<(EmotionCategory, RawScore)> = if total > 0.0 {
            EmotionCategory::ALL
                .into_iter()
                .map(|c| (c, RawScore::Number(target[c.index()] / total * 100.0)))
                .collect()
        } else {
            Vec::new()
        };

        self.pipeline
            .finish(text, raw, PolarityPair::default(), model_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::normalizer::DEFAULT_DISTRIBUTION;
    use std::io::Write;

    fn heuristic() -> LocalClassifier {
        LocalClassifier::heuristic(ScoringPipeline::default())
    }

    #[tokio::test]
    async fn test_joyful_diary_is_joy_dominant() {
        let out = heuristic()
            .classify("오늘 정말 행복했다! 친구들과 즐거운 시간을 보냈어")
            .await;
        let scores = out.emotion_scores;
        assert_eq!(out.model_type, ModelType::Heuristic);
        assert_eq!(scores.dominant(), Some(EmotionCategory::Joy));
        assert!(scores.get(EmotionCategory::Sadness) <= scores.get(EmotionCategory::Joy));
        assert!(scores.get(EmotionCategory::Fear) <= scores.get(EmotionCategory::Joy));
        assert_eq!(scores.total(), 100);
    }

    #[tokio::test]
    async fn test_empty_diary_yields_default_distribution() {
        let out = heuristic().classify("").await;
        assert_eq!(out.emotion_scores.as_array(), DEFAULT_DISTRIBUTION);
        let out = heuristic().classify("   \n ").await;
        assert_eq!(out.emotion_scores.as_array(), DEFAULT_DISTRIBUTION);
    }

    #[tokio::test]
    async fn test_no_cues_yields_default_distribution() {
        let out = heuristic().classify("버스를 타고 출근했다").await;
        assert_eq!(out.emotion_scores.as_array(), DEFAULT_DISTRIBUTION);
    }

    #[tokio::test]
    async fn test_unsupported_categories_stay_zero() {
        let out = heuristic().classify("너무 화가 나고 짜증났다").await;
        let scores = out.emotion_scores;
        assert_eq!(scores.get(EmotionCategory::Anger), 100);
        assert_eq!(scores.get(EmotionCategory::Love), 0);
        assert_eq!(scores.get(EmotionCategory::Surprise), 0);
        assert_eq!(out.top_emotions, vec![EmotionCategory::Anger]);
    }

    #[tokio::test]
    async fn test_fatigue_feeds_sadness_and_fear() {
        let out = heuristic().classify("하루 종일 너무 피곤했다").await;
        let scores = out.emotion_scores;
        assert!(scores.get(EmotionCategory::Sadness) > 0);
        assert!(scores.get(EmotionCategory::Fear) > 0);
        assert_eq!(scores.get(EmotionCategory::Joy), 0);
    }

    #[tokio::test]
    async fn test_embarrassment_split_sets_polarity_from_rules() {
        let out = heuristic().classify("발표하다 실수해서 당황하고 창피했다").await;
        let scores = out.emotion_scores;
        assert!(scores.get(EmotionCategory::Shame) > 0);
        assert_eq!(out.emotion_polarity.shame, crate::models::emotion::Polarity::Negative);
    }

    #[tokio::test]
    async fn test_missing_artifact_falls_back_to_heuristic() {
        let classifier = LocalClassifier::new(
            Some(PathBuf::from("/nonexistent/moodtown-model.json")),
            RemapTable::default(),
            ScoringPipeline::default(),
        );
        let out = classifier.classify("정말 행복했다").await;
        assert_eq!(out.model_type, ModelType::Heuristic);
    }

    #[tokio::test]
    async fn test_loads_linear_model_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let artifact = serde_json::json!({
            "labels": ["기쁨", "당황", "분노", "불안", "슬픔"],
            "vocabulary": { "승진": 0, "회의": 1 },
            "weights": [
                [4.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 1.0],
                [0.0, 0.0]
            ],
            "bias": [0.0, 0.0, 0.0, 0.0, 0.0]
        });
        write!(file, "{}", artifact).unwrap();

        let classifier = LocalClassifier::new(
            Some(file.path().to_path_buf()),
            RemapTable::default(),
            ScoringPipeline::default(),
        );
        let out = classifier.classify("승진 소식").await;
        assert_eq!(out.model_type, ModelType::LocalModel);
        assert_eq!(out.emotion_scores.dominant(), Some(EmotionCategory::Joy));
        assert_eq!(out.emotion_scores.total(), 100);
    }

    #[test]
    fn test_rejects_misshapen_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"labels": ["기쁨"], "vocabulary": {{"a": 0}}, "weights": [[1.0, 2.0]], "bias": [0.0]}}"#
        )
        .unwrap();
        assert!(LinearTextModel::load(file.path()).is_err());
    }
}
