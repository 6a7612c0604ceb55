use async_trait::async_trait;

use crate::models::emotion::{Classification, EmotionCategory, ModelType, PolarityPair};
use crate::scoring::normalizer::{RawScore, ScoreNormalizer};
use crate::scoring::polarity::PolarityResolver;

/// Scores a diary into the seven categories. Never fails: every degraded path
/// still returns a valid vector, tagged through `model_type`.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Classification;
}

/// Shared tail of every strategy: normalize, resolve polarity, rank.
#[derive(Debug, Clone, Default)]
pub struct ScoringPipeline {
    pub normalizer: ScoreNormalizer,
    pub polarity: PolarityResolver,
}

impl ScoringPipeline {
    pub fn new(normalizer: ScoreNormalizer, polarity: PolarityResolver) -> Self {
        Self {
            normalizer,
            polarity,
        }
    }

    pub fn finish<I>(
        &self,
        text: &str,
        raw: I,
        model_polarity: PolarityPair,
        model_type: ModelType,
    ) -> Classification
    where
        I: IntoIterator<Item = (EmotionCategory, RawScore)>,
    {
        let emotion_scores = self.normalizer.normalize(raw);
        let emotion_polarity = self.polarity.resolve(
            text,
            model_polarity,
            emotion_scores.get(EmotionCategory::Surprise),
            emotion_scores.get(EmotionCategory::Shame),
        );

        Classification {
            top_emotions: emotion_scores.ranked(),
            emotion_scores,
            emotion_polarity,
            model_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::normalizer::DEFAULT_DISTRIBUTION;

    #[test]
    fn test_finish_with_no_signal_uses_default_distribution() {
        let pipeline = ScoringPipeline::default();
        let out = pipeline.finish("", Vec::new(), PolarityPair::default(), ModelType::Fallback);
        assert_eq!(out.emotion_scores.as_array(), DEFAULT_DISTRIBUTION);
        assert_eq!(out.top_emotions.len(), 7);
        assert_eq!(out.top_emotions[0], EmotionCategory::Joy);
        assert_eq!(out.model_type, ModelType::Fallback);
    }
}
