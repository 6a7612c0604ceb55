use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The seven emotion categories scored for every diary.
///
/// Declaration order is the tie-breaking order used throughout scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    #[serde(alias = "기쁨")]
    Joy,
    #[serde(alias = "사랑")]
    Love,
    #[serde(alias = "놀람")]
    Surprise,
    #[serde(alias = "두려움")]
    Fear,
    #[serde(alias = "분노")]
    Anger,
    #[serde(alias = "부끄러움")]
    Shame,
    #[serde(alias = "슬픔")]
    Sadness,
}

impl EmotionCategory {
    pub const ALL: [EmotionCategory; 7] = [
        EmotionCategory::Joy,
        EmotionCategory::Love,
        EmotionCategory::Surprise,
        EmotionCategory::Fear,
        EmotionCategory::Anger,
        EmotionCategory::Shame,
        EmotionCategory::Sadness,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionCategory::Joy => "joy",
            EmotionCategory::Love => "love",
            EmotionCategory::Surprise => "surprise",
            EmotionCategory::Fear => "fear",
            EmotionCategory::Anger => "anger",
            EmotionCategory::Shame => "shame",
            EmotionCategory::Sadness => "sadness",
        }
    }

    /// Korean name used by the residents and by older stored records.
    pub fn korean_name(self) -> &'static str {
        match self {
            EmotionCategory::Joy => "기쁨",
            EmotionCategory::Love => "사랑",
            EmotionCategory::Surprise => "놀람",
            EmotionCategory::Fear => "두려움",
            EmotionCategory::Anger => "분노",
            EmotionCategory::Shame => "부끄러움",
            EmotionCategory::Sadness => "슬픔",
        }
    }
}

impl fmt::Display for EmotionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        EmotionCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed) || c.korean_name() == trimmed)
            .ok_or_else(|| format!("unknown emotion category: {}", s))
    }
}

/// Per-category integer scores in `[0, 100]`.
///
/// Vectors produced by the normalizer always sum to exactly 100. Vectors
/// supplied by callers (e.g. a client that already scored its diary) are only
/// clamped, so the town engine can work with whatever the entry recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "ScoreMap", into = "ScoreMap")]
pub struct EmotionScores {
    values: [u32; 7],
}

impl EmotionScores {
    pub fn from_array(values: [u32; 7]) -> Self {
        Self {
            values: values.map(|v| v.min(100)),
        }
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (EmotionCategory, u32)>,
    {
        let mut values = [0u32; 7];
        for (category, score) in pairs {
            values[category.index()] = score;
        }
        Self::from_array(values)
    }

    pub fn get(&self, category: EmotionCategory) -> u32 {
        self.values[category.index()]
    }

    pub fn set(&mut self, category: EmotionCategory, score: u32) {
        self.values[category.index()] = score.min(100);
    }

    pub fn as_array(&self) -> [u32; 7] {
        self.values
    }

    pub fn total(&self) -> u32 {
        self.values.iter().sum()
    }

    pub fn sum_of(&self, categories: &[EmotionCategory]) -> u32 {
        categories.iter().map(|c| self.get(*c)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionCategory, u32)> + '_ {
        EmotionCategory::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    /// Non-zero categories, highest score first. Ties keep category order.
    pub fn ranked(&self) -> Vec<EmotionCategory> {
        let mut ranked: Vec<(EmotionCategory, u32)> =
            self.iter().filter(|(_, score)| *score > 0).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().map(|(c, _)| c).collect()
    }

    /// Highest-scoring category; the first one in category order wins ties.
    pub fn dominant(&self) -> Option<EmotionCategory> {
        self.ranked().first().copied()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScoreMap {
    #[serde(default, alias = "기쁨")]
    joy: u32,
    #[serde(default, alias = "사랑")]
    love: u32,
    #[serde(default, alias = "놀람")]
    surprise: u32,
    #[serde(default, alias = "두려움")]
    fear: u32,
    #[serde(default, alias = "분노")]
    anger: u32,
    #[serde(default, alias = "부끄러움")]
    shame: u32,
    #[serde(default, alias = "슬픔")]
    sadness: u32,
}

impl From<ScoreMap> for EmotionScores {
    fn from(m: ScoreMap) -> Self {
        EmotionScores::from_array([
            m.joy, m.love, m.surprise, m.fear, m.anger, m.shame, m.sadness,
        ])
    }
}

impl From<EmotionScores> for ScoreMap {
    fn from(s: EmotionScores) -> Self {
        let [joy, love, surprise, fear, anger, shame, sadness] = s.values;
        ScoreMap {
            joy,
            love,
            surprise,
            fear,
            anger,
            shame,
            sadness,
        }
    }
}

/// Whether a Surprise or Shame reading was pleasant or unpleasant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Polarity {
    /// Reads an upstream guess. Anything but a literal positive/negative is unknown.
    pub fn from_guess(guess: Option<&str>) -> Self {
        match guess.map(|g| g.trim().to_ascii_lowercase()) {
            Some(g) if g == "positive" => Polarity::Positive,
            Some(g) if g == "negative" => Polarity::Negative,
            _ => Polarity::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != Polarity::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolarityPair {
    #[serde(default, alias = "놀람")]
    pub surprise: Polarity,
    #[serde(default, alias = "부끄러움")]
    pub shame: Polarity,
}

impl PolarityPair {
    /// A tag only means something while its category is present: a zero
    /// score forces it back to unknown.
    pub fn masked(self, scores: &EmotionScores) -> Self {
        let keep = |category: EmotionCategory, polarity: Polarity| {
            if scores.get(category) == 0 {
                Polarity::Unknown
            } else {
                polarity
            }
        };
        Self {
            surprise: keep(EmotionCategory::Surprise, self.surprise),
            shame: keep(EmotionCategory::Shame, self.shame),
        }
    }
}

/// Which backend produced a classification. Fallback output has the same
/// shape as a real reading; this tag is how callers tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Llm,
    LocalModel,
    Heuristic,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub emotion_scores: EmotionScores,
    pub emotion_polarity: PolarityPair,
    pub top_emotions: Vec<EmotionCategory>,
    pub model_type: ModelType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parses_english_and_korean() {
        assert_eq!("Joy".parse::<EmotionCategory>(), Ok(EmotionCategory::Joy));
        assert_eq!("슬픔".parse::<EmotionCategory>(), Ok(EmotionCategory::Sadness));
        assert!("boredom".parse::<EmotionCategory>().is_err());
    }

    #[test]
    fn test_scores_serialize_with_all_seven_keys() {
        let scores = EmotionScores::from_pairs([(EmotionCategory::Joy, 60)]);
        let value = serde_json::to_value(scores).unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 7);
        assert_eq!(map["joy"], 60);
        assert_eq!(map["sadness"], 0);
    }

    #[test]
    fn test_scores_accept_korean_keys_from_older_records() {
        let scores: EmotionScores =
            serde_json::from_str(r#"{"기쁨": 40, "슬픔": 60}"#).unwrap();
        assert_eq!(scores.get(EmotionCategory::Joy), 40);
        assert_eq!(scores.get(EmotionCategory::Sadness), 60);
        assert_eq!(scores.get(EmotionCategory::Love), 0);
    }

    #[test]
    fn test_ranked_breaks_ties_by_category_order() {
        let scores = EmotionScores::from_array([30, 0, 30, 0, 40, 0, 0]);
        assert_eq!(
            scores.ranked(),
            vec![
                EmotionCategory::Anger,
                EmotionCategory::Joy,
                EmotionCategory::Surprise
            ]
        );
    }

    #[test]
    fn test_polarity_from_guess() {
        assert_eq!(Polarity::from_guess(Some("Positive")), Polarity::Positive);
        assert_eq!(Polarity::from_guess(Some("meh")), Polarity::Unknown);
        assert_eq!(Polarity::from_guess(None), Polarity::Unknown);
    }

    #[test]
    fn test_polarity_is_masked_for_absent_categories() {
        let tags = PolarityPair {
            surprise: Polarity::Positive,
            shame: Polarity::Negative,
        };
        let only_surprise = EmotionScores::from_pairs([
            (EmotionCategory::Surprise, 30),
            (EmotionCategory::Joy, 70),
        ]);
        let masked = tags.masked(&only_surprise);
        assert_eq!(masked.surprise, Polarity::Positive);
        assert_eq!(masked.shame, Polarity::Unknown);

        let neither = EmotionScores::from_pairs([(EmotionCategory::Joy, 100)]);
        assert_eq!(tags.masked(&neither), PolarityPair::default());
    }
}
