use serde_json::Value;

use crate::models::emotion::{EmotionCategory, EmotionScores};

/// Baseline used whenever there is no usable signal at all.
/// Joy, Love, Surprise, Fear, Anger, Shame, Sadness.
pub const DEFAULT_DISTRIBUTION: [u32; 7] = [25, 20, 15, 10, 10, 10, 10];

/// Scores at or below this share are dropped by the optional low-score filter.
pub const LOW_SCORE_CUTOFF: u32 = 5;

/// A score as it arrived from upstream, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawScore {
    Number(f64),
    Text(String),
    Invalid,
}

impl RawScore {
    /// Float coercion followed by truncation. Anything that does not coerce is 0.
    pub fn to_int(&self) -> i64 {
        let value = match self {
            RawScore::Number(n) => *n,
            RawScore::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) => n,
                Err(_) => return 0,
            },
            RawScore::Invalid => return 0,
        };
        if value.is_finite() {
            value.trunc() as i64
        } else {
            0
        }
    }
}

impl From<f64> for RawScore {
    fn from(n: f64) -> Self {
        RawScore::Number(n)
    }
}

impl From<i64> for RawScore {
    fn from(n: i64) -> Self {
        RawScore::Number(n as f64)
    }
}

impl From<&str> for RawScore {
    fn from(s: &str) -> Self {
        RawScore::Text(s.to_string())
    }
}

impl From<&Value> for RawScore {
    fn from(v: &Value) -> Self {
        match v {
            Value::Number(n) => n.as_f64().map(RawScore::Number).unwrap_or(RawScore::Invalid),
            Value::String(s) => RawScore::Text(s.clone()),
            _ => RawScore::Invalid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    pub default_distribution: [u32; 7],
    /// When set, categories at or below the cutoff are zeroed and the
    /// survivors renormalized. Lossy, so off unless a strategy opts in.
    pub low_score_filter: Option<u32>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            default_distribution: DEFAULT_DISTRIBUTION,
            low_score_filter: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoreNormalizer {
    config: NormalizerConfig,
}

impl ScoreNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Turns any raw mapping into a clamped integer vector summing to 100.
    /// Categories missing from `raw` count as 0; a later duplicate key wins.
    pub fn normalize<I>(&self, raw: I) -> EmotionScores
    where
        I: IntoIterator<Item = (EmotionCategory, RawScore)>,
    {
        let mut working = [0i64; 7];
        for (category, score) in raw {
            working[category.index()] = score.to_int().clamp(0, 100);
        }

        if working.iter().sum::<i64>() == 0 {
            working = self.default_working();
        }

        let mut norm = rescale(working);

        if let Some(cutoff) = self.config.low_score_filter {
            let survivors = norm.map(|v| if v > i64::from(cutoff) { v } else { 0 });
            norm = if survivors.iter().sum::<i64>() == 0 {
                rescale(self.default_working())
            } else {
                rescale(survivors)
            };
        }

        EmotionScores::from_array(norm.map(|v| v.clamp(0, 100) as u32))
    }

    pub fn default_scores(&self) -> EmotionScores {
        EmotionScores::from_array(rescale(self.default_working()).map(|v| v as u32))
    }

    fn default_working(&self) -> [i64; 7] {
        self.config.default_distribution.map(i64::from)
    }
}

/// Scales a non-zero vector to sum to 100, pushing the rounding remainder onto
/// the first largest category. Rounding is half-to-even.
fn rescale(working: [i64; 7]) -> [i64; 7] {
    let total: i64 = working.iter().sum();
    if total <= 0 {
        return [0; 7];
    }

    let mut norm = working.map(|v| (v as f64 / total as f64 * 100.0).round_ties_even() as i64);

    let diff = 100 - norm.iter().sum::<i64>();
    if diff != 0 {
        let mut max_idx = 0;
        for (idx, value) in norm.iter().enumerate() {
            if *value > norm[max_idx] {
                max_idx = idx;
            }
        }
        norm[max_idx] += diff;
    }
    norm
}
