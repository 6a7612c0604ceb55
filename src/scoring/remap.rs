//! Rule table that folds a local classifier's native labels onto the seven
//! town categories. Every coefficient lives in [`RemapTable::default`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::emotion::EmotionCategory;
use crate::scoring::keywords;
use crate::text::{count_matches, words};

/// Labels the local classifier (or its heuristic fallback) emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeLabel {
    Anger,
    Sadness,
    Anxiety,
    Hurt,
    Embarrassment,
    Joy,
}

impl NativeLabel {
    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for NativeLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anger" | "분노" => Ok(NativeLabel::Anger),
            "sadness" | "슬픔" => Ok(NativeLabel::Sadness),
            "anxiety" | "불안" => Ok(NativeLabel::Anxiety),
            "hurt" | "상처" => Ok(NativeLabel::Hurt),
            "embarrassment" | "당황" => Ok(NativeLabel::Embarrassment),
            "joy" | "기쁨" => Ok(NativeLabel::Joy),
            other => Err(format!("unknown native label: {}", other)),
        }
    }
}

/// Probability-like scores over the native labels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NativeScores([f64; 6]);

impl NativeScores {
    pub fn get(&self, label: NativeLabel) -> f64 {
        self.0[label.index()]
    }

    pub fn add(&mut self, label: NativeLabel, amount: f64) {
        self.0[label.index()] += amount;
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() <= 0.0
    }
}

impl FromIterator<(NativeLabel, f64)> for NativeScores {
    fn from_iter<I: IntoIterator<Item = (NativeLabel, f64)>>(iter: I) -> Self {
        let mut scores = NativeScores::default();
        for (label, value) in iter {
            if value.is_finite() && value > 0.0 {
                scores.add(label, value);
            }
        }
        scores
    }
}

/// One step of the remap. Steps run in table order over a shared target vector.
#[derive(Debug, Clone)]
pub enum RemapStep {
    /// `target += native[from] * weight`
    Transfer {
        from: NativeLabel,
        to: EmotionCategory,
        weight: f64,
    },
    /// Splits a native label between two targets in proportion to keyword hits,
    /// or by `prior_first_share` when neither keyword list matches.
    Split {
        from: NativeLabel,
        first: EmotionCategory,
        second: EmotionCategory,
        first_keywords: Vec<String>,
        second_keywords: Vec<String>,
        prior_first_share: f64,
    },
    /// Moves `fraction` of one target category to another when any keyword matches.
    Reassign {
        from: EmotionCategory,
        to: EmotionCategory,
        fraction: f64,
        keywords: Vec<String>,
    },
    /// Scales an already-present category when positive cues outnumber negative ones.
    Boost {
        category: EmotionCategory,
        factor: f64,
        positive: Vec<String>,
        negative: Vec<String>,
    },
    /// Limits a category to `max_share` of the total, spilling the excess onto
    /// the listed categories in proportion to what they already hold.
    Cap {
        category: EmotionCategory,
        max_share: f64,
        spill_to: Vec<EmotionCategory>,
    },
}

impl RemapStep {
    pub fn transfer(from: NativeLabel, to: EmotionCategory, weight: f64) -> Self {
        RemapStep::Transfer { from, to, weight }
    }
}

#[derive(Debug, Clone)]
pub struct RemapTable {
    pub steps: Vec<RemapStep>,
}

impl Default for RemapTable {
    fn default() -> Self {
        use EmotionCategory as E;
        use NativeLabel as N;

        Self {
            steps: vec![
                RemapStep::transfer(N::Joy, E::Joy, 1.0),
                RemapStep::transfer(N::Anger, E::Anger, 1.0),
                RemapStep::transfer(N::Sadness, E::Sadness, 1.0),
                // native anxiety over-fires relative to fear
                RemapStep::transfer(N::Anxiety, E::Fear, 0.7),
                RemapStep::transfer(N::Hurt, E::Sadness, 0.5),
                RemapStep::Split {
                    from: N::Embarrassment,
                    first: E::Surprise,
                    second: E::Shame,
                    first_keywords: words(keywords::SURPRISE_SPLIT),
                    second_keywords: words(keywords::SHAME_SPLIT),
                    prior_first_share: 0.7,
                },
                RemapStep::Reassign {
                    from: E::Joy,
                    to: E::Love,
                    fraction: 0.3,
                    keywords: words(keywords::LOVE),
                },
                RemapStep::Boost {
                    category: E::Joy,
                    factor: 1.3,
                    positive: words(keywords::STRONG_POSITIVE),
                    negative: words(keywords::NEGATIVE),
                },
                RemapStep::Cap {
                    category: E::Fear,
                    max_share: 0.35,
                    spill_to: vec![E::Anger, E::Sadness, E::Shame],
                },
                RemapStep::Cap {
                    category: E::Sadness,
                    max_share: 0.35,
                    spill_to: vec![E::Anger, E::Fear, E::Shame],
                },
            ],
        }
    }
}

impl RemapTable {
    /// Returns unnormalized target scores. A category only ends up non-zero if
    /// some native score fed it, directly or through a later step.
    pub fn apply(&self, native: &NativeScores, text: &str) -> [f64; 7] {
        let lowered = text.to_lowercase();
        let mut target = [0f64; 7];

        for step in &self.steps {
            match step {
                RemapStep::Transfer { from, to, weight } => {
                    target[to.index()] += native.get(*from) * weight;
                }
                RemapStep::Split {
                    from,
                    first,
                    second,
                    first_keywords,
                    second_keywords,
                    prior_first_share,
                } => {
                    let amount = native.get(*from);
                    if amount <= 0.0 {
                        continue;
                    }
                    let first_hits = count_matches(&lowered, first_keywords) as f64;
                    let second_hits = count_matches(&lowered, second_keywords) as f64;
                    let first_share = if first_hits + second_hits > 0.0 {
                        first_hits / (first_hits + second_hits)
                    } else {
                        *prior_first_share
                    };
                    target[first.index()] += amount * first_share;
                    target[second.index()] += amount * (1.0 - first_share);
                }
                RemapStep::Reassign {
                    from,
                    to,
                    fraction,
                    keywords,
                } => {
                    let available = target[from.index()];
                    if available > 0.0 && count_matches(&lowered, keywords) > 0 {
                        let moved = available * fraction;
                        target[from.index()] -= moved;
                        target[to.index()] += moved;
                    }
                }
                RemapStep::Boost {
                    category,
                    factor,
                    positive,
                    negative,
                } => {
                    let pos = count_matches(&lowered, positive);
                    let neg = count_matches(&lowered, negative);
                    if target[category.index()] > 0.0 && pos > neg {
                        target[category.index()] *= factor;
                    }
                }
                RemapStep::Cap {
                    category,
                    max_share,
                    spill_to,
                } => cap(&mut target, *category, *max_share, spill_to),
            }
        }

        target
    }
}

fn cap(
    target: &mut [f64; 7],
    category: EmotionCategory,
    max_share: f64,
    spill_to: &[EmotionCategory],
) {
    let total: f64 = target.iter().sum();
    let ceiling = total * max_share;
    let current = target[category.index()];
    if total <= 0.0 || current <= ceiling {
        return;
    }

    let receivers: Vec<EmotionCategory> = spill_to
        .iter()
        .copied()
        .filter(|c| *c != category && target[c.index()] > 0.0)
        .collect();
    let pool: f64 = receivers.iter().map(|c| target[c.index()]).sum();
    // Nothing to spill onto without inventing evidence.
    if pool <= 0.0 {
        return;
    }

    let excess = current - ceiling;
    target[category.index()] = ceiling;
    for receiver in receivers {
        target[receiver.index()] += excess * target[receiver.index()] / pool;
    }
}
