use crate::models::emotion::{EmotionCategory, EmotionScores};

pub const TREE_THRESHOLDS: [i64; 6] = [0, 40, 100, 220, 380, 600];
pub const WELL_THRESHOLDS: [i64; 6] = [0, 100, 200, 300, 400, 500];
pub const WELL_OVERFLOW_LEVEL: i64 = 500;

/// Ascending accumulator thresholds; stage `i` starts at `thresholds[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTable {
    thresholds: Vec<i64>,
}

impl StageTable {
    /// Falls back to a single stage when `thresholds` is empty.
    pub fn new(mut thresholds: Vec<i64>) -> Self {
        thresholds.sort_unstable();
        if thresholds.is_empty() {
            thresholds.push(0);
        }
        Self { thresholds }
    }

    pub fn tree() -> Self {
        Self::new(TREE_THRESHOLDS.to_vec())
    }

    pub fn well() -> Self {
        Self::new(WELL_THRESHOLDS.to_vec())
    }

    pub fn max_stage(&self) -> u8 {
        (self.thresholds.len() - 1) as u8
    }

    pub fn stage_for(&self, accumulator: i64) -> u8 {
        self.thresholds
            .iter()
            .rposition(|t| accumulator >= *t)
            .unwrap_or(0) as u8
    }

    /// Percent progress through the current stage, 100 at the last stage.
    pub fn progress(&self, accumulator: i64) -> f64 {
        let stage = self.stage_for(accumulator) as usize;
        match self.thresholds.get(stage + 1) {
            Some(next) => {
                let start = self.thresholds[stage];
                let span = (next - start) as f64;
                let done = (accumulator.max(start) - start) as f64;
                round1(done / span * 100.0)
            }
            None => 100.0,
        }
    }

    pub fn points_to_next(&self, accumulator: i64) -> i64 {
        let stage = self.stage_for(accumulator) as usize;
        self.thresholds
            .get(stage + 1)
            .map(|next| (next - accumulator).max(0))
            .unwrap_or(0)
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Which categories feed each accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionPolicy {
    pub tree: Vec<EmotionCategory>,
    pub well: Vec<EmotionCategory>,
}

impl Default for ContributionPolicy {
    fn default() -> Self {
        use EmotionCategory::*;
        Self {
            tree: vec![Joy, Love],
            well: vec![Anger, Sadness, Fear],
        }
    }
}

impl ContributionPolicy {
    pub fn with_shame_in_well(include: bool) -> Self {
        let mut policy = Self::default();
        if include {
            policy.well.push(EmotionCategory::Shame);
        }
        policy
    }

    pub fn tree_points(&self, scores: &EmotionScores) -> i64 {
        i64::from(scores.sum_of(&self.tree))
    }

    pub fn well_points(&self, scores: &EmotionScores) -> i64 {
        i64::from(scores.sum_of(&self.well))
    }
}
