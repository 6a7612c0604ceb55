use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::diary::Diary;
use crate::models::emotion::EmotionCategory;
use crate::town::ContributionPolicy;

pub const TOP_EMOTION_COUNT: usize = 3;
pub const RECENT_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEmotion {
    pub name: EmotionCategory,
    pub score: u64,
    /// Share of all emotion points, 0..=1.
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub value: u64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeWellContribution {
    pub tree: Contribution,
    pub well: Contribution,
}

/// Village office summary over a user's diaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeStats {
    pub diary_count: usize,
    pub top_emotions: Vec<TopEmotion>,
    pub total_emotion_score: u64,
    /// Tree against well over the last seven days, `today` included.
    pub tree_well_contribution: TreeWellContribution,
    pub total_tree_well_value: u64,
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub fn office_stats(
    diaries: &[Diary],
    today: NaiveDate,
    policy: &ContributionPolicy,
) -> OfficeStats {
    let mut totals = [0u64; 7];
    for diary in diaries {
        if let Some(scores) = &diary.emotion_scores {
            for (category, score) in scores.iter() {
                totals[category.index()] += u64::from(score);
            }
        }
    }
    let total_emotion_score: u64 = totals.iter().sum();

    let mut ranked: Vec<(EmotionCategory, u64)> = EmotionCategory::ALL
        .into_iter()
        .map(|c| (c, totals[c.index()]))
        .filter(|(_, score)| *score > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let top_emotions = ranked
        .into_iter()
        .take(TOP_EMOTION_COUNT)
        .map(|(name, score)| TopEmotion {
            name,
            score,
            ratio: ratio(score, total_emotion_score),
        })
        .collect();

    let week_start = today - Duration::days(RECENT_DAYS - 1);
    let (mut tree, mut well) = (0u64, 0u64);
    for diary in diaries {
        // unparseable dates are skipped rather than failing the summary
        let Ok(date) = NaiveDate::parse_from_str(&diary.date, "%Y-%m-%d") else {
            continue;
        };
        if date < week_start || date > today {
            continue;
        }
        let scores = diary.scores_or_zero();
        tree += policy.tree_points(&scores) as u64;
        well += policy.well_points(&scores) as u64;
    }
    let total_tree_well_value = tree + well;

    OfficeStats {
        diary_count: diaries.len(),
        top_emotions,
        total_emotion_score,
        tree_well_contribution: TreeWellContribution {
            tree: Contribution {
                value: tree,
                ratio: ratio(tree, total_tree_well_value),
            },
            well: Contribution {
                value: well,
                ratio: ratio(well, total_tree_well_value),
            },
        },
        total_tree_well_value,
    }
}
