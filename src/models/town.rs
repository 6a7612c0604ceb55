use serde::{Deserialize, Serialize};

/// Persisted happiness tree. `stage` is always re-derived from `growth`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeState {
    pub growth: i64,
    pub stage: u8,
    pub last_fruit_date: Option<String>,
}

/// Persisted stress well. `stage` and `is_overflowing` are always re-derived
/// from `water_level`; only `last_overflow_date` is caller-managed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellState {
    pub water_level: i64,
    pub stage: u8,
    pub is_overflowing: bool,
    pub last_overflow_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView {
    #[serde(flatten)]
    pub state: TreeState,
    pub progress: f64,
    pub points_to_next_stage: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WellView {
    #[serde(flatten)]
    pub state: WellState,
    pub fill_percent: f64,
}

#[derive(Debug, Deserialize)]
pub struct SubtractRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct FruitCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestOutcome {
    pub fruit_count: i64,
    pub tree: TreeState,
    pub well: Option<WellState>,
}
