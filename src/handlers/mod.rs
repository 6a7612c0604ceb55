pub mod diaries;
pub mod emotions;
pub mod health;
pub mod letters;
pub mod similarity;
pub mod stats;
pub mod town;
