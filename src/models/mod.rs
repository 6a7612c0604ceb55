pub mod diary;
pub mod emotion;
pub mod letter;
pub mod town;
