pub mod completion;
pub mod diary;
pub mod stats;

pub use completion::{ClaudeClient, CompletionClient, CompletionRequest};
pub use diary::{DiaryService, DiarySaved};
