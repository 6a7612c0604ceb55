pub mod classifier;
pub mod keywords;
pub mod llm;
pub mod local;
pub mod normalizer;
pub mod polarity;
pub mod remap;

pub use classifier::{EmotionClassifier, ScoringPipeline};
pub use llm::LlmClassifier;
pub use local::LocalClassifier;
pub use normalizer::{NormalizerConfig, RawScore, ScoreNormalizer};
pub use polarity::{PolarityResolver, PolarityRules};
