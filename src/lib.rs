use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scoring;
pub mod services;
pub mod similarity;
pub mod store;
pub mod text;
pub mod town;

use config::{Config, EmotionStrategy};
use scoring::llm::LlmSettings;
use scoring::normalizer::LOW_SCORE_CUTOFF;
use scoring::remap::RemapTable;
use scoring::{
    EmotionClassifier, LlmClassifier, LocalClassifier, NormalizerConfig, PolarityResolver,
    ScoreNormalizer, ScoringPipeline,
};
use services::{ClaudeClient, DiaryService};
use similarity::{FileEmbedder, SimilarityIndex, SimilarityWeights};
use store::{MemoryStore, PgStore, Store};
use town::{ContributionPolicy, TownConfig, TownEngine};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub diaries: DiaryService,
    pub town: TownEngine,
    pub similarity: Arc<SimilarityIndex>,
}

impl AppState {
    /// Connects the configured store (running migrations) and wires the services.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url).await?;
                let pg = PgStore::new(pool);
                pg.migrate().await?;
                tracing::info!("Database migrations applied");
                Arc::new(pg)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let classifier = build_classifier(&config)?;

        let town = TownEngine::new(
            store.clone(),
            TownConfig {
                policy: ContributionPolicy::with_shame_in_well(config.well_includes_shame),
                ..Default::default()
            },
        );

        let similarity = Arc::new(SimilarityIndex::new(
            store.clone(),
            Arc::new(FileEmbedder::new(config.similarity_model_path.clone())),
            SimilarityWeights::default(),
        ));

        let diaries = DiaryService::new(
            store.clone(),
            classifier,
            town.clone(),
            config.compensate_on_delete,
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            diaries,
            town,
            similarity,
        })
    }
}

fn build_pipeline(config: &Config) -> ScoringPipeline {
    let normalizer = ScoreNormalizer::new(NormalizerConfig {
        low_score_filter: config.low_score_filter.then_some(LOW_SCORE_CUTOFF),
        ..Default::default()
    });
    ScoringPipeline::new(normalizer, PolarityResolver::default())
}

pub fn build_classifier(config: &Config) -> anyhow::Result<Arc<dyn EmotionClassifier>> {
    let pipeline = build_pipeline(config);

    let strategy = match config.emotion_strategy {
        EmotionStrategy::Llm if config.claude_api_key.is_empty() => {
            tracing::warn!("EMOTION_STRATEGY=llm without CLAUDE_API_KEY, using local classifier");
            EmotionStrategy::Local
        }
        other => other,
    };

    let classifier: Arc<dyn EmotionClassifier> = match strategy {
        EmotionStrategy::Llm => {
            let client = ClaudeClient::from_config(config)?;
            let settings = LlmSettings {
                timeout: std::time::Duration::from_secs(config.llm_timeout_secs),
                ..Default::default()
            };
            tracing::info!(model = %config.claude_model, "Using remote emotion classifier");
            Arc::new(LlmClassifier::new(Arc::new(client), pipeline, settings))
        }
        EmotionStrategy::Local => {
            tracing::info!(
                model_path = ?config.emotion_model_path,
                "Using local emotion classifier"
            );
            Arc::new(LocalClassifier::new(
                config.emotion_model_path.clone(),
                RemapTable::default(),
                pipeline,
            ))
        }
    };
    Ok(classifier)
}
