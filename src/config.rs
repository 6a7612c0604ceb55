use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionStrategy {
    /// Remote completion service.
    Llm,
    /// Local model artifact with keyword fallback.
    Local,
}

impl FromStr for EmotionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" | "gpt" | "claude" => Ok(EmotionStrategy::Llm),
            "local" | "heuristic" | "transformers" => Ok(EmotionStrategy::Local),
            other => Err(format!("unknown emotion strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub cors_extra_origins: Vec<String>,

    pub claude_api_key: String,
    pub claude_model: String,
    pub llm_api_url: String,
    pub llm_timeout_secs: u64,

    pub emotion_strategy: EmotionStrategy,
    pub emotion_model_path: Option<PathBuf>,
    pub similarity_model_path: Option<PathBuf>,

    pub well_includes_shame: bool,
    pub compensate_on_delete: bool,
    pub low_score_filter: bool,
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn flag(key: &str, default: bool) -> bool {
    match var(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let claude_api_key = var("CLAUDE_API_KEY").unwrap_or_default();
        let default_strategy = if claude_api_key.is_empty() {
            EmotionStrategy::Local
        } else {
            EmotionStrategy::Llm
        };

        Self {
            database_url: var("DATABASE_URL"),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080),
            frontend_url: var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            cors_extra_origins: var("CORS_EXTRA_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            claude_api_key,
            claude_model: var("CLAUDE_MODEL").unwrap_or_else(|| "claude-sonnet-4-20250514".into()),
            llm_api_url: var("LLM_API_URL")
                .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".into()),
            llm_timeout_secs: var("LLM_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),

            emotion_strategy: var("EMOTION_STRATEGY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_strategy),
            emotion_model_path: var("EMOTION_MODEL_PATH").map(PathBuf::from),
            similarity_model_path: var("SIMILARITY_MODEL_PATH").map(PathBuf::from),

            well_includes_shame: flag("WELL_INCLUDES_SHAME", false),
            compensate_on_delete: flag("COMPENSATE_ON_DELETE", true),
            low_score_filter: flag("LOW_SCORE_FILTER", false),
        }
    }

    /// Settings for tests and local runs: in-memory store, heuristic scoring.
    pub fn local() -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 8080,
            frontend_url: "http://localhost:3000".into(),
            cors_extra_origins: Vec::new(),
            claude_api_key: String::new(),
            claude_model: "claude-sonnet-4-20250514".into(),
            llm_api_url: "https://api.anthropic.com/v1/messages".into(),
            llm_timeout_secs: 30,
            emotion_strategy: EmotionStrategy::Local,
            emotion_model_path: None,
            similarity_model_path: None,
            well_includes_shame: false,
            compensate_on_delete: true,
            low_score_filter: false,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("LLM".parse::<EmotionStrategy>(), Ok(EmotionStrategy::Llm));
        assert_eq!("heuristic".parse::<EmotionStrategy>(), Ok(EmotionStrategy::Local));
        assert!("magic".parse::<EmotionStrategy>().is_err());
    }

    #[test]
    fn test_local_config_defaults() {
        let config = Config::local();
        assert!(config.database_url.is_none());
        assert!(config.compensate_on_delete);
        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
    }
}
