use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::emotion::{
    Classification, EmotionCategory, ModelType, Polarity, PolarityPair,
};
use crate::scoring::classifier::{EmotionClassifier, ScoringPipeline};
use crate::scoring::normalizer::RawScore;
use crate::services::completion::{ChatMessage, CompletionClient, CompletionRequest};

const BEGIN_MARKER: &str = "<BEGIN_JSON>";
const END_MARKER: &str = "<END_JSON>";

const SYSTEM_PROMPT: &str = "You only perform emotion analysis. Output nothing but the JSON block.";

/// Reply shape the rubric asks for.
#[derive(Debug, Deserialize)]
struct LlmReply {
    emotion_scores: HashMap<String, Value>,
    #[serde(default)]
    emotion_polarity: HashMap<String, Value>,
}

/// Validated reply: known categories only, at least one of them present.
#[derive(Debug, PartialEq)]
struct ParsedReply {
    scores: Vec<(EmotionCategory, RawScore)>,
    polarity: PolarityPair,
}

impl LlmReply {
    fn validate(self) -> Option<ParsedReply> {
        let scores: Vec<(EmotionCategory, RawScore)> = self
            .emotion_scores
            .iter()
            .filter_map(|(key, value)| match key.parse::<EmotionCategory>() {
                Ok(category) => Some((category, RawScore::from(value))),
                Err(_) => {
                    tracing::debug!(key = %key, "Ignoring unknown emotion key in LLM reply");
                    None
                }
            })
            .collect();

        if scores.is_empty() {
            return None;
        }

        let mut polarity = PolarityPair::default();
        for (key, value) in &self.emotion_polarity {
            let guess = Polarity::from_guess(value.as_str());
            match key.parse::<EmotionCategory>() {
                Ok(EmotionCategory::Surprise) => polarity.surprise = guess,
                Ok(EmotionCategory::Shame) => polarity.shame = guess,
                _ => {}
            }
        }

        Some(ParsedReply { scores, polarity })
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 400,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Asks a remote completion service to score the diary.
pub struct LlmClassifier {
    client: Arc<dyn CompletionClient>,
    pipeline: ScoringPipeline,
    settings: LlmSettings,
}

impl LlmClassifier {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        pipeline: ScoringPipeline,
        settings: LlmSettings,
    ) -> Self {
        Self {
            client,
            pipeline,
            settings,
        }
    }

    fn request_for(&self, diary_text: &str) -> CompletionRequest {
        CompletionRequest {
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: vec![ChatMessage::user(build_prompt(diary_text))],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stop_sequences: Vec::new(),
        }
    }

    async fn ask(&self, diary_text: &str) -> Option<ParsedReply> {
        let request = self.request_for(diary_text);
        let completion = self.client.complete(&request);
        let reply = match tokio::time::timeout(self.settings.timeout, completion).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Completion service unavailable, using default scores");
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.settings.timeout.as_secs(),
                    "Completion service timed out, using default scores"
                );
                return None;
            }
        };

        let parsed = extract_reply(&reply);
        if parsed.is_none() {
            tracing::warn!(reply_len = reply.len(), "Could not parse emotion JSON from reply");
        }
        parsed
    }
}

#[async_trait]
impl EmotionClassifier for LlmClassifier {
    async fn classify(&self, text: &str) -> Classification {
        match self.ask(text).await {
            Some(parsed) => {
                self.pipeline
                    .finish(text, parsed.scores, parsed.polarity, ModelType::Llm)
            }
            None => self.pipeline.finish(
                text,
                Vec::new(),
                PolarityPair::default(),
                ModelType::Fallback,
            ),
        }
    }
}

fn build_prompt(diary_text: &str) -> String {
    format!(
        r#"You are an emotion analysis expert.

Read the diary below and score seven emotions (joy, love, surprise, fear, anger, shame, sadness)
as integers from 0 to 100. For surprise and shame, also say whether the feeling was
"positive" or "negative" (use null when the emotion is absent or unclear).

Answer in exactly this format:
{begin}
{{
  "emotion_scores": {{
    "joy": 0,
    "love": 0,
    "surprise": 0,
    "fear": 0,
    "anger": 0,
    "shame": 0,
    "sadness": 0
  }},
  "emotion_polarity": {{
    "surprise": null,
    "shame": null
  }}
}}
{end}

Diary:
{diary}

Output only the JSON."#,
        begin = BEGIN_MARKER,
        end = END_MARKER,
        diary = diary_text,
    )
}

/// Sentinel block first, then the first balanced `{...}` span.
fn extract_reply(text: &str) -> Option<ParsedReply> {
    if let Some(block) = sentinel_block(text) {
        if let Some(parsed) = parse_reply(block) {
            return Some(parsed);
        }
    }
    first_balanced_object(text).and_then(parse_reply)
}

fn parse_reply(candidate: &str) -> Option<ParsedReply> {
    serde_json::from_str::<LlmReply>(candidate.trim())
        .ok()
        .and_then(LlmReply::validate)
}

fn sentinel_block(text: &str) -> Option<&str> {
    let start = text.find(BEGIN_MARKER)? + BEGIN_MARKER.len();
    let len = text[start..].find(END_MARKER)?;
    Some(&text[start..start + len])
}

/// Braces inside string literals do not count toward the balance.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::normalizer::DEFAULT_DISTRIBUTION;
    use std::sync::Mutex;

    struct ScriptedClient {
        reply: anyhow::Result<String>,
        delay: Option<Duration>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                delay: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(anyhow::anyhow!("connection refused")),
                delay: None,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    fn classifier(client: Arc<dyn CompletionClient>) -> LlmClassifier {
        LlmClassifier::new(client, ScoringPipeline::default(), LlmSettings::default())
    }

    #[test]
    fn test_sentinel_block_is_preferred() {
        let reply = r#"Sure! {"noise": true}
<BEGIN_JSON>
{"emotion_scores": {"joy": 70, "sadness": 30}, "emotion_polarity": {"surprise": null, "shame": null}}
<END_JSON>"#;
        let parsed = extract_reply(reply).unwrap();
        assert_eq!(parsed.scores.len(), 2);
    }

    #[test]
    fn test_balanced_object_fallback_ignores_braces_in_strings() {
        let reply = r#"Here you go: {"emotion_scores": {"anger": 80, "fear": 20}, "note": "a } inside"} trailing }"#;
        let span = first_balanced_object(reply).unwrap();
        assert!(span.ends_with(r#""a } inside"}"#));
        let parsed = extract_reply(reply).unwrap();
        assert_eq!(parsed.scores.len(), 2);
    }

    #[test]
    fn test_unbalanced_reply_is_rejected() {
        assert!(first_balanced_object(r#"{"emotion_scores": {"joy": 1}"#).is_none());
        assert!(extract_reply("no json here").is_none());
    }

    #[test]
    fn test_empty_or_unknown_scores_fail_validation() {
        assert!(extract_reply(r#"{"emotion_scores": {}}"#).is_none());
        assert!(extract_reply(r#"{"emotion_scores": {"boredom": 90}}"#).is_none());
        assert!(extract_reply(r#"{"emotion_polarity": {"surprise": "positive"}}"#).is_none());
    }

    #[test]
    fn test_korean_keys_and_polarity_are_accepted() {
        let parsed = extract_reply(
            r#"{"emotion_scores": {"놀람": 50, "기쁨": "50"}, "emotion_polarity": {"놀람": "positive", "부끄러움": 3}}"#,
        )
        .unwrap();
        assert_eq!(parsed.polarity.surprise, Polarity::Positive);
        assert_eq!(parsed.polarity.shame, Polarity::Unknown);
    }

    #[tokio::test]
    async fn test_classify_parses_and_normalizes_reply() {
        let client = ScriptedClient::replying(
            r#"<BEGIN_JSON>{"emotion_scores": {"joy": 45, "love": 45, "surprise": 10}, "emotion_polarity": {"surprise": "positive"}}<END_JSON>"#,
        );
        let out = classifier(client.clone()).classify("그냥 하루").await;

        assert_eq!(out.model_type, ModelType::Llm);
        assert_eq!(out.emotion_scores.total(), 100);
        assert_eq!(out.emotion_scores.get(EmotionCategory::Joy), 45);
        assert_eq!(out.emotion_polarity.surprise, Polarity::Positive);
        assert_eq!(
            out.top_emotions,
            vec![
                EmotionCategory::Joy,
                EmotionCategory::Love,
                EmotionCategory::Surprise
            ]
        );

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!((seen[0].temperature - 0.1).abs() < f32::EPSILON);
        assert!(seen[0].messages[0].content.contains("그냥 하루"));
    }

    #[tokio::test]
    async fn test_rule_pass_overrides_model_polarity() {
        let client = ScriptedClient::replying(
            r#"{"emotion_scores": {"surprise": 60, "sadness": 40}, "emotion_polarity": {"surprise": "positive"}}"#,
        );
        let out = classifier(client)
            .classify("갑자기 사고 소식을 듣고 충격을 받았다")
            .await;
        assert_eq!(out.emotion_polarity.surprise, Polarity::Negative);
    }

    #[tokio::test]
    async fn test_unavailable_service_falls_back_to_default() {
        let out = classifier(ScriptedClient::failing()).classify("아무 내용").await;
        assert_eq!(out.model_type, ModelType::Fallback);
        assert_eq!(out.emotion_scores.as_array(), DEFAULT_DISTRIBUTION);
    }

    #[tokio::test]
    async fn test_timeout_is_treated_as_parse_failure() {
        let client = Arc::new(ScriptedClient {
            reply: Ok(r#"{"emotion_scores": {"joy": 100}}"#.to_string()),
            delay: Some(Duration::from_millis(200)),
            seen: Mutex::new(Vec::new()),
        });
        let classifier = LlmClassifier::new(
            client,
            ScoringPipeline::default(),
            LlmSettings {
                timeout: Duration::from_millis(10),
                ..Default::default()
            },
        );
        let out = classifier.classify("늦은 답장").await;
        assert_eq!(out.model_type, ModelType::Fallback);
        assert_eq!(out.emotion_scores.as_array(), DEFAULT_DISTRIBUTION);
    }

    #[tokio::test]
    async fn test_all_zero_reply_uses_default_distribution() {
        let client = ScriptedClient::replying(r#"{"emotion_scores": {"joy": 0, "anger": 0}}"#);
        let out = classifier(client).classify("...").await;
        assert_eq!(out.model_type, ModelType::Llm);
        assert_eq!(out.emotion_scores.as_array(), DEFAULT_DISTRIBUTION);
    }
}
