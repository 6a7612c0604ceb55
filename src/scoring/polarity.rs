use crate::models::emotion::{Polarity, PolarityPair};
use crate::scoring::keywords;
use crate::text::{count_matches, contains_any, split_sentences, words};

/// Positive and negative cue lists for one polarity-bearing category.
#[derive(Debug, Clone)]
pub struct CueRule {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    /// Words that mark a sentence as being about this category.
    pub triggers: Vec<String>,
}

impl CueRule {
    /// Deterministic verdict from keyword counts, or `None` when the counts tie.
    fn verdict(&self, text: &str, scope_to_triggers: bool) -> Option<Polarity> {
        let (pos, neg) = if scope_to_triggers {
            split_sentences(text)
                .into_iter()
                .filter(|s| contains_any(s, &self.triggers))
                .fold((0, 0), |(p, n), s| {
                    (
                        p + count_matches(s, &self.positive),
                        n + count_matches(s, &self.negative),
                    )
                })
        } else {
            (
                count_matches(text, &self.positive),
                count_matches(text, &self.negative),
            )
        };

        if pos > neg && pos > 0 {
            Some(Polarity::Positive)
        } else if neg > pos && neg > 0 {
            Some(Polarity::Negative)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolarityRules {
    pub surprise: CueRule,
    pub shame: CueRule,
    /// Only count cues inside sentences that mention the category.
    pub scope_to_trigger_sentences: bool,
    /// Last-resort positive-affect words for Surprise. Empty disables it.
    pub surprise_affect_fallback: Vec<String>,
}

impl Default for PolarityRules {
    fn default() -> Self {
        Self {
            surprise: CueRule {
                positive: words(keywords::POSITIVE_SURPRISE),
                negative: words(keywords::NEGATIVE_SURPRISE),
                triggers: words(keywords::SURPRISE_TRIGGERS),
            },
            shame: CueRule {
                positive: words(keywords::POSITIVE_SHAME),
                negative: words(keywords::NEGATIVE_SHAME),
                triggers: words(keywords::SHAME_TRIGGERS),
            },
            scope_to_trigger_sentences: false,
            surprise_affect_fallback: words(keywords::POSITIVE_AFFECT),
        }
    }
}

/// Combines keyword rules with an upstream model's own polarity guess.
/// A rule verdict always beats the model.
#[derive(Debug, Clone, Default)]
pub struct PolarityResolver {
    rules: PolarityRules,
}

impl PolarityResolver {
    pub fn new(rules: PolarityRules) -> Self {
        Self { rules }
    }

    pub fn resolve(
        &self,
        text: &str,
        model: PolarityPair,
        surprise_score: u32,
        shame_score: u32,
    ) -> PolarityPair {
        let lowered = text.to_lowercase();

        let surprise = if surprise_score == 0 {
            Polarity::Unknown
        } else {
            let decided = self.decide(&self.rules.surprise, &lowered, model.surprise);
            if decided.is_known() || self.rules.surprise_affect_fallback.is_empty() {
                decided
            } else if contains_any(&lowered, &self.rules.surprise_affect_fallback) {
                Polarity::Positive
            } else {
                Polarity::Unknown
            }
        };

        let shame = if shame_score == 0 {
            Polarity::Unknown
        } else {
            self.decide(&self.rules.shame, &lowered, model.shame)
        };

        PolarityPair { surprise, shame }
    }

    fn decide(&self, rule: &CueRule, lowered: &str, model_guess: Polarity) -> Polarity {
        match rule.verdict(lowered, self.rules.scope_to_trigger_sentences) {
            Some(verdict) => verdict,
            None if model_guess.is_known() => model_guess,
            None => Polarity::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(surprise: Polarity, shame: Polarity) -> PolarityPair {
        PolarityPair { surprise, shame }
    }

    #[test]
    fn test_zero_score_is_always_unknown() {
        let resolver = PolarityResolver::default();
        let out = resolver.resolve(
            "합격 소식에 기쁘고 창피했다",
            guess(Polarity::Positive, Polarity::Negative),
            0,
            0,
        );
        assert_eq!(out, PolarityPair::default());
    }

    #[test]
    fn test_rule_verdict_beats_conflicting_model_guess() {
        let resolver = PolarityResolver::default();
        let out = resolver.resolve(
            "회사에서 충격적인 얘기를 들었다. 정말 실망이다",
            guess(Polarity::Positive, Polarity::Unknown),
            30,
            0,
        );
        assert_eq!(out.surprise, Polarity::Negative);
    }

    #[test]
    fn test_model_guess_used_when_rules_are_silent() {
        let resolver = PolarityResolver::default();
        let out = resolver.resolve(
            "그냥 평범한 하루였다",
            guess(Polarity::Negative, Polarity::Positive),
            20,
            10,
        );
        assert_eq!(out.surprise, Polarity::Negative);
        assert_eq!(out.shame, Polarity::Positive);
    }

    #[test]
    fn test_tied_cues_defer_to_model() {
        let resolver = PolarityResolver::default();
        // one positive ("선물") and one negative ("실망") surprise cue
        let out = resolver.resolve(
            "선물을 받았는데 실망했다",
            guess(Polarity::Positive, Polarity::Unknown),
            25,
            0,
        );
        assert_eq!(out.surprise, Polarity::Positive);
    }

    #[test]
    fn test_surprise_falls_back_to_generic_positive_affect() {
        let resolver = PolarityResolver::default();
        let out = resolver.resolve("오늘은 행복했다", PolarityPair::default(), 15, 15);
        assert_eq!(out.surprise, Polarity::Positive);
        // the affect fallback never applies to shame
        assert_eq!(out.shame, Polarity::Unknown);
    }

    #[test]
    fn test_affect_fallback_can_be_disabled() {
        let resolver = PolarityResolver::new(PolarityRules {
            surprise_affect_fallback: Vec::new(),
            ..Default::default()
        });
        let out = resolver.resolve("오늘은 행복했다", PolarityPair::default(), 15, 0);
        assert_eq!(out.surprise, Polarity::Unknown);
    }

    #[test]
    fn test_trigger_scoping_ignores_unrelated_sentences() {
        let resolver = PolarityResolver::new(PolarityRules {
            scope_to_trigger_sentences: true,
            surprise_affect_fallback: Vec::new(),
            ..Default::default()
        });
        // "실망" sits in a sentence without a surprise trigger
        let text = "시험은 실망스러웠다. 갑자기 친구가 선물을 줬다";
        let out = resolver.resolve(text, PolarityPair::default(), 20, 0);
        assert_eq!(out.surprise, Polarity::Positive);
    }

    #[test]
    fn test_shame_negative_cues() {
        let resolver = PolarityResolver::default();
        let out = resolver.resolve(
            "발표하다 실수해서 너무 창피했다",
            guess(Polarity::Unknown, Polarity::Positive),
            0,
            40,
        );
        assert_eq!(out.shame, Polarity::Negative);
    }
}
