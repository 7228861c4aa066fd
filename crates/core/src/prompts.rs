//! Prompt text for the three per-tick completions.
//!
//! C is the person wearing or facing the camera. The activity and environment
//! prompts wrap the scene caption; the situational prompt is a few-shot
//! preamble followed by one question built from the first two answers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

const SITUATION_PREFIX: &str = include_str!("../prompts/situation_prefix.md");
const SITUATION_PREFIX_SHORT: &str = include_str!("../prompts/situation_prefix_short.md");
const SITUATION_SUFFIX: &str = "A: Let's think step by step.";
const ACTIVITY_PREFIX: &str = "An egocentric view of C is showing ";
const ACTIVITY_SUFFIX: &str = ". Describe what is C doing briefly and objectively, as concisely as possible, without guesses or assumptions. Answer in the format of 'C is...'. If it seems that C is not doing anything, please answer 'C is not doing anything'.";
const ENVIRONMENT_PREFIX: &str = "An egocentric view of C is showing ";
const ENVIRONMENT_SUFFIX: &str =
    ". What location or environment is C likely to be in? Answer in the format of 'C is in...'";

/// Question sent with a frame to produce the hand-action caption.
pub const HAND_QUESTION: &str = "What are the hands doing?";

/// Which situational preamble to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SituationVariant {
    /// Worked examples with per-channel reasoning, ending in an invitation to
    /// think step by step.
    #[default]
    Reasoning,
    /// Answer-only examples, no reasoning suffix.
    Short,
}

impl FromStr for SituationVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reasoning" => Ok(SituationVariant::Reasoning),
            "short" => Ok(SituationVariant::Short),
            other => Err(format!("unknown situation prompt variant '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptSet {
    pub activity_prefix: String,
    pub activity_suffix: String,
    pub environment_prefix: String,
    pub environment_suffix: String,
    pub situation_prefix: String,
    pub situation_prefix_short: String,
    pub situation_suffix: String,
    pub variant: SituationVariant,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            activity_prefix: ACTIVITY_PREFIX.to_string(),
            activity_suffix: ACTIVITY_SUFFIX.to_string(),
            environment_prefix: ENVIRONMENT_PREFIX.to_string(),
            environment_suffix: ENVIRONMENT_SUFFIX.to_string(),
            situation_prefix: SITUATION_PREFIX.trim().to_string(),
            situation_prefix_short: SITUATION_PREFIX_SHORT.trim().to_string(),
            situation_suffix: SITUATION_SUFFIX.to_string(),
            variant: SituationVariant::default(),
        }
    }
}

impl PromptSet {
    pub fn with_variant(mut self, variant: SituationVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Replaces the prompts named in `overrides`, keyed by field name
    /// (`activity_prefix`, `situation_suffix`, ...). A single trailing newline
    /// is dropped from each value. Unknown keys are logged and ignored.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (key, value) in overrides {
            let value = value.strip_suffix('\n').unwrap_or(value).to_string();
            let slot = match key.as_str() {
                "activity_prefix" => &mut self.activity_prefix,
                "activity_suffix" => &mut self.activity_suffix,
                "environment_prefix" => &mut self.environment_prefix,
                "environment_suffix" => &mut self.environment_suffix,
                "situation_prefix" => &mut self.situation_prefix,
                "situation_prefix_short" => &mut self.situation_prefix_short,
                "situation_suffix" => &mut self.situation_suffix,
                _ => {
                    tracing::warn!("ignoring unknown prompt override '{}'", key);
                    continue;
                }
            };
            tracing::debug!("prompt '{}' overridden", key);
            *slot = value;
        }
        self
    }

    pub fn activity(&self, caption: &str) -> String {
        format!("{}{}{}", self.activity_prefix, caption, self.activity_suffix)
    }

    pub fn environment(&self, caption: &str) -> String {
        format!("{}{}{}", self.environment_prefix, caption, self.environment_suffix)
    }

    /// The situational question. `hand_caption` is only passed when a hand
    /// was present at tick start; a blank caption adds no hand clause. The
    /// volume is interpolated as measured, without rounding.
    pub fn situation(
        &self,
        activity: &str,
        environment: &str,
        hand_caption: Option<&str>,
        volume: f64,
    ) -> String {
        let preamble = match self.variant {
            SituationVariant::Reasoning => &self.situation_prefix,
            SituationVariant::Short => &self.situation_prefix_short,
        };

        let mut prompt = format!("{}\n\nQ: {} {}", preamble.trim_end(), activity, environment);
        if let Some(hand) = hand_caption.map(str::trim).filter(|h| !h.is_empty()) {
            prompt.push_str(" C’s hand is ");
            prompt.push_str(hand);
            if !hand.ends_with('.') {
                prompt.push('.');
            }
        }
        prompt.push_str(&format!(
            " The environmental volume level is around {volume} decibels."
        ));

        if self.variant == SituationVariant::Reasoning {
            prompt.push('\n');
            prompt.push_str(&self.situation_suffix);
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_is_wrapped() {
        let prompts = PromptSet::default();
        let activity = prompts.activity("a person at a desk");
        assert!(activity.starts_with("An egocentric view of C is showing a person at a desk. Describe"));

        let environment = prompts.environment("a person at a desk");
        assert!(environment.ends_with("Answer in the format of 'C is in...'"));
    }

    #[test]
    fn situation_includes_hand_clause_only_when_given() {
        let prompts = PromptSet::default();

        let with_hand = prompts.situation("C is typing.", "C is in an office.", Some("typing on a keyboard"), 42.0);
        assert!(with_hand.contains("Q: C is typing. C is in an office. C’s hand is typing on a keyboard."));
        assert!(with_hand.contains("around 42 decibels."));
        assert!(with_hand.ends_with("A: Let's think step by step."));

        let without = prompts.situation("C is typing.", "C is in an office.", None, 42.0);
        assert!(!without.contains("C’s hand is typing"));

        let blank = prompts.situation("C is typing.", "C is in an office.", Some("  "), 42.0);
        let (_, question) = blank.rsplit_once("Q: ").unwrap();
        assert!(!question.contains("hand is"), "bad question: {question}");
        assert!(question.starts_with("C is typing. C is in an office. The environmental volume"));
    }

    #[test]
    fn short_variant_has_no_reasoning_suffix() {
        let prompts = PromptSet::default().with_variant(SituationVariant::Short);
        let prompt = prompts.situation("C is cooking.", "C is in a kitchen.", None, 55.26);

        assert!(prompt.starts_with("Available:"));
        assert!(prompt.ends_with("around 55.26 decibels."));
        assert!(!prompt.contains("think step by step"));
    }

    #[test]
    fn overrides_replace_known_keys_only() {
        let mut overrides = HashMap::new();
        overrides.insert("activity_prefix".to_string(), "Scene: \n".to_string());
        overrides.insert("not_a_prompt".to_string(), "x".to_string());

        let prompts = PromptSet::default().with_overrides(&overrides);

        assert_eq!(prompts.activity_prefix, "Scene: ");
        assert_eq!(prompts.environment_prefix, ENVIRONMENT_PREFIX);
    }

    #[test]
    fn variant_from_str() {
        assert_eq!("Short".parse::<SituationVariant>(), Ok(SituationVariant::Short));
        assert_eq!("reasoning".parse::<SituationVariant>(), Ok(SituationVariant::Reasoning));
        assert!("long".parse::<SituationVariant>().is_err());
    }
}
