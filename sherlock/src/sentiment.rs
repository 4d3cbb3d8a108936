//! Lexicon/rule-based sentiment using VADER compound polarity.
//!
//! The label boundaries are fixed at ±0.05 (inclusive) so aggregate counts
//! stay comparable across releases.

use serde::{Deserialize, Serialize};
use std::fmt;
use vader_sentiment::SentimentIntensityAnalyzer;

pub const POSITIVE_THRESHOLD: f64 = 0.05;
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// `score >= 0.05` → Positive, `score <= -0.05` → Negative, otherwise Neutral.
    pub fn from_score(score: f64) -> Self {
        if score >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Negative => "Negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure classifier: no I/O, same text gives the same `(label, score)`.
pub struct SentimentClassifier {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl SentimentClassifier {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    /// Compound polarity in `[-1.0, 1.0]`; blank text scores 0.0.
    pub fn score(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(text);
        scores
            .get("compound")
            .copied()
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0)
    }

    pub fn classify(&self, text: &str) -> (SentimentLabel, f64) {
        let score = self.score(text);
        (SentimentLabel::from_score(score), score)
    }
}

impl Default for SentimentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Text an article is classified on: `title + ". " + summary`.
pub fn classification_text(title: &str, summary: &str) -> String {
    format!("{}. {}", title, summary)
}
