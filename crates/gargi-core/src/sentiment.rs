//! Sentiment labels attached to incoming user messages.

use serde::{Deserialize, Serialize};

/// Sentiment of a user message.
///
/// `Unknown` stands in whenever classification was skipped or failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    #[serde(rename = "POSITIVE")]
    Positive,
    #[serde(rename = "NEGATIVE")]
    Negative,
    #[serde(rename = "NEUTRAL")]
    Neutral,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
            SentimentLabel::Neutral => "NEUTRAL",
            SentimentLabel::Unknown => "unknown",
        }
    }

    /// Map a classifier's raw label onto a sentiment.
    ///
    /// Accepts the usual spellings (`POSITIVE`, `pos`, `negative`, ...) and the
    /// index labels of three-class models (`LABEL_0` negative, `LABEL_1`
    /// neutral, `LABEL_2` positive). Anything else is `Unknown`.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "label_2" => SentimentLabel::Positive,
            "negative" | "neg" | "label_0" => SentimentLabel::Negative,
            "neutral" | "neu" | "label_1" => SentimentLabel::Neutral,
            _ => SentimentLabel::Unknown,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
