//! Row-level data types shared by the classifier, store and scheduler

/// Sentiment label persisted in the `sentiment_class` column.
///
/// `Error` and `Skip` are sentinels: they mark rows that reached a terminal
/// state without a substantive classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SentimentClass {
    Positive,
    Negative,
    Neutral,
    Error,
    Skip,
}

impl SentimentClass {
    pub const ALL: [Self; 5] = [
        Self::Positive,
        Self::Negative,
        Self::Neutral,
        Self::Error,
        Self::Skip,
    ];

    /// Persisted column value
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Error => "error",
            Self::Skip => "skip",
        }
    }

    /// Parse a persisted column value.
    ///
    /// Checkpoints that stored the model's raw label (积极/消极/中性) are read
    /// as the matching substantive class.
    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .or_else(|| Self::from_model_label(s))
    }

    /// Parse a label produced by the model.
    ///
    /// Only the three substantive labels are accepted; the Chinese labels of
    /// the prompt language are mapped onto them.
    pub fn from_model_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "积极" => Some(Self::Positive),
            "negative" | "消极" => Some(Self::Negative),
            "neutral" | "中性" => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn is_sentinel(self) -> bool {
        matches!(self, Self::Error | Self::Skip)
    }
}

impl std::fmt::Display for SentimentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one poem. Always complete: all four fields are set.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    pub sentiment_class: SentimentClass,
    /// Strength in [0.0, 1.0]; -1.0 marks an unrecoverable error
    pub sentiment_score: f64,
    /// At most [`MAX_KEYWORDS`], in the order the model gave them
    pub keywords: Vec<String>,
    pub analysis: String,
}

/// Keywords kept per row
pub const MAX_KEYWORDS: usize = 3;

/// Score reserved for error rows
pub const ERROR_SCORE: f64 = -1.0;

impl ClassificationResult {
    /// Substantive result; keywords beyond [`MAX_KEYWORDS`] are dropped.
    ///
    /// Keywords are trimmed, blanks removed, and ASCII commas replaced by the
    /// full-width `，` so the persisted keyword list splits back unchanged.
    pub fn new(
        sentiment_class: SentimentClass,
        sentiment_score: f64,
        keywords: Vec<String>,
        analysis: impl Into<String>,
    ) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().replace(',', "，"))
            .filter(|k| !k.is_empty())
            .take(MAX_KEYWORDS)
            .collect();
        Self {
            sentiment_class,
            sentiment_score,
            keywords,
            analysis: analysis.into(),
        }
    }

    /// Sentinel after the classifier ran out of attempts
    pub fn retries_exhausted() -> Self {
        Self::error("retry budget exhausted")
    }

    /// Sentinel for a failure outside the classifier's own retry loop
    pub fn worker_failure(reason: impl Into<String>) -> Self {
        Self::error(reason)
    }

    fn error(analysis: impl Into<String>) -> Self {
        Self {
            sentiment_class: SentimentClass::Error,
            sentiment_score: ERROR_SCORE,
            keywords: Vec::new(),
            analysis: analysis.into(),
        }
    }

    /// Sentinel for blank content, which is never sent to the model
    pub fn skip() -> Self {
        Self {
            sentiment_class: SentimentClass::Skip,
            sentiment_score: 0.0,
            keywords: Vec::new(),
            analysis: "empty content".to_string(),
        }
    }
}

/// One pending row handed to a worker.
#[derive(Clone, Debug)]
pub struct WorkItem {
    /// Position of the row in the dataset
    pub index: usize,
    pub text: String,
}
