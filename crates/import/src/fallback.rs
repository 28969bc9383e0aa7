use crate::classify::CATEGORY_KEYWORDS;
use crate::util::similarity;
use carbonwatch_core::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("Fallback model not available: {0}")]
    Unavailable(String),
    #[error("Prediction failed: {0}")]
    Prediction(String),
}

/// A secondary classifier consulted when no keyword matches.
///
/// Implementations receive the lower-cased classification text and return a
/// category label, or `None` for no opinion. Labels are validated against
/// [`Category`] by the caller; anything outside the set is discarded.
pub trait FallbackClassifier: Send + Sync {
    fn predict(&self, text: &str) -> Result<Option<String>, FallbackError>;
}

// ── Fixed label (tests and pinned deployments) ───────────────────────────────

/// Always answers with the same label.
pub struct FixedLabelClassifier {
    pub label: String,
}

impl FixedLabelClassifier {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl FallbackClassifier for FixedLabelClassifier {
    fn predict(&self, _text: &str) -> Result<Option<String>, FallbackError> {
        Ok(Some(self.label.clone()))
    }
}

// ── Lexicon (fuzzy merchant spelling) ────────────────────────────────────────

pub const DEFAULT_FUZZY_THRESHOLD: f32 = 0.8;

/// Shorter words produce too many near-misses to be useful.
const MIN_WORD_LEN: usize = 5;

/// Matches misspelt or truncated merchant words ("swigy", "flipkrt") against
/// the single-word keywords by edit-distance similarity.
pub struct LexiconClassifier {
    entries: Vec<(String, Category)>,
    threshold: f32,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::builtin(DEFAULT_FUZZY_THRESHOLD)
    }
}

impl LexiconClassifier {
    pub fn builtin(threshold: f32) -> Self {
        let entries = CATEGORY_KEYWORDS
            .iter()
            .flat_map(|(cat, words)| words.iter().map(move |w| (*cat, *w)))
            .filter(|(_, w)| w.len() >= MIN_WORD_LEN && !w.contains(' '))
            .map(|(cat, w)| (w.to_string(), cat))
            .collect();
        Self::new(entries, threshold)
    }

    pub fn new(entries: Vec<(String, Category)>, threshold: f32) -> Self {
        Self {
            entries,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

impl FallbackClassifier for LexiconClassifier {
    fn predict(&self, text: &str) -> Result<Option<String>, FallbackError> {
        let mut best: Option<(f32, Category)> = None;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= MIN_WORD_LEN - 1)
        {
            for (entry, category) in &self.entries {
                let score = similarity(word, entry);
                if score >= self.threshold && best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, *category));
                }
            }
        }
        Ok(best.map(|(_, category)| category.as_str().to_string()))
    }
}
