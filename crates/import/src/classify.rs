use crate::fallback::FallbackClassifier;
use carbonwatch_core::Category;
use tracing::{debug, warn};

/// Transfers, interest, cash, loans and fees are not spending with a footprint.
pub const IGNORE_KEYWORDS: &[&str] = &[
    "neft",
    "imps",
    "rtgs",
    "fund transfer",
    "a/c transfer",
    "int.pb.",
    "interest",
    "int.paid",
    "atm",
    "cash withdrawal",
    "cash deposit",
    "self transfer",
    "own account",
    "emi ",
    "loan repay",
    "insurance premium",
    "lic premium",
    "sip ",
    "mutual fund",
    "mf purchase",
    "investment",
    "bank charge",
    "service charge",
    "sms charge",
    "annual fee",
    "gst on",
    "tds ",
    "salary credit",
    "credit interest",
];

/// Checked in this order; a keyword listed under two categories resolves to
/// the earlier one.
pub const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Travel,
        &[
            "indigo", "air india", "spicejet", "vistara", "akasa", "uber", "ola", "rapido", "taxi",
            "cab", "petrol", "diesel", "fuel", "indian oil", "bpcl", "shell", "irctc", "railway",
            "redbus", "metro", "toll", "fastag", "makemytrip", "goibibo", "yatra", "cleartrip",
        ],
    ),
    (
        Category::Food,
        &[
            "srm ist canteen", "canteen", "restaurant", "cafe", "coffee", "starbucks", "ccd",
            "mcdonald", "burger", "pizza", "dominos", "kfc", "subway", "swiggy", "zomato", "food",
            "eatsure", "bigbasket", "dmart", "blinkit", "zepto", "instamart", "jiomart", "grofers",
            "reliance fresh", "more supermarket", "vendolite",
        ],
    ),
    (
        Category::Shopping,
        &[
            "blinkit", "zepto", "instamart", "jiomart", "durga swami", "amazon", "flipkart",
            "myntra", "ajio", "nykaa", "meesho", "snapdeal", "croma", "reliance digital",
            "shoppers stop", "lifestyle", "central", "westside", "decathlon", "puma", "nike",
            "adidas", "bistro", "electronics", "mobile", "supermarket", "super market",
        ],
    ),
    (
        Category::Electricity,
        &[
            "electricity", "bescom", "tata power", "adani electricity", "torrent power",
            "reliance energy", "power bill", "mseb",
        ],
    ),
    (
        Category::Gas,
        &[
            "gas bill", "png", "mahanagar gas", "indraprastha gas", "igl", "lpg", "hp gas",
            "bharat gas", "indane", "cooking gas",
        ],
    ),
    (
        Category::Water,
        &["water bill", "municipal", "water supply", "jal board", "bwssb", "delhi jal board"],
    ),
    (
        Category::Home,
        &[
            "ikea", "pepperfry", "urban ladder", "hometown", "asian paints", "berger", "rent",
            "society", "maintenance", "housing", "jio", "airtel", "vodafone", "bsnl", "broadband",
            "internet", "wifi", "dth", "tata sky",
        ],
    ),
];

/// Outcome of classifying one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Category(Category),
    /// Matched an ignore keyword; the row is not a footprint-bearing purchase.
    Ignore,
    NoOpinion,
}

/// Lower-cased `"{merchant} {description}"`. The trailing space left by an
/// empty description lets keywords such as `"emi "` match at the end.
pub fn classification_text(merchant: &str, description: Option<&str>) -> String {
    format!("{} {}", merchant, description.unwrap_or("")).to_lowercase()
}

/// Case-insensitive substring matching against ordered keyword tables.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    ignore: Vec<String>,
    categories: Vec<(Category, Vec<String>)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KeywordClassifier {
    pub fn builtin() -> Self {
        Self {
            ignore: IGNORE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            categories: CATEGORY_KEYWORDS
                .iter()
                .map(|(cat, words)| (*cat, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        }
    }

    /// Extra ignore keywords are appended. Extra category keywords are
    /// appended to that category's list, keeping category order intact.
    pub fn with_extra_keywords<I, K>(mut self, extra_ignore: I, extra: &[(Category, Vec<String>)]) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.ignore.extend(
            extra_ignore
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.trim().is_empty()),
        );
        for (category, words) in extra {
            let words = words
                .iter()
                .map(|w| w.to_lowercase())
                .filter(|w| !w.trim().is_empty());
            match self.categories.iter_mut().find(|(c, _)| c == category) {
                Some((_, list)) => list.extend(words),
                None => self.categories.push((*category, words.collect())),
            }
        }
        self
    }

    /// `text` must already be lower-cased.
    pub fn is_ignored(&self, text: &str) -> bool {
        self.ignore.iter().any(|k| text.contains(k.as_str()))
    }

    /// `text` must already be lower-cased.
    pub fn match_category(&self, text: &str) -> Option<Category> {
        self.categories
            .iter()
            .find(|(_, words)| words.iter().any(|w| text.contains(w.as_str())))
            .map(|(cat, _)| *cat)
    }

    pub fn classify(&self, merchant: &str, description: Option<&str>) -> Classification {
        let text = classification_text(merchant, description);
        if self.is_ignored(&text) {
            return Classification::Ignore;
        }
        match self.match_category(&text) {
            Some(category) => Classification::Category(category),
            None => Classification::NoOpinion,
        }
    }
}

/// Keyword tables first, then an optional fallback model for rows no keyword
/// recognises.
pub struct Classifier {
    keywords: KeywordClassifier,
    fallback: Option<Box<dyn FallbackClassifier>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(KeywordClassifier::builtin())
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("keywords", &self.keywords)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Classifier {
    pub fn new(keywords: KeywordClassifier) -> Self {
        Self {
            keywords,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn FallbackClassifier>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Ignore keywords win over everything, including `hint` (a category the
    /// statement itself supplied). Then the hint, the keyword tables, and
    /// finally the fallback.
    pub fn classify(
        &self,
        merchant: &str,
        description: Option<&str>,
        hint: Option<Category>,
    ) -> Classification {
        let text = classification_text(merchant, description);
        if self.keywords.is_ignored(&text) {
            return Classification::Ignore;
        }
        if let Some(category) = hint {
            return Classification::Category(category);
        }
        if let Some(category) = self.keywords.match_category(&text) {
            return Classification::Category(category);
        }
        match self.consult_fallback(&text) {
            Some(category) => Classification::Category(category),
            None => Classification::NoOpinion,
        }
    }

    fn consult_fallback(&self, text: &str) -> Option<Category> {
        let fallback = self.fallback.as_deref()?;
        match fallback.predict(text) {
            Ok(Some(label)) => match Category::from_label(&label) {
                Some(category) => {
                    debug!(%category, "fallback classifier supplied category");
                    Some(category)
                }
                None => {
                    warn!(label = %label, "fallback classifier returned a label outside the category set");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "fallback classifier failed");
                None
            }
        }
    }
}
