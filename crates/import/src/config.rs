use crate::carbon::CarbonEstimator;
use crate::classify::{Classifier, KeywordClassifier};
use crate::fallback::{LexiconClassifier, DEFAULT_FUZZY_THRESHOLD};
use crate::pipeline::ImportPipeline;
use crate::schema::{SchemaDetector, DEFAULT_MATCH_THRESHOLD, DEFAULT_SCAN_ROWS};
use carbonwatch_core::Category;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid import config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid import config: {0}")]
    Invalid(String),
}

/// Tunables for the import pipeline. Every field has a default, so an empty
/// document is a valid config.
///
/// ```toml
/// header_scan_rows = 50
///
/// [carbon]
/// default_factor = 0.0015
/// merchant_factors = [{ pattern = "local bakery", factor = 0.0009 }]
///
/// [keywords]
/// extra_ignore = ["gym membership"]
/// extra = [{ category = "Home", keywords = ["landlord"] }]
///
/// [fallback]
/// enabled = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub header_scan_rows: usize,
    pub header_match_threshold: usize,
    pub carbon: CarbonConfig,
    pub keywords: KeywordConfig,
    pub fallback: FallbackConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: DEFAULT_SCAN_ROWS,
            header_match_threshold: DEFAULT_MATCH_THRESHOLD,
            carbon: CarbonConfig::default(),
            keywords: KeywordConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonConfig {
    pub default_factor: Option<Decimal>,
    pub merchant_factors: Vec<MerchantFactor>,
    pub category_factors: Vec<CategoryFactor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantFactor {
    pub pattern: String,
    pub factor: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFactor {
    pub category: Category,
    pub factor: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub extra_ignore: Vec<String>,
    pub extra: Vec<CategoryKeywords>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub category: Category,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub fuzzy_threshold: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl ImportConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ImportConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.header_scan_rows == 0 {
            return Err(ConfigError::Invalid("header_scan_rows must be at least 1".into()));
        }
        if self.header_match_threshold == 0 {
            return Err(ConfigError::Invalid("header_match_threshold must be at least 1".into()));
        }
        let negative = self
            .carbon
            .default_factor
            .iter()
            .chain(self.carbon.merchant_factors.iter().map(|m| &m.factor))
            .chain(self.carbon.category_factors.iter().map(|c| &c.factor))
            .any(|f| f.is_sign_negative() && !f.is_zero());
        if negative {
            return Err(ConfigError::Invalid("carbon factors cannot be negative".into()));
        }
        if !(0.0..=1.0).contains(&self.fallback.fuzzy_threshold) {
            return Err(ConfigError::Invalid("fuzzy_threshold must be between 0 and 1".into()));
        }
        Ok(())
    }

    pub fn carbon_estimator(&self) -> CarbonEstimator {
        let mut estimator = CarbonEstimator::builtin()
            .with_merchant_factors(
                self.carbon
                    .merchant_factors
                    .iter()
                    .map(|m| (m.pattern.clone(), m.factor)),
            )
            .with_category_factors(self.carbon.category_factors.iter().map(|c| (c.category, c.factor)));
        if let Some(factor) = self.carbon.default_factor {
            estimator = estimator.with_default_factor(factor);
        }
        estimator
    }

    pub fn classifier(&self) -> Classifier {
        let extra: Vec<(Category, Vec<String>)> = self
            .keywords
            .extra
            .iter()
            .map(|k| (k.category, k.keywords.clone()))
            .collect();
        let keywords = KeywordClassifier::builtin().with_extra_keywords(&self.keywords.extra_ignore, &extra);
        let classifier = Classifier::new(keywords);
        if self.fallback.enabled {
            classifier.with_fallback(Box::new(LexiconClassifier::builtin(self.fallback.fuzzy_threshold)))
        } else {
            classifier
        }
    }

    pub fn build_pipeline(&self) -> ImportPipeline {
        ImportPipeline::new(
            SchemaDetector::new(self.header_scan_rows, self.header_match_threshold),
            self.classifier(),
            self.carbon_estimator(),
        )
    }
}
