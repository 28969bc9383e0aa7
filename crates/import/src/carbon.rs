use carbonwatch_core::{Carbon, Category, Money};
use rust_decimal::Decimal;

// Factors are kg CO₂ per currency unit, written in millionths.

/// Merchant-specific factors. Checked in order, first substring hit wins.
pub const MERCHANT_FACTORS: &[(&str, i64)] = &[
    ("indigo", 4400),
    ("air india", 4400),
    ("spicejet", 4200),
    ("vistara", 4400),
    ("akasa", 4200),
    ("indian oil", 3100),
    ("hp petrol", 3100),
    ("bharat petroleum", 3100),
    ("bpcl", 3100),
    ("shell", 3100),
    ("petrol", 3100),
    ("uber", 1900),
    ("ola", 1900),
    ("rapido", 1500),
    ("metro", 600),
    ("irctc", 2500),
    ("mcdonald", 560),
    ("burger king", 560),
    ("kfc", 560),
    ("dominos", 500),
    ("pizza hut", 500),
    ("starbucks", 310),
    ("cafe coffee day", 280),
    ("ccd", 280),
    ("bigbasket", 350),
    ("dmart", 320),
    ("blinkit", 380),
    ("zepto", 380),
    ("swiggy", 450),
    ("zomato", 450),
    ("amazon", 690),
    ("flipkart", 650),
    ("myntra", 600),
    ("nykaa", 550),
    ("electricity", 150),
    ("bescom", 150),
    ("tata power", 150),
    ("gas bill", 120),
    ("mahanagar gas", 120),
    ("water bill", 60),
];

pub const CATEGORY_FACTORS: &[(Category, i64)] = &[
    (Category::Travel, 3000),
    (Category::Food, 1600),
    (Category::Shopping, 2500),
    (Category::Electricity, 800),
    (Category::Gas, 1200),
    (Category::Water, 300),
    (Category::Home, 2800),
];

pub const DEFAULT_FACTOR_MILLIONTHS: i64 = 1500;

fn millionths(value: i64) -> Decimal {
    Decimal::new(value, 6)
}

/// Spend-based carbon estimation: amount × factor, rounded to 2 places.
#[derive(Debug, Clone)]
pub struct CarbonEstimator {
    merchant_factors: Vec<(String, Decimal)>,
    category_factors: Vec<(Category, Decimal)>,
    default_factor: Decimal,
}

impl Default for CarbonEstimator {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CarbonEstimator {
    pub fn builtin() -> Self {
        Self {
            merchant_factors: MERCHANT_FACTORS
                .iter()
                .map(|(m, f)| (m.to_string(), millionths(*f)))
                .collect(),
            category_factors: CATEGORY_FACTORS
                .iter()
                .map(|(c, f)| (*c, millionths(*f)))
                .collect(),
            default_factor: millionths(DEFAULT_FACTOR_MILLIONTHS),
        }
    }

    /// Extra merchant factors are consulted before the built-in list.
    pub fn with_merchant_factors<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (String, Decimal)>,
    {
        let mut merged: Vec<(String, Decimal)> = extra
            .into_iter()
            .map(|(m, f)| (m.trim().to_lowercase(), f))
            .filter(|(m, _)| !m.is_empty())
            .collect();
        merged.append(&mut self.merchant_factors);
        self.merchant_factors = merged;
        self
    }

    /// Replaces the factor for each listed category.
    pub fn with_category_factors<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (Category, Decimal)>,
    {
        for (category, factor) in overrides {
            match self.category_factors.iter_mut().find(|(c, _)| *c == category) {
                Some(entry) => entry.1 = factor,
                None => self.category_factors.push((category, factor)),
            }
        }
        self
    }

    pub fn with_default_factor(mut self, factor: Decimal) -> Self {
        self.default_factor = factor;
        self
    }

    /// Merchant substring first, then category, then the default.
    pub fn factor_for(&self, category: Category, merchant: &str) -> Decimal {
        let merchant = merchant.to_lowercase();
        self.merchant_factors
            .iter()
            .find(|(key, _)| merchant.contains(key.as_str()))
            .map(|(_, f)| *f)
            .or_else(|| {
                self.category_factors
                    .iter()
                    .find(|(c, _)| *c == category)
                    .map(|(_, f)| *f)
            })
            .unwrap_or(self.default_factor)
    }

    /// Zero for non-positive amounts. Otherwise never negative.
    pub fn estimate(&self, amount: Money, category: Category, merchant: &str) -> Carbon {
        if !amount.is_positive() {
            return Carbon::zero();
        }
        let factor = self.factor_for(category, merchant).max(Decimal::ZERO);
        Carbon::from_decimal(amount.as_decimal() * factor)
    }
}
