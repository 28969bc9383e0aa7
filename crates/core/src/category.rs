use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of spending categories a transaction can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Travel,
    Food,
    Shopping,
    Electricity,
    Gas,
    Water,
    Home,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown category: '{0}'")]
pub struct UnknownCategory(pub String);

impl Category {
    /// Declaration order. Keyword tables and reports iterate in this order.
    pub const ALL: [Category; 7] = [
        Category::Travel,
        Category::Food,
        Category::Shopping,
        Category::Electricity,
        Category::Gas,
        Category::Water,
        Category::Home,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Travel => "Travel",
            Category::Food => "Food",
            Category::Shopping => "Shopping",
            Category::Electricity => "Electricity",
            Category::Gas => "Gas",
            Category::Water => "Water",
            Category::Home => "Home",
        }
    }

    /// Resolve a free-form label against the closed set: exact match first,
    /// then case-insensitive. Surrounding whitespace is ignored.
    pub fn from_label(label: &str) -> Option<Category> {
        let label = label.trim();
        Category::ALL
            .iter()
            .find(|c| c.as_str() == label)
            .or_else(|| {
                Category::ALL
                    .iter()
                    .find(|c| c.as_str().eq_ignore_ascii_case(label))
            })
            .copied()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_label(s).ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
