use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Search,
    Recommendation,
    Question,
    Comparison,
    /// The message did not reveal a kind; selection uses the default budget.
    #[default]
    #[serde(other)]
    Unspecified,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Recommendation => "recommendation",
            Self::Question => "question",
            Self::Comparison => "comparison",
            Self::Unspecified => "unspecified",
        }
    }

    pub fn parse_loose(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "search" => Self::Search,
            "recommendation" | "recommend" => Self::Recommendation,
            "question" => Self::Question,
            "comparison" | "compare" => Self::Comparison,
            _ => Self::Unspecified,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub min: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub max: Option<Decimal>,
}

impl PriceRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// What the customer appears to want from a single message. Built fresh per message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryIntent {
    #[serde(default)]
    pub intent_kind: IntentKind,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type", default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub price_range: Option<PriceRange>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub is_price_query: bool,
    #[serde(default)]
    pub is_category_query: bool,
    #[serde(default)]
    pub is_size_query: bool,
}

impl QueryIntent {
    pub fn min_price(&self) -> Option<Decimal> {
        self.price_range.as_ref().and_then(|range| range.min)
    }

    pub fn max_price(&self) -> Option<Decimal> {
        self.price_range.as_ref().and_then(|range| range.max)
    }

    pub fn has_keywords(&self) -> bool {
        self.keywords.iter().any(|keyword| !keyword.trim().is_empty())
    }
}
