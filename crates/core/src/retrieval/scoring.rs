//! Additive relevance scoring of a product against an intent and the literal query.

use serde::{Deserialize, Serialize};

use crate::catalog::filter::color_matches;
use crate::domain::intent::QueryIntent;
use crate::domain::product::Product;
use crate::text::meaningful_words;

/// Weights for scoring components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Intent category found in the product category (default: 10)
    pub category: f64,
    /// Intent type found in the product type (default: 10)
    pub product_type: f64,
    /// Any intent color matches the product color (default: 5)
    pub color: f64,
    /// Per intent keyword found in the product text (default: 3)
    pub keyword: f64,
    /// Price at or below the intent maximum (default: 5)
    pub price_max: f64,
    /// Price at or above the intent minimum (default: 5)
    pub price_min: f64,
    /// Extra when both bounds are present and satisfied (default: 3)
    pub price_range_bonus: f64,
    /// Scenario heuristic hit (default: 5)
    pub scenario: f64,
    /// Per meaningful query word found in the product name (default: 8)
    pub name_word: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        super::DEFAULT_WEIGHTS
    }
}

/// Scenario label, product terms that suit it.
pub const SCENARIO_PRODUCT_TERMS: &[(&str, &[&str])] = &[
    ("formal", &["clothing", "suit", "blazer", "dress", "shirt", "loafer", "heel", "tie"]),
    ("winter", &["jacket", "coat", "boot", "sweater", "scarf", "beanie", "parka", "wool"]),
    ("summer", &["t-shirt", "short", "sandal", "sunglass", "dress", "linen", "tank"]),
    ("beach", &["sandal", "swim", "sunglass", "hat", "short"]),
    ("workout", &["sneaker", "legging", "athletic", "short", "tank", "hoodie"]),
    ("office", &["shirt", "blazer", "trouser", "loafer", "bag"]),
    ("party", &["dress", "heel", "shirt", "jewelry"]),
    ("outdoor", &["boot", "jacket", "backpack", "hiking"]),
    ("casual", &["t-shirt", "jean", "sneaker", "hoodie", "cap"]),
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub category: f64,
    pub product_type: f64,
    pub color: f64,
    pub keywords: f64,
    pub price: f64,
    pub scenario: f64,
    pub name: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.category
            + self.product_type
            + self.color
            + self.keywords
            + self.price
            + self.scenario
            + self.name
    }
}

/// Score calculator for retrieval candidates
#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    weights: ScoringWeights,
}

impl ScoreCalculator {
    pub fn new() -> Self {
        Self { weights: ScoringWeights::default() }
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(&self, product: &Product, intent: &QueryIntent, query: &str) -> f64 {
        self.breakdown(product, intent, query).total()
    }

    pub fn breakdown(
        &self,
        product: &Product,
        intent: &QueryIntent,
        query: &str,
    ) -> ScoreBreakdown {
        let weights = &self.weights;
        let text = product.searchable_text();
        let mut breakdown = ScoreBreakdown::default();

        if let Some(category) = non_blank(intent.category.as_deref()) {
            if product.category.to_lowercase().contains(&category) {
                breakdown.category = weights.category;
            }
        }
        if let Some(product_type) = non_blank(intent.product_type.as_deref()) {
            if product.product_type.to_lowercase().contains(&product_type) {
                breakdown.product_type = weights.product_type;
            }
        }
        if intent.colors.iter().any(|color| color_matches(&product.color, color)) {
            breakdown.color = weights.color;
        }

        let matched_keywords = intent
            .keywords
            .iter()
            .filter_map(|keyword| non_blank(Some(keyword.as_str())))
            .filter(|keyword| text.contains(keyword))
            .count();
        breakdown.keywords = weights.keyword * matched_keywords as f64;

        let (min, max) = (intent.min_price(), intent.max_price());
        let within_max = max.is_some_and(|max| product.price <= max);
        let within_min = min.is_some_and(|min| product.price >= min);
        if within_max {
            breakdown.price += weights.price_max;
        }
        if within_min {
            breakdown.price += weights.price_min;
        }
        if within_max && within_min {
            breakdown.price += weights.price_range_bonus;
        }

        if let Some(scenario) = non_blank(intent.scenario.as_deref()) {
            if suits_scenario(product, &scenario) {
                breakdown.scenario = weights.scenario;
            }
        }

        let name = product.name.to_lowercase();
        let name_hits =
            meaningful_words(query, 3).iter().filter(|word| name.contains(*word)).count();
        breakdown.name = weights.name_word * name_hits as f64;

        breakdown
    }
}

fn suits_scenario(product: &Product, scenario: &str) -> bool {
    let Some((_, terms)) = SCENARIO_PRODUCT_TERMS.iter().find(|(label, _)| *label == scenario)
    else {
        return false;
    };
    let descriptor = format!(
        "{} {} {}",
        product.category.to_lowercase(),
        product.product_type.to_lowercase(),
        product.name.to_lowercase()
    );
    terms.iter().any(|term| descriptor.contains(term))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(|value| value.trim().to_lowercase()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ScoreCalculator, ScoringWeights};
    use crate::domain::intent::{PriceRange, QueryIntent};
    use crate::domain::product::Product;

    fn jacket() -> Product {
        Product::new("A", "Alpine Down Jacket", Decimal::from(120))
            .with_category("Clothing")
            .with_type("Jacket")
            .with_color("Black/Grey")
            .with_description("Warm insulated jacket for cold weather")
    }

    #[test]
    fn sums_every_matching_component() {
        let intent = QueryIntent {
            category: Some("clothing".to_string()),
            product_type: Some("jacket".to_string()),
            colors: vec!["grey".to_string()],
            keywords: vec!["warm".to_string(), "insulated".to_string(), "silk".to_string()],
            price_range: Some(PriceRange {
                min: Some(Decimal::from(100)),
                max: Some(Decimal::from(150)),
            }),
            scenario: Some("winter".to_string()),
            ..QueryIntent::default()
        };

        let breakdown = ScoreCalculator::new().breakdown(&jacket(), &intent, "alpine jacket");
        assert_eq!(breakdown.category, 10.0);
        assert_eq!(breakdown.product_type, 10.0);
        assert_eq!(breakdown.color, 5.0);
        assert_eq!(breakdown.keywords, 6.0);
        assert_eq!(breakdown.price, 13.0);
        assert_eq!(breakdown.scenario, 5.0);
        assert_eq!(breakdown.name, 16.0);
        assert_eq!(breakdown.total(), 65.0);
    }

    #[test]
    fn out_of_range_price_scores_only_the_satisfied_bound() {
        let intent = QueryIntent {
            price_range: Some(PriceRange {
                min: Some(Decimal::from(10)),
                max: Some(Decimal::from(50)),
            }),
            ..QueryIntent::default()
        };
        let score = ScoreCalculator::new().score(&jacket(), &intent, "");
        assert_eq!(score, 5.0);
    }

    #[test]
    fn literal_name_match_outranks_category_match() {
        let calculator = ScoreCalculator::new();
        let intent =
            QueryIntent { category: Some("clothing".to_string()), ..QueryIntent::default() };
        let named = Product::new("N", "Alpine Fleece", Decimal::from(60)).with_category("Outdoor");
        let categorical =
            Product::new("C", "Plain Tee", Decimal::from(20)).with_category("Clothing");

        let named_score = calculator.score(&named, &intent, "the alpine fleece");
        let categorical_score = calculator.score(&categorical, &intent, "the alpine fleece");
        assert!(named_score > categorical_score);
    }

    #[test]
    fn custom_weights_are_respected() {
        let weights = ScoringWeights { name_word: 1.0, ..ScoringWeights::default() };
        let score = ScoreCalculator::with_weights(weights).score(
            &jacket(),
            &QueryIntent::default(),
            "alpine down jacket",
        );
        assert_eq!(score, 3.0);
    }
}
