use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};

/// How a recommendation was recovered from an assistant reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Tagged,
    PriceAnchored,
    NameOnly,
}

/// A recommendation that has been validated against the catalog snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecommendation {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub reason: String,
    /// `None` when the entry came from ranking rather than reply parsing.
    #[serde(skip)]
    pub strategy: Option<MatchStrategy>,
}

impl ExtractedRecommendation {
    pub fn from_product(
        product: &Product,
        reason: impl Into<String>,
        strategy: Option<MatchStrategy>,
    ) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            reason: reason.into(),
            strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ExtractedRecommendation, MatchStrategy};
    use crate::domain::product::Product;

    #[test]
    fn serialized_payload_omits_strategy_and_uses_numeric_price() {
        let product = Product::new("B", "Cap", Decimal::new(1999, 2));
        let recommendation = ExtractedRecommendation::from_product(
            &product,
            "fits budget",
            Some(MatchStrategy::Tagged),
        );

        let json = serde_json::to_value(&recommendation).expect("serialize");
        assert_eq!(json["id"], "B");
        assert_eq!(json["price"], 19.99);
        assert!(json.get("strategy").is_none());
    }
}
