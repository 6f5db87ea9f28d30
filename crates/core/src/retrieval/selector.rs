use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{IntentBudgets, ScoreCalculator, ScoredCandidate, DEFAULT_PASSTHROUGH_THRESHOLD};
use crate::catalog::criteria::parse_criteria;
use crate::catalog::filter::{filter_products, FilterCriteria};
use crate::domain::intent::QueryIntent;
use crate::domain::product::Product;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Small catalog returned unchanged.
    Passthrough,
    /// Message criteria narrowed the catalog within budget.
    Filtered,
    /// Filtered set was over budget and got ranked.
    Ranked,
    /// Nothing matched the criteria; intent keywords were ranked over the full catalog.
    KeywordRanked,
    /// Every strategy came up empty; the head of the catalog is used.
    CatalogHead,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub products: Vec<Product>,
    /// Populated only when ranking ran, in descending score order.
    pub scored: Vec<ScoredCandidate>,
    pub strategy: SelectionStrategy,
    pub budget: usize,
}

#[derive(Clone, Debug)]
pub struct CandidateSelector {
    calculator: ScoreCalculator,
    budgets: IntentBudgets,
    passthrough_threshold: usize,
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::new(ScoreCalculator::new(), IntentBudgets::default(), DEFAULT_PASSTHROUGH_THRESHOLD)
    }
}

impl CandidateSelector {
    pub fn new(
        calculator: ScoreCalculator,
        budgets: IntentBudgets,
        passthrough_threshold: usize,
    ) -> Self {
        Self { calculator, budgets, passthrough_threshold }
    }

    pub fn budget_for(&self, intent: &QueryIntent) -> usize {
        self.budgets.for_kind(intent.intent_kind).max(1)
    }

    /// Picks the candidate set for one message. `max_products` overrides the intent budget.
    pub fn select(
        &self,
        products: &[Product],
        message: &str,
        intent: &QueryIntent,
        max_products: Option<usize>,
    ) -> Selection {
        let budget = max_products.map_or_else(|| self.budget_for(intent), |max| max.max(1));

        if products.len() <= self.passthrough_threshold {
            let strategy = SelectionStrategy::Passthrough;
            return self.finish(products.to_vec(), Vec::new(), strategy, budget);
        }

        let criteria = parse_criteria(message);
        let filtered = filter_products(products, &criteria);

        if filtered.len() > budget {
            let scored = self.rank(filtered, intent, message, budget);
            return self.finish_ranked(scored, SelectionStrategy::Ranked, budget);
        }
        if !filtered.is_empty() {
            return self.finish(filtered, Vec::new(), SelectionStrategy::Filtered, budget);
        }

        if intent.has_keywords() {
            let keyword_criteria = FilterCriteria::keywords_only(intent.keywords.clone());
            let keyword_matches = filter_products(products, &keyword_criteria);
            if !keyword_matches.is_empty() {
                let scored = self.rank(keyword_matches, intent, message, budget);
                return self.finish_ranked(scored, SelectionStrategy::KeywordRanked, budget);
            }
        }

        let head = products.iter().take(budget).cloned().collect();
        self.finish(head, Vec::new(), SelectionStrategy::CatalogHead, budget)
    }

    /// Scores and keeps the top `limit`; equal scores keep catalog order.
    pub fn rank(
        &self,
        candidates: Vec<Product>,
        intent: &QueryIntent,
        message: &str,
        limit: usize,
    ) -> Vec<ScoredCandidate> {
        let mut scored = candidates
            .into_iter()
            .map(|product| {
                let score = self.calculator.score(&product, intent, message);
                ScoredCandidate { product, score }
            })
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| {
            right.score.partial_cmp(&left.score).unwrap_or(Ordering::Equal)
        });
        scored.truncate(limit);
        scored
    }

    fn finish_ranked(
        &self,
        scored: Vec<ScoredCandidate>,
        strategy: SelectionStrategy,
        budget: usize,
    ) -> Selection {
        let products = scored.iter().map(|candidate| candidate.product.clone()).collect();
        self.finish(products, scored, strategy, budget)
    }

    fn finish(
        &self,
        products: Vec<Product>,
        scored: Vec<ScoredCandidate>,
        strategy: SelectionStrategy,
        budget: usize,
    ) -> Selection {
        debug!(
            event_name = "retrieval.selected",
            strategy = ?strategy,
            budget,
            selected = products.len(),
            "candidate set selected"
        );
        Selection { products, scored, strategy, budget }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{CandidateSelector, SelectionStrategy};
    use crate::domain::intent::{IntentKind, QueryIntent};
    use crate::domain::product::Product;
    use crate::intent::KeywordIntentBuilder;
    use crate::retrieval::{IntentBudgets, ScoreCalculator};

    fn large_catalog(size: usize) -> Vec<Product> {
        (0..size)
            .map(|index| {
                let (category, product_type, color) = match index % 4 {
                    0 => ("Clothing", "Jacket", "Black"),
                    1 => ("Accessories", "Cap", "Red"),
                    2 => ("Footwear", "Boots", "Brown"),
                    _ => ("Clothing", "T-Shirt", "White/Blue"),
                };
                Product::new(
                    format!("P{index:03}"),
                    format!("{color} {product_type} {index}"),
                    Decimal::from(10 + (index as i64 % 20) * 5),
                )
                .with_category(category)
                .with_type(product_type)
                .with_color(color)
            })
            .collect()
    }

    fn intent_of(kind: IntentKind) -> QueryIntent {
        QueryIntent { intent_kind: kind, ..QueryIntent::default() }
    }

    #[test]
    fn small_catalog_is_passed_through_unchanged() {
        let selector = CandidateSelector::default();
        let catalog = large_catalog(50);
        let intent = intent_of(IntentKind::Question);
        let selection = selector.select(&catalog, "jackets under $20", &intent, None);

        assert_eq!(selection.strategy, SelectionStrategy::Passthrough);
        assert_eq!(selection.products, catalog);
        assert!(selection.scored.is_empty());
    }

    #[test]
    fn selection_never_exceeds_budget_for_large_catalogs() {
        let selector = CandidateSelector::default();
        let builder = KeywordIntentBuilder::new();
        let messages = [
            "show me jackets",
            "recommend something for winter",
            "what caps do you have?",
            "compare the boots vs the jackets",
            "hello",
            "zzz qqq",
        ];

        for size in [51, 60, 200] {
            let catalog = large_catalog(size);
            for message in messages {
                let intent = builder.build(message);
                let selection = selector.select(&catalog, message, &intent, None);
                let budget = IntentBudgets::default().for_kind(intent.intent_kind);
                assert!(
                    selection.products.len() <= budget,
                    "{message} on {size} products returned {}",
                    selection.products.len()
                );
                assert!(!selection.products.is_empty(), "{message} returned nothing");
            }
        }
    }

    #[test]
    fn over_budget_filter_results_are_ranked_by_score() {
        let selector = CandidateSelector::default();
        let catalog = large_catalog(120);
        let intent = KeywordIntentBuilder::new().build("show me a black jacket");

        let selection = selector.select(&catalog, "show me a black jacket", &intent, None);
        assert_eq!(selection.strategy, SelectionStrategy::Ranked);
        assert_eq!(selection.products.len(), 10);
        assert_eq!(selection.scored.len(), 10);
        assert!(selection
            .scored
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score));
        assert!(selection.products.iter().all(|product| product.product_type == "Jacket"));
    }

    #[test]
    fn ties_keep_catalog_order() {
        let selector = CandidateSelector::default();
        let catalog = large_catalog(80);
        let jackets = catalog
            .iter()
            .filter(|product| product.product_type == "Jacket")
            .cloned()
            .collect::<Vec<_>>();

        let ranked = selector.rank(jackets.clone(), &QueryIntent::default(), "", 5);
        let ids = ranked.iter().map(|candidate| candidate.product.id.clone()).collect::<Vec<_>>();
        let expected = jackets.iter().take(5).map(|product| product.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids, expected);
    }

    #[test]
    fn empty_filter_falls_back_to_intent_keywords() {
        let selector = CandidateSelector::default();
        let mut catalog = large_catalog(70);
        catalog.push(
            Product::new("SPECIAL", "Heritage Satchel", Decimal::from(300))
                .with_category("Leather Goods")
                .with_description("handmade satchel"),
        );
        // Message criteria ask for a type that does not exist; intent keywords still match.
        let intent = QueryIntent {
            intent_kind: IntentKind::Search,
            keywords: vec!["satchel".to_string()],
            ..QueryIntent::default()
        };

        let selection = selector.select(&catalog, "sunglasses", &intent, None);
        assert_eq!(selection.strategy, SelectionStrategy::KeywordRanked);
        assert_eq!(selection.products.len(), 1);
        assert_eq!(selection.products[0].id.as_str(), "SPECIAL");
    }

    #[test]
    fn absolute_fallback_returns_catalog_head() {
        let selector = CandidateSelector::default();
        let catalog = large_catalog(70);
        let intent = intent_of(IntentKind::Comparison);

        let selection = selector.select(&catalog, "sunglasses", &intent, None);
        assert_eq!(selection.strategy, SelectionStrategy::CatalogHead);
        assert_eq!(selection.products, catalog[..4].to_vec());
    }

    #[test]
    fn explicit_max_overrides_intent_budget() {
        let selector = CandidateSelector::default();
        let catalog = large_catalog(100);
        let intent = intent_of(IntentKind::Recommendation);

        let selection = selector.select(&catalog, "jackets", &intent, Some(3));
        assert_eq!(selection.budget, 3);
        assert_eq!(selection.products.len(), 3);
    }

    #[test]
    fn under_thirty_example_selects_the_cap() {
        let selector = CandidateSelector::new(ScoreCalculator::new(), IntentBudgets::default(), 0);
        let catalog = vec![
            Product::new("A", "Jacket", Decimal::from(50)).with_type("Jacket"),
            Product::new("B", "Cap", Decimal::from(20)).with_type("Cap"),
            Product::new("C", "Boots", Decimal::from(80)).with_type("Boots"),
        ];
        let message = "show me something under $30";
        let intent = KeywordIntentBuilder::new().build(message);

        let selection = selector.select(&catalog, message, &intent, None);
        assert_eq!(selection.strategy, SelectionStrategy::Filtered);
        let ids = selection.products.iter().map(|product| product.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["B"]);
    }
}
