use std::collections::HashSet;

use crate::domain::recommendation::ExtractedRecommendation;
use crate::retrieval::ScoredCandidate;

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;

/// Reason attached to products that came from ranking rather than the reply.
pub const RANKED_REASON: &str = "Matches what you're looking for";

/// Combines ranked candidates and reply extractions; ranked products always lead.
#[derive(Clone, Copy, Debug)]
pub struct RecommendationMerger {
    limit: usize,
}

impl Default for RecommendationMerger {
    fn default() -> Self {
        Self::new(DEFAULT_RECOMMENDATION_LIMIT)
    }
}

impl RecommendationMerger {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn merge(
        &self,
        scored: &[ScoredCandidate],
        extracted: &[ExtractedRecommendation],
    ) -> Vec<ExtractedRecommendation> {
        let mut seen = HashSet::new();
        let ranked = scored.iter().map(|candidate| {
            ExtractedRecommendation::from_product(&candidate.product, RANKED_REASON, None)
        });

        ranked
            .chain(extracted.iter().cloned())
            .filter(|recommendation| seen.insert(recommendation.id.clone()))
            .take(self.limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{RecommendationMerger, RANKED_REASON};
    use crate::domain::product::Product;
    use crate::domain::recommendation::{ExtractedRecommendation, MatchStrategy};
    use crate::retrieval::ScoredCandidate;

    fn product(id: &str, price: i64) -> Product {
        Product::new(id, format!("Product {id}"), Decimal::from(price))
    }

    fn extracted(id: &str) -> ExtractedRecommendation {
        ExtractedRecommendation::from_product(
            &product(id, 10),
            "from reply",
            Some(MatchStrategy::NameOnly),
        )
    }

    fn scored(id: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate { product: product(id, 10), score }
    }

    #[test]
    fn ranked_candidates_lead_and_duplicates_are_dropped() {
        let merged = RecommendationMerger::default().merge(
            &[scored("A", 20.0), scored("B", 8.0)],
            &[extracted("C"), extracted("A"), extracted("D")],
        );

        let ids = merged.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
        assert_eq!(merged[0].reason, RANKED_REASON);
        assert_eq!(merged[0].strategy, None);
        assert_eq!(merged[2].reason, "from reply");
    }

    #[test]
    fn extracted_entries_stand_alone_without_ranking() {
        let merged = RecommendationMerger::default().merge(&[], &[extracted("X"), extracted("Y")]);

        let ids = merged.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["X", "Y"]);
    }

    #[test]
    fn output_is_capped_and_unique() {
        let scored = (0..8).map(|index| scored(&format!("S{index}"), 1.0)).collect::<Vec<_>>();
        let mut extra = (0..8).map(|index| extracted(&format!("S{index}"))).collect::<Vec<_>>();
        extra.extend((0..8).map(|index| extracted(&format!("E{index}"))));
        extra.push(extracted("E0"));

        let merged = RecommendationMerger::default().merge(&scored, &extra);

        assert_eq!(merged.len(), 10);
        let unique =
            merged.iter().map(|entry| entry.id.clone()).collect::<std::collections::HashSet<_>>();
        assert_eq!(unique.len(), merged.len());
        assert_eq!(merged[8].id.as_str(), "E0");
    }
}
