//! Turning assistant replies back into catalog-validated recommendations.

pub mod extractor;
pub mod merger;

pub use extractor::{
    Extraction, MentionMatcher, NameOnlyMatcher, PriceAnchoredMatcher, RecommendationExtractor,
    TAG_MARKER,
};
pub use merger::{RecommendationMerger, DEFAULT_RECOMMENDATION_LIMIT, RANKED_REASON};
