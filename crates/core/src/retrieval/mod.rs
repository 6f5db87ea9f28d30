//! Relevance scoring and budget-aware candidate selection.

mod scoring;
mod selector;

use serde::{Deserialize, Serialize};

pub use scoring::{ScoreBreakdown, ScoreCalculator, ScoringWeights, SCENARIO_PRODUCT_TERMS};
pub use selector::{CandidateSelector, Selection, SelectionStrategy};

use crate::domain::intent::IntentKind;
use crate::domain::product::Product;

/// Hand-tuned weights; literal name matches outrank categorical matches.
pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights {
    category: 10.0,
    product_type: 10.0,
    color: 5.0,
    keyword: 3.0,
    price_max: 5.0,
    price_min: 5.0,
    price_range_bonus: 3.0,
    scenario: 5.0,
    name_word: 8.0,
};

/// Catalogs at or below this size are handed over without retrieval.
pub const DEFAULT_PASSTHROUGH_THRESHOLD: usize = 50;

pub const DEFAULT_BUDGETS: IntentBudgets =
    IntentBudgets { search: 10, recommendation: 20, question: 5, comparison: 4, default: 15 };

/// Maximum number of products handed to the language model, per intent kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentBudgets {
    pub search: usize,
    pub recommendation: usize,
    pub question: usize,
    pub comparison: usize,
    pub default: usize,
}

impl Default for IntentBudgets {
    fn default() -> Self {
        DEFAULT_BUDGETS
    }
}

impl IntentBudgets {
    pub fn for_kind(&self, kind: IntentKind) -> usize {
        match kind {
            IntentKind::Search => self.search,
            IntentKind::Recommendation => self.recommendation,
            IntentKind::Question => self.question,
            IntentKind::Comparison => self.comparison,
            IntentKind::Unspecified => self.default,
        }
    }
}

/// Transient pairing produced while ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub product: Product,
    pub score: f64,
}
