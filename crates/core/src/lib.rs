pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod escalation;
pub mod intent;
pub mod recommendations;
pub mod retrieval;
pub mod text;

pub use catalog::{filter_products, parse_criteria, Catalog, FilterCriteria};
pub use domain::conversation::{Conversation, ConversationTurn, Role};
pub use domain::intent::{IntentKind, PriceRange, QueryIntent};
pub use domain::product::{Product, ProductId};
pub use domain::recommendation::{ExtractedRecommendation, MatchStrategy};
pub use domain::ticket::{CustomerProfile, TicketReceipt, TicketRequest};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use escalation::{EscalationAssessment, EscalationMachine, EscalationPolicy, EscalationState};
pub use intent::KeywordIntentBuilder;
pub use recommendations::{Extraction, RecommendationExtractor, RecommendationMerger};
pub use retrieval::{CandidateSelector, ScoreCalculator, ScoredCandidate, ScoringWeights, Selection};
