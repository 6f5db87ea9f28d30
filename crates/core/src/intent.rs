//! Deterministic intent builder used whenever the language model cannot be consulted.

use crate::catalog::criteria::{
    detect_category, detect_colors, detect_sizes, detect_type, price_bounds,
};
use crate::domain::intent::{IntentKind, PriceRange, QueryIntent};
use crate::text::{meaningful_words, words};

const COMPARISON_PHRASES: &[&str] = &[
    "compare",
    "comparison",
    " vs ",
    " vs.",
    "versus",
    "difference between",
    "better than",
    "which is better",
    "which one is better",
];

const RECOMMENDATION_PHRASES: &[&str] = &[
    "recommend",
    "suggest",
    "what should i",
    "ideas",
    "gift",
    "go with",
    "goes with",
    "pair with",
    "match with",
    "outfit",
    "best",
];

const SEARCH_PHRASES: &[&str] = &[
    "show",
    "find",
    "search",
    "looking for",
    "look for",
    "need",
    "want",
    "buy",
    "browse",
    "do you have",
    "do you sell",
    "have any",
];

const QUESTION_OPENERS: &[&str] =
    &["what", "how", "does", "is", "can", "do", "when", "where", "why", "will", "are"];

const PRICE_PHRASES: &[&str] =
    &["price", "cost", "how much", "cheap", "budget", "afford", "expensive", "$"];

const SIZE_WORDS: &[&str] = &["size", "sizes", "sizing", "fit", "fits"];

/// Scenario label, trigger words.
pub const SCENARIO_TERMS: &[(&str, &[&str])] = &[
    ("formal", &["formal", "wedding", "gala", "interview", "black-tie", "elegant"]),
    ("winter", &["winter", "snow", "cold", "freezing", "ski"]),
    ("summer", &["summer", "hot", "heat", "sunny"]),
    ("beach", &["beach", "vacation", "pool", "swim", "holiday"]),
    ("workout", &["gym", "workout", "running", "training", "exercise", "yoga"]),
    ("office", &["office", "work", "business", "meeting"]),
    ("party", &["party", "club", "night", "date"]),
    ("outdoor", &["hiking", "camping", "outdoor", "outdoors", "trail"]),
    ("casual", &["casual", "everyday", "weekend", "relaxed"]),
];

#[derive(Clone, Debug, Default)]
pub struct KeywordIntentBuilder;

impl KeywordIntentBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Never fails; an uninformative message yields a sparse intent.
    pub fn build(&self, message: &str) -> QueryIntent {
        let lowered = format!(" {} ", message.to_lowercase());
        let tokens = words(message);

        let (min, max) = price_bounds(message);
        let price_range = (min.is_some() || max.is_some()).then_some(PriceRange { min, max });
        let category = detect_category(&tokens).map(str::to_string);
        let product_type = detect_type(&tokens).map(str::to_string);
        let sizes = detect_sizes(message, &tokens);

        let is_price_query =
            price_range.is_some() || PRICE_PHRASES.iter().any(|phrase| lowered.contains(phrase));
        let is_size_query = !sizes.is_empty()
            || tokens.iter().any(|token| SIZE_WORDS.contains(&token.as_str()));
        let is_category_query = category.is_some() || product_type.is_some();

        QueryIntent {
            intent_kind: classify(&lowered, &tokens),
            category,
            product_type,
            price_range,
            colors: detect_colors(&tokens),
            keywords: meaningful_words(message, 2),
            scenario: detect_scenario(&tokens).map(str::to_string),
            is_price_query,
            is_category_query,
            is_size_query,
        }
    }
}

fn classify(lowered: &str, tokens: &[String]) -> IntentKind {
    if COMPARISON_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return IntentKind::Comparison;
    }
    if RECOMMENDATION_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return IntentKind::Recommendation;
    }
    if SEARCH_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return IntentKind::Search;
    }
    let opens_with_question =
        tokens.first().is_some_and(|first| QUESTION_OPENERS.contains(&first.as_str()));
    if lowered.contains('?') || opens_with_question {
        return IntentKind::Question;
    }
    IntentKind::Unspecified
}

pub fn detect_scenario(tokens: &[String]) -> Option<&'static str> {
    tokens.iter().find_map(|token| {
        SCENARIO_TERMS
            .iter()
            .find(|(_, triggers)| triggers.contains(&token.as_str()))
            .map(|(scenario, _)| *scenario)
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::KeywordIntentBuilder;
    use crate::domain::intent::IntentKind;

    #[test]
    fn builds_search_intent_with_price_and_color() {
        let intent = KeywordIntentBuilder::new().build("Show me black sneakers under $90");

        assert_eq!(intent.intent_kind, IntentKind::Search);
        assert_eq!(intent.product_type.as_deref(), Some("sneaker"));
        assert_eq!(intent.colors, vec!["black".to_string()]);
        assert_eq!(intent.max_price(), Some(Decimal::from(90)));
        assert!(intent.is_price_query);
        assert!(intent.is_category_query);
        assert!(intent.keywords.contains(&"sneakers".to_string()));
    }

    #[test]
    fn classifies_each_intent_kind() {
        let builder = KeywordIntentBuilder::new();
        let cases = [
            ("Compare the Trail Boots vs the City Boots", IntentKind::Comparison),
            ("Can you recommend a gift for my dad?", IntentKind::Recommendation),
            ("I'm looking for a rain jacket", IntentKind::Search),
            ("How long does shipping take?", IntentKind::Question),
            ("hello there", IntentKind::Unspecified),
        ];

        for (message, expected) in cases {
            assert_eq!(builder.build(message).intent_kind, expected, "message: {message}");
        }
    }

    #[test]
    fn detects_scenario_and_size_questions() {
        let intent =
            KeywordIntentBuilder::new().build("what size coat fits best for winter hiking?");
        assert_eq!(intent.scenario.as_deref(), Some("winter"));
        assert!(intent.is_size_query);
        assert_eq!(intent.product_type.as_deref(), Some("coat"));
    }

    #[test]
    fn empty_message_yields_sparse_intent() {
        let intent = KeywordIntentBuilder::new().build("");
        assert_eq!(intent.intent_kind, IntentKind::Unspecified);
        assert!(intent.keywords.is_empty());
        assert!(intent.price_range.is_none());
        assert!(!intent.is_price_query);
    }
}
