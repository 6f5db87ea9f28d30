use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::catalog::Catalog;
use crate::domain::product::{Product, ProductId};
use crate::domain::recommendation::{ExtractedRecommendation, MatchStrategy};
use crate::text::{balanced_object_end, parse_money, truncate_chars, window_before, words};

/// Marker the assistant prompt asks the model to put before each recommendation object.
pub const TAG_MARKER: &str = "PRODUCT_RECOMMENDATION:";

const PRICE_LOOKBEHIND_CHARS: usize = 100;
const MAX_REASON_CHARS: usize = 200;
const MENTIONED_REASON: &str = "Mentioned in the assistant's reply";

static PRICE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s?(\d[\d,]*(?:\.\d{1,2})?)").expect("price token pattern is valid")
});

// Name shapes tried in order against the text preceding a price.
static NAME_SHAPES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\*\*([^*\n]{2,80})\*\*[^*\n]*$",
        r"([A-Z][\w'&]*(?:[ \t-]+[A-Za-z0-9][\w'&]*){0,6})\s*(?:[:(]|-|–)\s*$",
        r"((?:[A-Z][\w'&-]*\s+){0,5}[A-Z][\w'&-]*)[^A-Z$\n]*$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("name shape pattern is valid"))
    .collect()
});

static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank run pattern is valid"));

static TRAILING_REASON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\**\)?\s*(?:\(\$?[\d,.]+\))?\s*[-–—:]\s*(.+)")
        .expect("reason pattern is valid")
});

/// Reply text with tagged blocks removed, plus every validated recommendation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    pub cleaned_text: String,
    pub recommendations: Vec<ExtractedRecommendation>,
}

/// One heuristic pass over the cleaned reply text.
///
/// Implementations must only return products taken from `catalog` and must skip ids in
/// `already_found`.
pub trait MentionMatcher: Send + Sync {
    fn strategy(&self) -> MatchStrategy;

    fn find(
        &self,
        text: &str,
        catalog: &Catalog,
        already_found: &HashSet<ProductId>,
    ) -> Vec<ExtractedRecommendation>;
}

pub struct RecommendationExtractor {
    matchers: Vec<Box<dyn MentionMatcher>>,
}

impl Default for RecommendationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RecommendationExtractor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let strategies =
            self.matchers.iter().map(|matcher| matcher.strategy()).collect::<Vec<_>>();
        formatter.debug_struct("RecommendationExtractor").field("matchers", &strategies).finish()
    }
}

impl RecommendationExtractor {
    /// Tagged pass followed by the price-anchored and name-only heuristics.
    pub fn new() -> Self {
        Self::with_matchers(vec![Box::new(PriceAnchoredMatcher), Box::new(NameOnlyMatcher)])
    }

    /// Accepts only explicitly tagged recommendation objects.
    pub fn tagged_only() -> Self {
        Self::with_matchers(Vec::new())
    }

    pub fn with_matchers(matchers: Vec<Box<dyn MentionMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn extract(&self, reply: &str, catalog: &Catalog) -> Extraction {
        let (cleaned_text, mut recommendations) = extract_tagged(reply, catalog);
        let mut found =
            recommendations.iter().map(|entry| entry.id.clone()).collect::<HashSet<_>>();

        for matcher in &self.matchers {
            for recommendation in matcher.find(&cleaned_text, catalog, &found) {
                if !catalog.contains(&recommendation.id)
                    || !found.insert(recommendation.id.clone())
                {
                    continue;
                }
                recommendations.push(recommendation);
            }
        }

        debug!(
            event_name = "recommendations.extracted",
            count = recommendations.len(),
            tagged = recommendations
                .iter()
                .filter(|entry| entry.strategy == Some(MatchStrategy::Tagged))
                .count(),
            "reply parsed"
        );

        Extraction { cleaned_text, recommendations }
    }
}

#[derive(Debug, Deserialize)]
struct TaggedPayload {
    id: Value,
    #[serde(default)]
    reason: Option<String>,
}

/// Strips every marker and its object; keeps the catalog's name and price for valid ids.
fn extract_tagged(reply: &str, catalog: &Catalog) -> (String, Vec<ExtractedRecommendation>) {
    let mut cleaned = String::with_capacity(reply.len());
    let mut recommendations: Vec<ExtractedRecommendation> = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = reply[cursor..].find(TAG_MARKER) {
        let marker_start = cursor + offset;
        cleaned.push_str(&reply[cursor..marker_start]);

        let after_marker = marker_start + TAG_MARKER.len();
        let body_start = after_marker
            + reply[after_marker..].len()
            - reply[after_marker..].trim_start().len();

        let block_end = if reply[body_start..].starts_with('{') {
            balanced_object_end(reply, body_start)
        } else {
            None
        };

        let Some(block_end) = block_end else {
            cursor = after_marker;
            continue;
        };

        match serde_json::from_str::<TaggedPayload>(&reply[body_start..block_end]) {
            Ok(payload) => {
                if let Some(product) = payload_id(&payload.id).and_then(|id| catalog.find(&id)) {
                    if !recommendations.iter().any(|entry| entry.id == product.id) {
                        let reason = payload
                            .reason
                            .map(|reason| reason.trim().to_owned())
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| MENTIONED_REASON.to_owned());
                        recommendations.push(ExtractedRecommendation::from_product(
                            product,
                            reason,
                            Some(MatchStrategy::Tagged),
                        ));
                    }
                } else {
                    debug!(event_name = "recommendations.tag_dropped", "tagged id not in catalog");
                }
            }
            Err(error) => {
                debug!(
                    event_name = "recommendations.tag_malformed",
                    error = %error,
                    "tagged block is not valid JSON"
                );
            }
        }
        cursor = block_end;
    }
    cleaned.push_str(&reply[cursor..]);

    let cleaned = BLANK_RUNS.replace_all(&cleaned, "\n\n");
    (cleaned.trim().to_owned(), recommendations)
}

fn payload_id(value: &Value) -> Option<ProductId> {
    match value {
        Value::String(id) => Some(ProductId(id.trim().to_owned())),
        Value::Number(id) => Some(ProductId(id.to_string())),
        _ => None,
    }
}

/// Matches `Name ... $price` when the name and the exact price identify one product.
#[derive(Clone, Copy, Debug, Default)]
pub struct PriceAnchoredMatcher;

impl MentionMatcher for PriceAnchoredMatcher {
    fn strategy(&self) -> MatchStrategy {
        MatchStrategy::PriceAnchored
    }

    fn find(
        &self,
        text: &str,
        catalog: &Catalog,
        already_found: &HashSet<ProductId>,
    ) -> Vec<ExtractedRecommendation> {
        let mut found = Vec::new();

        for captures in PRICE_TOKEN.captures_iter(text) {
            let (Some(whole), Some(amount)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let Some(price) = parse_money(amount.as_str()) else {
                continue;
            };
            let window = window_before(text, whole.start(), PRICE_LOOKBEHIND_CHARS);

            let product = NAME_SHAPES.iter().find_map(|shape| {
                let candidate = shape.captures(window)?.get(1)?.as_str().trim();
                unique_priced_match(catalog, candidate, price)
            });

            let Some(product) = product else {
                continue;
            };
            if already_found.contains(&product.id)
                || found.iter().any(|entry: &ExtractedRecommendation| entry.id == product.id)
            {
                continue;
            }
            found.push(ExtractedRecommendation::from_product(
                product,
                trailing_reason(&text[whole.end()..]),
                Some(MatchStrategy::PriceAnchored),
            ));
        }

        found
    }
}

fn unique_priced_match<'a>(
    catalog: &'a Catalog,
    candidate: &str,
    price: Decimal,
) -> Option<&'a Product> {
    let candidate = candidate.trim_matches(|character: char| !character.is_alphanumeric());
    if candidate.chars().count() < 3 {
        return None;
    }
    let candidate = candidate.to_lowercase();

    let mut matches = catalog.products().iter().filter(|product| {
        let name = product.name.to_lowercase();
        product.price.normalize() == price
            && (name.contains(&candidate) || candidate.contains(&name))
    });
    let first = matches.next()?;
    match matches.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// Matches products whose full name is mentioned, regardless of price.
///
/// Longer names claim their mention first, so "Jacket" is not read out of
/// "Alpine Fleece Jacket" when both are in the catalog.
#[derive(Clone, Copy, Debug, Default)]
pub struct NameOnlyMatcher;

impl MentionMatcher for NameOnlyMatcher {
    fn strategy(&self) -> MatchStrategy {
        MatchStrategy::NameOnly
    }

    fn find(
        &self,
        text: &str,
        catalog: &Catalog,
        already_found: &HashSet<ProductId>,
    ) -> Vec<ExtractedRecommendation> {
        let text_words = words(text).into_iter().collect::<HashSet<_>>();
        let mut claimed = catalog
            .products()
            .iter()
            .filter(|product| already_found.contains(&product.id))
            .flat_map(|product| name_occurrences(text, &product.name))
            .collect::<Vec<_>>();

        let mut by_length = catalog.products().iter().collect::<Vec<_>>();
        by_length.sort_by(|left, right| right.name.chars().count().cmp(&left.name.chars().count()));

        let mut found = Vec::new();
        for product in by_length {
            if already_found.contains(&product.id) {
                continue;
            }
            let name_words = words(&product.name);
            if name_words.is_empty() || !name_words.iter().all(|word| text_words.contains(word)) {
                continue;
            }
            let Some((start, end)) = unclaimed_mention(text, &product.name, &claimed) else {
                continue;
            };
            claimed.push((start, end));
            found.push((
                start,
                ExtractedRecommendation::from_product(
                    product,
                    trailing_reason(&text[end..]),
                    Some(MatchStrategy::NameOnly),
                ),
            ));
        }

        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, recommendation)| recommendation).collect()
    }
}

fn name_pattern(shape: &str) -> Option<Regex> {
    RegexBuilder::new(shape).case_insensitive(true).build().ok()
}

/// Escaped name with word boundaries on whichever ends are word characters.
fn bounded_name(name: &str) -> String {
    let name = name.trim();
    let edge = |character: Option<char>| {
        if character.is_some_and(char::is_alphanumeric) {
            r"\b"
        } else {
            ""
        }
    };
    format!("{}{}{}", edge(name.chars().next()), regex::escape(name), edge(name.chars().last()))
}

fn name_occurrences(text: &str, name: &str) -> Vec<(usize, usize)> {
    name_pattern(&bounded_name(name))
        .map(|pattern| pattern.find_iter(text).map(|found| (found.start(), found.end())).collect())
        .unwrap_or_default()
}

/// First bold, colon-labelled, or word-bounded mention of `name` outside `claimed` spans.
fn unclaimed_mention(text: &str, name: &str, claimed: &[(usize, usize)]) -> Option<(usize, usize)> {
    let bounded = bounded_name(name);
    let shapes = [
        format!(r"\*\*[^*\n]*?{bounded}[^*\n]*\*\*"),
        format!(r"{bounded}\s*:"),
        bounded,
    ];
    let inside_claim = |start: usize, end: usize| {
        claimed.iter().any(|(claim_start, claim_end)| start < *claim_end && end > *claim_start)
    };

    shapes.iter().filter_map(|shape| name_pattern(shape)).find_map(|pattern| {
        pattern.find_iter(text).find_map(|found| {
            let name_span = name_occurrences(found.as_str(), name)
                .first()
                .map(|(start, end)| (found.start() + start, found.start() + end))?;
            (!inside_claim(name_span.0, name_span.1)).then_some((found.start(), found.end()))
        })
    })
}

/// Best-effort reason from the dash- or colon-led text right after a mention.
fn trailing_reason(rest: &str) -> String {
    let line = rest.lines().next().unwrap_or_default();
    TRAILING_REASON
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|reason| reason.as_str().trim().trim_end_matches("**").trim())
        .filter(|reason| !reason.is_empty())
        .map(|reason| truncate_chars(reason, MAX_REASON_CHARS))
        .unwrap_or_else(|| MENTIONED_REASON.to_owned())
}
