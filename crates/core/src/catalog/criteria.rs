//! Best-effort conversion of a shopping message into [`FilterCriteria`].

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::catalog::filter::FilterCriteria;
use crate::text::{meaningful_words, parse_money, words};

const AMOUNT: &str = r"\$?\s*(\d[\d,]*(?:\.\d+)?)";
/// Same number, but only with a `$` or a currency word, so "Air Max 90" stays a name.
const CURRENCY_AMOUNT: &str =
    r"(?:\$\s*(\d[\d,]*(?:\.\d+)?)|(\d[\d,]*(?:\.\d+)?)\s*(?:dollars|usd|bucks)\b)";

static BETWEEN_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\bbetween\s+{AMOUNT}\s*(?:and|to|-)\s*{AMOUNT}"))
        .expect("price pattern is valid")
});
static DOLLAR_SPAN_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)\s*(?:-|to)\s*\$\s*(\d[\d,]*(?:\.\d+)?)")
        .expect("price pattern is valid")
});
static MAX_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:under|below|less\s+than|cheaper\s+than|up\s+to|no\s+more\s+than|at\s+most|budget\s+(?:of|is))\s*{AMOUNT}"
    ))
    .expect("price pattern is valid")
});
static CAPPED_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:max(?:imum)?|within)\s*(?:of\s+)?{CURRENCY_AMOUNT}"))
        .expect("price pattern is valid")
});
static MIN_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:over|above|more\s+than|at\s+least|starting\s+at)\s*{AMOUNT}"
    ))
    .expect("price pattern is valid")
});
static FLOOR_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\bmin(?:imum)?\s*(?:of\s+)?{CURRENCY_AMOUNT}"))
        .expect("price pattern is valid")
});
static CLOTHING_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(XXXL|XXL|XL|XS|S|M|L)\b").expect("size pattern is valid"));
static NAMED_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bsize\s+(xxxl|xxl|xl|xs|s|m|l|small|medium|large)\b")
        .expect("size pattern is valid")
});

/// Category value, trigger words.
pub const CATEGORY_TERMS: &[(&str, &[&str])] = &[
    ("clothing", &["clothes", "clothing", "apparel", "outfit", "outfits", "wear"]),
    ("footwear", &["footwear", "shoes", "shoe"]),
    ("accessories", &["accessories", "accessory", "jewelry", "jewellery"]),
];

/// Type stem, trigger words. Stems are matched as substrings of the product type.
pub const TYPE_TERMS: &[(&str, &[&str])] = &[
    ("t-shirt", &["t-shirt", "t-shirts", "tshirt", "tshirts", "tee", "tees"]),
    ("shirt", &["shirt", "shirts", "blouse", "blouses"]),
    ("dress", &["dress", "dresses"]),
    ("jean", &["jeans", "denim"]),
    ("pant", &["pants", "chinos"]),
    ("trouser", &["trousers", "slacks"]),
    ("short", &["shorts"]),
    ("skirt", &["skirt", "skirts"]),
    ("jacket", &["jacket", "jackets"]),
    ("coat", &["coat", "coats", "parka", "parkas"]),
    ("sweater", &["sweater", "sweaters", "jumper", "jumpers", "cardigan"]),
    ("hoodie", &["hoodie", "hoodies", "sweatshirt", "sweatshirts"]),
    ("blazer", &["blazer", "blazers"]),
    ("suit", &["suit", "suits"]),
    ("boot", &["boot", "boots"]),
    ("sneaker", &["sneaker", "sneakers", "trainers", "runners"]),
    ("sandal", &["sandal", "sandals", "flip-flops"]),
    ("heel", &["heels", "pumps"]),
    ("loafer", &["loafer", "loafers"]),
    ("hat", &["hat", "hats"]),
    ("cap", &["cap", "caps"]),
    ("beanie", &["beanie", "beanies"]),
    ("bag", &["bag", "bags", "handbag", "handbags", "tote", "totes"]),
    ("backpack", &["backpack", "backpacks"]),
    ("belt", &["belt", "belts"]),
    ("scarf", &["scarf", "scarves"]),
    ("watch", &["watch", "watches"]),
    ("sunglass", &["sunglasses", "shades"]),
    ("wallet", &["wallet", "wallets"]),
];

pub const COLOR_NAMES: &[&str] = &[
    "black", "white", "red", "blue", "green", "yellow", "orange", "purple", "pink", "brown",
    "gray", "grey", "navy", "beige", "tan", "olive", "maroon", "burgundy", "silver", "gold",
    "cream", "khaki", "teal", "ivory", "charcoal",
];

pub const FOOTWEAR_TERMS: &[&str] = &[
    "shoe", "shoes", "boot", "boots", "sneaker", "sneakers", "sandal", "sandals", "heels",
    "loafer", "loafers", "trainers", "footwear",
];

const PRICE_LEAD_WORDS: &[&str] =
    &["under", "below", "over", "above", "than", "between", "and", "to", "max", "most", "least"];

pub fn parse_criteria(message: &str) -> FilterCriteria {
    let tokens = words(message);
    let (min_price, max_price) = price_bounds(message);

    let mut criteria = FilterCriteria {
        category: detect_category(&tokens).map(str::to_string),
        product_type: detect_type(&tokens).map(str::to_string),
        min_price,
        max_price,
        color: detect_colors(&tokens).into_iter().next(),
        sizes: detect_sizes(message, &tokens),
        keywords: Vec::new(),
    };

    if !criteria.has_primary_signal() {
        criteria.keywords = meaningful_words(message, 2);
    }

    criteria
}

/// `(min, max)` from "under $X", "over $X", "between $X and $Y" style phrases.
pub fn price_bounds(message: &str) -> (Option<Decimal>, Option<Decimal>) {
    let span = BETWEEN_PRICE.captures(message).or_else(|| DOLLAR_SPAN_PRICE.captures(message));
    if let Some(captures) = span {
        let low = captures.get(1).and_then(|value| parse_money(value.as_str()));
        let high = captures.get(2).and_then(|value| parse_money(value.as_str()));
        if let (Some(low), Some(high)) = (low, high) {
            return if low <= high { (Some(low), Some(high)) } else { (Some(high), Some(low)) };
        }
    }

    let max = first_amount(&MAX_PRICE, message).or_else(|| first_amount(&CAPPED_PRICE, message));
    let min = first_amount(&MIN_PRICE, message).or_else(|| first_amount(&FLOOR_PRICE, message));
    (min, max)
}

fn first_amount(pattern: &Regex, message: &str) -> Option<Decimal> {
    let captures = pattern.captures(message)?;
    captures
        .iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|value| parse_money(value.as_str()))
}

pub fn detect_category(tokens: &[String]) -> Option<&'static str> {
    lookup(CATEGORY_TERMS, tokens)
}

pub fn detect_type(tokens: &[String]) -> Option<&'static str> {
    lookup(TYPE_TERMS, tokens)
}

pub fn detect_colors(tokens: &[String]) -> Vec<String> {
    let mut colors = Vec::new();
    for token in tokens {
        if COLOR_NAMES.contains(&token.as_str()) && !colors.contains(token) {
            colors.push(token.clone());
        }
    }
    colors
}

pub fn mentions_footwear(tokens: &[String]) -> bool {
    tokens.iter().any(|token| FOOTWEAR_TERMS.contains(&token.as_str()))
}

/// Clothing sizes `XS..XXXL` (upper-case tokens or "size m"), plus numeric shoe sizes 4-15
/// when the message talks about footwear.
pub fn detect_sizes(message: &str, tokens: &[String]) -> Vec<String> {
    let mut sizes: Vec<String> = Vec::new();
    let mut push = |size: String| {
        if !sizes.iter().any(|existing| existing.eq_ignore_ascii_case(&size)) {
            sizes.push(size);
        }
    };

    for captures in NAMED_SIZE.captures_iter(message) {
        if let Some(size) = captures.get(1) {
            push(canonical_clothing_size(size.as_str()));
        }
    }
    for found in CLOTHING_SIZE.find_iter(message) {
        push(found.as_str().to_string());
    }

    if mentions_footwear(tokens) {
        let raw_tokens = message.split_whitespace().collect::<Vec<_>>();
        for (index, raw) in raw_tokens.iter().enumerate() {
            if raw.starts_with('$') || raw.ends_with('%') {
                continue;
            }
            let previous = index
                .checked_sub(1)
                .map(|previous| raw_tokens[previous].to_lowercase())
                .unwrap_or_default();
            if PRICE_LEAD_WORDS.contains(&previous.as_str()) {
                continue;
            }
            let candidate = raw.trim_matches(|character: char| {
                !(character.is_ascii_digit() || character == '.')
            });
            let candidate = candidate.trim_end_matches('.');
            if let Ok(value) = candidate.parse::<f64>() {
                if (4.0..=15.0).contains(&value) {
                    push(candidate.to_string());
                }
            }
        }
    }

    sizes
}

fn canonical_clothing_size(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "small" => "S".to_string(),
        "medium" => "M".to_string(),
        "large" => "L".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

fn lookup(table: &[(&'static str, &[&str])], tokens: &[String]) -> Option<&'static str> {
    tokens.iter().find_map(|token| {
        table
            .iter()
            .find(|(_, triggers)| triggers.contains(&token.as_str()))
            .map(|(value, _)| *value)
    })
}
