//! Small text helpers shared by the parsers.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Words that carry no product signal in shopping messages.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "you", "your", "are", "was", "show", "me", "some", "something",
    "anything", "looking", "look", "want", "wants", "need", "needs", "have", "has", "any", "what",
    "which", "that", "this", "these", "those", "can", "could", "would", "should", "get", "find",
    "like", "please", "about", "from", "our", "all", "does", "how", "there", "they", "them",
    "under", "over", "between", "than", "more", "less", "much", "price", "cost", "buy", "good",
    "best", "also", "just", "really", "very", "got", "here", "into", "out", "one", "ones", "not",
    "but", "too", "its", "it's", "i'm", "let", "see", "give", "tell", "who", "why", "when",
    "where", "will", "shall", "may", "might", "must", "below", "above", "around", "cheap",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercase word tokens; keeps inner hyphens and apostrophes.
pub fn words(text: &str) -> Vec<String> {
    text.split(|character: char| {
        !(character.is_alphanumeric() || character == '-' || character == '\'')
    })
    .map(|token| token.trim_matches(|character| character == '-' || character == '\''))
    .filter(|token| !token.is_empty())
    .map(str::to_lowercase)
    .collect()
}

/// Words longer than `min_len` characters that are neither stop words nor bare numbers.
pub fn meaningful_words(text: &str, min_len: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for word in words(text) {
        if word.chars().count() <= min_len || is_stop_word(&word) || is_number(&word) {
            continue;
        }
        if !seen.contains(&word) {
            seen.push(word);
        }
    }
    seen
}

pub fn is_number(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|character| character.is_ascii_digit() || character == '.')
}

/// Parses `1,299.99` style amounts.
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|character| *character != ',').collect();
    let cleaned = cleaned.trim().trim_start_matches('$');
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned).ok().map(|value| value.normalize())
}

/// Byte range of the first balanced `{...}` block, ignoring braces inside JSON strings.
pub fn first_json_object(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    balanced_object_end(text, start).map(|end| (start, end))
}

/// Given the byte index of an opening brace, returns the exclusive end of its block.
pub fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, character) in text[start..].char_indices() {
        if in_string {
            match character {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match character {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + character.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// The slice of at most `max_chars` characters that ends at byte index `end`.
pub fn window_before(text: &str, end: usize, max_chars: usize) -> &str {
    let head = &text[..end];
    let start = head.char_indices().rev().nth(max_chars.saturating_sub(1)).map_or(0, |(i, _)| i);
    &head[start..]
}

/// Truncates to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
