use std::sync::Arc;

use anyhow::{anyhow, Result};
use cartwise_core::domain::intent::{IntentKind, PriceRange, QueryIntent};
use cartwise_core::intent::KeywordIntentBuilder;
use cartwise_core::text::{first_json_object, parse_money};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::llm::{CompletionOptions, LlmClient};

const INTENT_INSTRUCTIONS: &str = r#"You extract shopping intent from a customer message.
Respond with a single JSON object and nothing else, using this shape:
{"intentKind":"search|recommendation|question|comparison","category":string|null,"type":string|null,
"priceRange":{"min":number|null,"max":number|null}|null,"colors":[string],"keywords":[string],
"scenario":string|null,"isPriceQuery":bool,"isCategoryQuery":bool,"isSizeQuery":bool}
Customer message:"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentSource {
    Llm,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentOutcome {
    pub intent: QueryIntent,
    pub source: IntentSource,
}

/// Model-backed intent extraction that degrades to the keyword builder.
#[derive(Clone)]
pub struct IntentExtractor {
    llm: Option<Arc<dyn LlmClient>>,
    fallback: KeywordIntentBuilder,
    options: CompletionOptions,
}

impl IntentExtractor {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, options: CompletionOptions) -> Self {
        Self { llm, fallback: KeywordIntentBuilder::new(), options }
    }

    pub fn keyword_only() -> Self {
        Self::new(None, CompletionOptions::default())
    }

    /// Never fails; any capability problem yields the keyword-built intent.
    pub async fn extract(&self, message: &str, correlation_id: &str) -> IntentOutcome {
        let Some(llm) = &self.llm else {
            return self.fallback(message);
        };

        let prompt = format!("{INTENT_INSTRUCTIONS}\n{message}");
        let reply = llm.complete(&prompt, self.options).await;
        match reply.and_then(|reply| parse_intent_reply(&reply)) {
            Ok(intent) => {
                debug!(
                    event_name = "intent.extracted",
                    correlation_id,
                    intent_kind = intent.intent_kind.as_str(),
                    "intent extracted by model"
                );
                IntentOutcome { intent, source: IntentSource::Llm }
            }
            Err(error) => {
                warn!(
                    event_name = "intent.fallback",
                    correlation_id,
                    error = %error,
                    "model intent extraction failed, using keyword intent"
                );
                self.fallback(message)
            }
        }
    }

    fn fallback(&self, message: &str) -> IntentOutcome {
        IntentOutcome { intent: self.fallback.build(message), source: IntentSource::Fallback }
    }
}

/// Reads the first balanced JSON object in a model reply as a `QueryIntent`.
pub fn parse_intent_reply(reply: &str) -> Result<QueryIntent> {
    let (start, end) =
        first_json_object(reply).ok_or_else(|| anyhow!("reply contains no JSON object"))?;
    let value: Value = serde_json::from_str(&reply[start..end])?;
    let object = value.as_object().ok_or_else(|| anyhow!("intent payload is not an object"))?;

    let price_range = field(object, &["priceRange", "price_range"])
        .and_then(Value::as_object)
        .map(|range| PriceRange {
            min: field(range, &["min"]).and_then(decimal_value),
            max: field(range, &["max"]).and_then(decimal_value),
        })
        .filter(|range| !range.is_empty());

    Ok(QueryIntent {
        intent_kind: field(object, &["intentKind", "intent_kind", "intent"])
            .and_then(Value::as_str)
            .map(IntentKind::parse_loose)
            .unwrap_or_default(),
        category: text_field(object, &["category"]),
        product_type: text_field(object, &["type", "productType", "product_type"]),
        price_range,
        colors: list_field(object, &["colors", "color"]),
        keywords: list_field(object, &["keywords"]),
        scenario: text_field(object, &["scenario"]),
        is_price_query: bool_field(object, &["isPriceQuery", "is_price_query"]),
        is_category_query: bool_field(object, &["isCategoryQuery", "is_category_query"]),
        is_size_query: bool_field(object, &["isSizeQuery", "is_size_query"]),
    })
}

fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key)).filter(|value| !value.is_null())
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    field(object, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_lowercase)
}

fn list_field(object: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let values = match field(object, keys) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect::<Vec<_>>(),
        Some(Value::String(item)) => vec![item.as_str()],
        _ => Vec::new(),
    };
    values
        .into_iter()
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

fn bool_field(object: &Map<String, Value>, keys: &[&str]) -> bool {
    match field(object, keys) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .and_then(|number| Decimal::try_from(number).ok())
            .map(|number| number.normalize()),
        Value::String(text) => parse_money(text),
        _ => None,
    }
}
