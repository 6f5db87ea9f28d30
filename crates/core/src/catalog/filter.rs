use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::Product;

/// Structured filter. Present fields are ANDed; `keywords` and `sizes` are ORed internally.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub color: Option<String>,
    pub sizes: Vec<String>,
    pub keywords: Vec<String>,
}

impl FilterCriteria {
    pub fn keywords_only(keywords: Vec<String>) -> Self {
        Self { keywords, ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.product_type.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.color.is_none()
            && self.sizes.is_empty()
            && self.keywords.is_empty()
    }

    /// Category, type, or price were recognised.
    pub fn has_primary_signal(&self) -> bool {
        self.category.is_some()
            || self.product_type.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
    }

    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category {
            if !contains_ignore_case(&product.category, category) {
                return false;
            }
        }
        if let Some(product_type) = &self.product_type {
            if !contains_ignore_case(&product.product_type, product_type) {
                return false;
            }
        }
        if let Some(min_price) = self.min_price {
            if product.price < min_price {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if product.price > max_price {
                return false;
            }
        }
        if let Some(color) = &self.color {
            if !color_matches(&product.color, color) {
                return false;
            }
        }
        if !self.sizes.is_empty() && !self.sizes.iter().any(|size| product.has_size(size)) {
            return false;
        }
        if !self.keywords.is_empty() {
            let text = product.searchable_text();
            let any_keyword = self
                .keywords
                .iter()
                .map(|keyword| keyword.trim().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .any(|keyword| text.contains(&keyword));
            if !any_keyword {
                return false;
            }
        }
        true
    }
}

/// Keeps catalog order.
pub fn filter_products(products: &[Product], criteria: &FilterCriteria) -> Vec<Product> {
    products.iter().filter(|product| criteria.matches(product)).cloned().collect()
}

/// Case-insensitive color match that also compares the parts of compound values like
/// `Black/White`.
pub fn color_matches(product_color: &str, wanted: &str) -> bool {
    let product_color = product_color.to_lowercase();
    let wanted = wanted.trim().to_lowercase();
    if wanted.is_empty() {
        return true;
    }
    if product_color.contains(&wanted) {
        return true;
    }

    let product_tokens = color_tokens(&product_color);
    color_tokens(&wanted).iter().any(|token| product_tokens.contains(token))
}

fn color_tokens(value: &str) -> Vec<String> {
    value
        .split(|character: char| character == '/' || character == ',' || character.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    needle.is_empty() || haystack.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{color_matches, filter_products, FilterCriteria};
    use crate::domain::product::Product;

    fn catalog() -> Vec<Product> {
        vec![
            Product::new("A", "Storm Jacket", Decimal::from(50))
                .with_category("Clothing")
                .with_type("Jacket")
                .with_color("Black/White")
                .with_sizes(["S", "M", "L"]),
            Product::new("B", "Logo Cap", Decimal::from(20))
                .with_category("Accessories")
                .with_type("Cap")
                .with_color("Red"),
            Product::new("C", "Trail Boots", Decimal::from(80))
                .with_category("Footwear")
                .with_type("Boots")
                .with_color("Brown")
                .with_description("Waterproof leather hiking boots")
                .with_sizes(["9", "10", "11"]),
        ]
    }

    fn ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|product| product.id.as_str()).collect()
    }

    #[test]
    fn max_price_keeps_cheaper_products() {
        let criteria =
            FilterCriteria { max_price: Some(Decimal::from(30)), ..FilterCriteria::default() };
        assert_eq!(ids(&filter_products(&catalog(), &criteria)), vec!["B"]);
    }

    #[test]
    fn fields_are_conjunctive() {
        let criteria = FilterCriteria {
            category: Some("clothing".to_string()),
            max_price: Some(Decimal::from(40)),
            ..FilterCriteria::default()
        };
        assert!(filter_products(&catalog(), &criteria).is_empty());
    }

    #[test]
    fn keywords_are_disjunctive_over_all_text_fields() {
        let criteria =
            FilterCriteria::keywords_only(vec!["waterproof".to_string(), "logo".to_string()]);
        assert_eq!(ids(&filter_products(&catalog(), &criteria)), vec!["B", "C"]);
    }

    #[test]
    fn sizes_match_exactly_ignoring_case() {
        let criteria = FilterCriteria { sizes: vec!["m".to_string()], ..FilterCriteria::default() };
        assert_eq!(ids(&filter_products(&catalog(), &criteria)), vec!["A"]);

        let criteria =
            FilterCriteria { sizes: vec!["1".to_string()], ..FilterCriteria::default() };
        assert!(filter_products(&catalog(), &criteria).is_empty());
    }

    #[test]
    fn compound_colors_match_either_token() {
        assert!(color_matches("Black/White", "white"));
        assert!(color_matches("Navy, Grey", "grey"));
        assert!(color_matches("Black", "black/red"));
        assert!(!color_matches("Brown", "black"));
    }

    #[test]
    fn filtering_is_a_subset_and_composes_for_independent_fields() {
        let products = catalog();
        let by_price =
            FilterCriteria { min_price: Some(Decimal::from(30)), ..FilterCriteria::default() };
        let by_color =
            FilterCriteria { color: Some("brown".to_string()), ..FilterCriteria::default() };
        let both = FilterCriteria {
            min_price: Some(Decimal::from(30)),
            color: Some("brown".to_string()),
            ..FilterCriteria::default()
        };

        let once = filter_products(&products, &by_price);
        assert!(once.iter().all(|product| products.contains(product)));

        let twice = filter_products(&once, &by_color);
        assert_eq!(twice, filter_products(&products, &both));
        assert_eq!(ids(&twice), vec!["C"]);
    }

    #[test]
    fn empty_criteria_keeps_everything() {
        let criteria = FilterCriteria::default();
        assert!(criteria.is_empty());
        assert_eq!(filter_products(&catalog(), &criteria).len(), 3);
    }
}
