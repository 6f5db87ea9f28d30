//! Catalog snapshot, attribute filtering, and natural-language criteria parsing.

pub mod criteria;
pub mod filter;

use std::collections::HashMap;

use crate::domain::product::{Product, ProductId};

pub use criteria::parse_criteria;
pub use filter::{color_matches, filter_products, FilterCriteria};

/// Read-only view of the products available to one request.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Builds a snapshot; a repeated id keeps its first occurrence.
    pub fn new(products: Vec<Product>) -> Self {
        let mut unique = Vec::with_capacity(products.len());
        let mut index = HashMap::with_capacity(products.len());
        for product in products {
            if index.contains_key(&product.id) {
                continue;
            }
            index.insert(product.id.clone(), unique.len());
            unique.push(product);
        }
        Self { products: unique, index }
    }

    pub fn find(&self, product_id: &ProductId) -> Option<&Product> {
        self.index.get(product_id).map(|position| &self.products[*position])
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.index.contains_key(product_id)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl From<Vec<Product>> for Catalog {
    fn from(products: Vec<Product>) -> Self {
        Self::new(products)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::Catalog;
    use crate::domain::product::{Product, ProductId};

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let catalog = Catalog::new(vec![
            Product::new("A", "Jacket", Decimal::from(50)),
            Product::new("A", "Shadow Jacket", Decimal::from(999)),
            Product::new("B", "Cap", Decimal::from(20)),
        ]);

        assert_eq!(catalog.len(), 2);
        let jacket = catalog.find(&ProductId::from("A")).expect("product A");
        assert_eq!(jacket.name, "Jacket");
        assert!(catalog.contains(&ProductId::from("B")));
        assert!(!catalog.contains(&ProductId::from("C")));
    }
}
