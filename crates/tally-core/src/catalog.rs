//! # Catalog Port
//!
//! The pricing engine reads fully-loaded entity graphs through [`Catalog`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tally-db                                   tally-core                  │
//! │                                                                         │
//! │  CatalogRepository::load(request)  ──►  CatalogSnapshot  ──► price_item │
//! │  (fixed number of IN (...) queries)     (impl Catalog)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The storage layer fetches everything a cart needs in one batch, hands
//! the snapshot in, and pricing runs without further I/O.

use std::collections::{BTreeSet, HashMap};

use crate::pricing::item::{line_target, LineTarget};
use crate::types::{Bundle, LineSpec, Product};

/// Lookup-by-id access to loaded products and bundles.
pub trait Catalog {
    fn product(&self, id: &str) -> Option<&Product>;
    fn bundle(&self, id: &str) -> Option<&Bundle>;
}

/// The ids a batch of lines needs loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRequest {
    pub product_ids: BTreeSet<String>,
    pub bundle_ids: BTreeSet<String>,
}

impl CatalogRequest {
    /// Collects referenced ids. Malformed lines are skipped here and
    /// rejected later by pricing.
    pub fn for_lines(lines: &[LineSpec]) -> Self {
        let mut request = CatalogRequest::default();

        for line in lines {
            match line_target(line) {
                Ok(LineTarget::Product { product_id, .. }) => {
                    request.product_ids.insert(product_id.to_string());
                }
                Ok(LineTarget::Bundle { bundle_id }) => {
                    request.bundle_ids.insert(bundle_id.to_string());
                }
                Err(_) => {}
            }
        }

        request
    }

    pub fn is_empty(&self) -> bool {
        self.product_ids.is_empty() && self.bundle_ids.is_empty()
    }
}

/// An in-memory catalog, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: HashMap<String, Product>,
    bundles: HashMap<String, Bundle>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn insert_bundle(&mut self, bundle: Bundle) {
        self.bundles.insert(bundle.id.clone(), bundle);
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.values()
    }
}

impl Catalog for CatalogSnapshot {
    fn product(&self, id: &str) -> Option<&Product> {
        self.products.get(id)
    }

    fn bundle(&self, id: &str) -> Option<&Bundle> {
        self.bundles.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_collects_ids() {
        let lines = vec![
            LineSpec::product("p1", 1),
            LineSpec::product("p1", 2),
            LineSpec::bundle("b1", 1),
            LineSpec {
                quantity: 1,
                ..Default::default()
            },
        ];

        let request = CatalogRequest::for_lines(&lines);
        assert_eq!(request.product_ids.len(), 1);
        assert!(request.bundle_ids.contains("b1"));
        assert!(!request.is_empty());
        assert!(CatalogRequest::for_lines(&[]).is_empty());
    }
}
