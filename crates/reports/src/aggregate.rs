//! Groups order lines by product code.

use std::collections::HashMap;

use common::{OrderLine, Posting};
use serde::Serialize;

/// Quantity accumulator for one product code within one report cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedProduct {
    pub product_code: String,
    /// First non-empty name seen for the code.
    name: Option<String>,
    pub total_quantity: u64,
}

impl AggregatedProduct {
    fn new(product_code: &str) -> Self {
        Self {
            product_code: product_code.to_string(),
            name: None,
            total_quantity: 0,
        }
    }

    /// Name to show; falls back to the product code when no line had one.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.product_code)
    }
}

/// Insertion-ordered map of product code → aggregate.
#[derive(Debug, Clone, Default)]
pub struct AggregatedProducts {
    items: Vec<AggregatedProduct>,
    index: HashMap<String, usize>,
}

impl AggregatedProducts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one line in. Lines without a product code are dropped.
    pub fn add_line(&mut self, line: &OrderLine) {
        let Some(code) = line.code() else {
            return;
        };

        let slot = match self.index.get(code) {
            Some(&i) => i,
            None => {
                self.items.push(AggregatedProduct::new(code));
                self.index.insert(code.to_string(), self.items.len() - 1);
                self.items.len() - 1
            }
        };

        let product = &mut self.items[slot];
        if product.name.is_none() {
            product.name = line.name().map(str::to_string);
        }
        product.total_quantity = product.total_quantity.saturating_add(line.quantity);
    }

    pub fn get(&self, product_code: &str) -> Option<&AggregatedProduct> {
        self.index.get(product_code).map(|&i| &self.items[i])
    }

    /// Products in first-sighting order.
    pub fn iter(&self) -> impl Iterator<Item = &AggregatedProduct> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_units(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.total_quantity))
    }
}

/// Aggregate a sequence of order lines.
pub fn aggregate<'a, I>(lines: I) -> AggregatedProducts
where
    I: IntoIterator<Item = &'a OrderLine>,
{
    let mut out = AggregatedProducts::new();
    for line in lines {
        out.add_line(line);
    }
    out
}

/// Aggregate the lines of every posting, in posting order.
pub fn aggregate_postings(postings: &[Posting]) -> AggregatedProducts {
    aggregate(postings.iter().flat_map(|p| p.lines.iter()))
}
