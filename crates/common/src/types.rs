//! Domain types shared between the Ozon client, the ledger client and the
//! report pipeline.

use serde::{Deserialize, Serialize};

/// One product entry within one posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Seller-assigned product identifier (Ozon `offer_id`).
    pub product_code: Option<String>,
    pub display_name: Option<String>,
    pub quantity: u64,
}

impl OrderLine {
    pub fn new(product_code: &str, display_name: &str, quantity: u64) -> Self {
        Self {
            product_code: non_empty(product_code),
            display_name: non_empty(display_name),
            quantity,
        }
    }

    /// Product code, if present and non-blank.
    pub fn code(&self) -> Option<&str> {
        self.product_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Display name, if present and non-blank.
    pub fn name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// One fulfillment-ready order batch from the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Ozon `posting_number`. Postings without one cannot be deduplicated.
    pub identifier: Option<String>,
    pub order_number: Option<String>,
    pub status: Option<String>,
    pub lines: Vec<OrderLine>,
}

impl Posting {
    pub fn id(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Per-unit cost and pricing snapshot for one product, in roubles per unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitEconomics {
    pub cost_per_unit: f64,
    pub sell_price_per_unit: f64,
    pub commission_per_unit: f64,
    pub logistics_per_unit: f64,
    pub storage_per_unit: f64,
    pub extra_cost_per_unit: f64,
}

impl UnitEconomics {
    /// Everything subtracted from the sell price, including cost of goods.
    pub fn expenses_per_unit(&self) -> f64 {
        self.commission_per_unit
            + self.logistics_per_unit
            + self.storage_per_unit
            + self.extra_cost_per_unit
            + self.cost_per_unit
    }

    pub fn ebitda_per_unit(&self) -> f64 {
        self.sell_price_per_unit - self.expenses_per_unit()
    }
}

/// Sales analytics for one SKU over a trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SkuSales {
    pub revenue: f64,
    pub ordered_units: u64,
}

/// Catalog data for one product as the marketplace reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub offer_id: String,
    pub sku: Option<u64>,
    pub name: String,
    pub price: f64,
    pub stock: u64,
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
