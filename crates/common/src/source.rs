//! Collaborator seams: where orders and unit economics come from.
//!
//! The report pipeline and the scheduler only see these traits, so the Ozon
//! and Google Sheets clients can be swapped for in-memory fakes in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Posting, ProductInfo, SkuSales, UnitEconomics};
use crate::Error;

/// Marketplace order feed.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// All postings created in `[since, until]`, any status.
    async fn fetch_postings(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Posting>, Error>;

    /// Unfulfilled postings in `status` whose shipping cutoff is within
    /// `[since, until]`.
    async fn fetch_unfulfilled(
        &self,
        status: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Posting>, Error>;
}

/// Per-product catalog and sales analytics.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Look up by offer id or numeric SKU. `Ok(None)` when unknown.
    async fn product_info(&self, identifier: &str) -> Result<Option<ProductInfo>, Error>;

    async fn sku_sales(&self, sku: u64, days: i64) -> Result<SkuSales, Error>;
}

/// Loads the whole unit-economics ledger in one round trip.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn load_ledger(&self) -> Result<UnitEconomicsTable, Error>;
}

/// Per-product unit-economics lookup. `None` means the product has no
/// ledger row, which is a normal state and not a zero-cost product.
pub trait UnitEconomicsLookup {
    fn lookup(&self, product_code: &str) -> Option<UnitEconomics>;
}

/// In-memory snapshot of the ledger keyed by product code.
#[derive(Debug, Clone, Default)]
pub struct UnitEconomicsTable {
    rows: HashMap<String, UnitEconomics>,
}

impl UnitEconomicsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row unless the code is already present: the first row for a
    /// code wins. Returns whether the row was stored.
    pub fn insert_first(&mut self, product_code: &str, economics: UnitEconomics) -> bool {
        let code = product_code.trim();
        if code.is_empty() || self.rows.contains_key(code) {
            return false;
        }
        self.rows.insert(code.to_string(), economics);
        true
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl UnitEconomicsLookup for UnitEconomicsTable {
    fn lookup(&self, product_code: &str) -> Option<UnitEconomics> {
        self.rows.get(product_code.trim()).copied()
    }
}

impl UnitEconomicsLookup for HashMap<String, UnitEconomics> {
    fn lookup(&self, product_code: &str) -> Option<UnitEconomics> {
        self.get(product_code).copied()
    }
}
