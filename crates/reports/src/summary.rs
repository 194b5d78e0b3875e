//! Joins aggregated quantities with unit economics.
//!
//! Products without a ledger row stay in the report with their quantity but
//! carry no financials and are left out of every monetary total and of the
//! profitable/loss classification.

use common::{UnitEconomics, UnitEconomicsLookup};
use serde::Serialize;
use tracing::debug;

use crate::aggregate::{AggregatedProduct, AggregatedProducts};

/// Sign of a product's EBITDA for the reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Profitability {
    Profitable,
    LossMaking,
    BreakEven,
}

/// Per-product money figures. Computed in `f64` without intermediate rounding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductFinancials {
    pub quantity: u64,
    pub economics: UnitEconomics,
    pub revenue: f64,
    pub cost_total: f64,
    pub commission_total: f64,
    pub logistics_total: f64,
    pub storage_total: f64,
    pub extra_total: f64,
    pub ebitda_per_unit: f64,
    pub ebitda_total: f64,
}

impl ProductFinancials {
    pub fn compute(economics: UnitEconomics, quantity: u64) -> Self {
        let qty = quantity as f64;
        let ebitda_per_unit = economics.ebitda_per_unit();
        Self {
            quantity,
            economics,
            revenue: economics.sell_price_per_unit * qty,
            cost_total: economics.cost_per_unit * qty,
            commission_total: economics.commission_per_unit * qty,
            logistics_total: economics.logistics_per_unit * qty,
            storage_total: economics.storage_per_unit * qty,
            extra_total: economics.extra_cost_per_unit * qty,
            ebitda_per_unit,
            ebitda_total: ebitda_per_unit * qty,
        }
    }

    pub fn profitability(&self) -> Profitability {
        if self.ebitda_total > 0.0 {
            Profitability::Profitable
        } else if self.ebitda_total < 0.0 {
            Profitability::LossMaking
        } else {
            Profitability::BreakEven
        }
    }
}

/// One product line of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductReportRow {
    pub product: AggregatedProduct,
    /// `None` when the ledger has no row for the product.
    pub financials: Option<ProductFinancials>,
}

/// Sums over resolved rows only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReportTotals {
    pub revenue: f64,
    pub cost: f64,
    pub commission: f64,
    pub logistics: f64,
    pub storage: f64,
    pub extra: f64,
    pub ebitda: f64,
}

impl ReportTotals {
    fn add(&mut self, f: &ProductFinancials) {
        self.revenue += f.revenue;
        self.cost += f.cost_total;
        self.commission += f.commission_total;
        self.logistics += f.logistics_total;
        self.storage += f.storage_total;
        self.extra += f.extra_total;
        self.ebitda += f.ebitda_total;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Rows in aggregation order.
    pub rows: Vec<ProductReportRow>,
    pub totals: ReportTotals,
}

impl ReportSummary {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_units(&self) -> u64 {
        self.rows
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.product.total_quantity))
    }

    pub fn profitable_count(&self) -> usize {
        self.count(Profitability::Profitable)
    }

    pub fn loss_count(&self) -> usize {
        self.count(Profitability::LossMaking)
    }

    /// Rows the ledger could not resolve.
    pub fn unresolved_count(&self) -> usize {
        self.rows.iter().filter(|r| r.financials.is_none()).count()
    }

    /// Up to `n` profitable rows, highest EBITDA first. Ties keep report order.
    pub fn top_profitable(&self, n: usize) -> Vec<(&ProductReportRow, ProductFinancials)> {
        let mut picked = self.resolved(Profitability::Profitable);
        picked.sort_by(|a, b| b.1.ebitda_total.total_cmp(&a.1.ebitda_total));
        picked.truncate(n);
        picked
    }

    /// Up to `n` loss-making rows, deepest loss first. Ties keep report order.
    pub fn top_loss_making(&self, n: usize) -> Vec<(&ProductReportRow, ProductFinancials)> {
        let mut picked = self.resolved(Profitability::LossMaking);
        picked.sort_by(|a, b| a.1.ebitda_total.total_cmp(&b.1.ebitda_total));
        picked.truncate(n);
        picked
    }

    fn count(&self, class: Profitability) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.financials)
            .filter(|f| f.profitability() == class)
            .count()
    }

    fn resolved(&self, class: Profitability) -> Vec<(&ProductReportRow, ProductFinancials)> {
        self.rows
            .iter()
            .filter_map(|r| r.financials.map(|f| (r, f)))
            .filter(|(_, f)| f.profitability() == class)
            .collect()
    }
}

/// Build the report summary for one aggregation cycle.
pub fn summarize<L>(aggregated: &AggregatedProducts, lookup: &L) -> ReportSummary
where
    L: UnitEconomicsLookup + ?Sized,
{
    let mut summary = ReportSummary::default();

    for product in aggregated.iter() {
        let financials = lookup
            .lookup(&product.product_code)
            .map(|ue| ProductFinancials::compute(ue, product.total_quantity));

        match &financials {
            Some(f) => summary.totals.add(f),
            None => debug!("{}: no unit economics row", product.product_code),
        }

        summary.rows.push(ProductReportRow {
            product: product.clone(),
            financials,
        });
    }

    summary
}
