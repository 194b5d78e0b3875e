//! Parsing of the unit-economics worksheet.
//!
//! The first row is a header; columns are located by their caption so the
//! sheet owner can reorder them freely.

use common::{UnitEconomics, UnitEconomicsTable};
use tracing::{debug, warn};

pub const COL_CODE: &str = "Артикул";
pub const COL_COST: &str = "Себестоимость";
pub const COL_SELL_PRICE: &str = "Цена продажи";
pub const COL_COMMISSION: &str = "Комиссия";
pub const COL_LOGISTICS: &str = "Логистика полная";
pub const COL_STORAGE: &str = "Хранение за ед (60 дней)";
pub const COL_EXTRA: &str = "Доп расходы";

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerColumns {
    pub code: usize,
    pub cost: Option<usize>,
    pub sell_price: Option<usize>,
    pub commission: Option<usize>,
    pub logistics: Option<usize>,
    pub storage: Option<usize>,
    pub extra: Option<usize>,
}

impl LedgerColumns {
    /// `None` when the header has no product-code column.
    pub fn from_header(header: &[String]) -> Option<Self> {
        let find = |caption: &str| header.iter().position(|h| h.trim() == caption);

        Some(Self {
            code: find(COL_CODE)?,
            cost: find(COL_COST),
            sell_price: find(COL_SELL_PRICE),
            commission: find(COL_COMMISSION),
            logistics: find(COL_LOGISTICS),
            storage: find(COL_STORAGE),
            extra: find(COL_EXTRA),
        })
    }

    fn economics(&self, row: &[String]) -> UnitEconomics {
        let cell = |col: Option<usize>| {
            col.and_then(|i| row.get(i))
                .map(|v| parse_number(v))
                .unwrap_or(0.0)
        };

        UnitEconomics {
            cost_per_unit: cell(self.cost),
            sell_price_per_unit: cell(self.sell_price),
            commission_per_unit: cell(self.commission),
            logistics_per_unit: cell(self.logistics),
            storage_per_unit: cell(self.storage),
            extra_cost_per_unit: cell(self.extra),
        }
    }
}

/// Parse a spreadsheet cell such as `р.1 234,56`, `1 234,56 ₽` or `25%`.
///
/// Empty or unparseable cells read as `0.0`.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .replace("р.", "")
        .replace('₽', "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        return 0.0;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Build the lookup table from all worksheet rows, header included.
///
/// Rows whose code cell is missing or blank are skipped; the first row for a
/// code wins.
pub fn parse_ledger(rows: &[Vec<String>]) -> UnitEconomicsTable {
    let mut table = UnitEconomicsTable::new();

    let Some((header, body)) = rows.split_first() else {
        warn!("Unit-economics sheet is empty");
        return table;
    };
    let Some(columns) = LedgerColumns::from_header(header) else {
        warn!("Unit-economics sheet has no '{}' column", COL_CODE);
        return table;
    };

    for row in body {
        let Some(code) = row.get(columns.code).map(|c| c.trim()) else {
            continue;
        };
        if code.is_empty() {
            continue;
        }
        if !table.insert_first(code, columns.economics(row)) {
            debug!("Duplicate ledger row for {} ignored", code);
        }
    }

    table
}
