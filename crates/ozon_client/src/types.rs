//! Wire types for the Ozon Seller API and their mapping onto domain types.

use common::{OrderLine, Posting, ProductInfo, SkuSales};
use serde::{Deserialize, Serialize};

// ── FBS postings ──────────────────────────────────────────────────────

/// Response of `/v3/posting/fbs/list`.
#[derive(Debug, Deserialize)]
pub struct PostingListResponse {
    #[serde(default)]
    pub result: PostingListResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostingListResult {
    #[serde(default)]
    pub postings: Vec<FbsPosting>,
    #[serde(default)]
    pub has_next: bool,
}

/// Response of `/v3/posting/fbs/unfulfilled/list`.
#[derive(Debug, Deserialize)]
pub struct UnfulfilledListResponse {
    #[serde(default)]
    pub result: UnfulfilledListResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnfulfilledListResult {
    #[serde(default)]
    pub postings: Vec<FbsPosting>,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FbsPosting {
    #[serde(default)]
    pub posting_number: Option<String>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub products: Option<Vec<FbsProduct>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FbsProduct {
    #[serde(default)]
    pub offer_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub sku: Option<u64>,
}

impl From<FbsProduct> for OrderLine {
    fn from(p: FbsProduct) -> Self {
        OrderLine {
            product_code: p.offer_id,
            display_name: p.name,
            quantity: p.quantity,
        }
    }
}

impl From<FbsPosting> for Posting {
    fn from(p: FbsPosting) -> Self {
        Posting {
            identifier: p.posting_number,
            order_number: p.order_number,
            status: p.status,
            lines: p
                .products
                .unwrap_or_default()
                .into_iter()
                .map(OrderLine::from)
                .collect(),
        }
    }
}

// ── Request bodies ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PostingListRequest {
    pub dir: &'static str,
    pub limit: u32,
    pub offset: u32,
    pub with: PostingListWith,
    pub filter: PostingListFilter,
}

#[derive(Debug, Serialize)]
pub struct PostingListWith {
    pub analytics_data: bool,
    pub financial_data: bool,
}

#[derive(Debug, Serialize)]
pub struct PostingListFilter {
    pub since: String,
    pub to: String,
    /// Empty string selects every status.
    pub status: String,
    pub delivery_method_id: Vec<u64>,
    pub warehouse_id: Vec<u64>,
}

#[derive(Debug, Serialize)]
pub struct UnfulfilledListRequest {
    pub dir: &'static str,
    pub limit: u32,
    pub offset: u32,
    pub filter: UnfulfilledFilter,
}

#[derive(Debug, Serialize)]
pub struct UnfulfilledFilter {
    pub status: String,
    pub cutoff_from: String,
    pub cutoff_to: String,
}

#[derive(Debug, Serialize)]
pub struct ProductInfoRequest {
    pub offer_id: Vec<String>,
    pub product_id: Vec<u64>,
    pub sku: Vec<u64>,
}

impl ProductInfoRequest {
    /// A numeric identifier is treated as a SKU, anything else as an offer id.
    pub fn for_identifier(identifier: &str) -> Self {
        let identifier = identifier.trim();
        match identifier.parse::<u64>() {
            Ok(sku) if identifier.chars().all(|c| c.is_ascii_digit()) => Self {
                offer_id: Vec::new(),
                product_id: Vec::new(),
                sku: vec![sku],
            },
            _ => Self {
                offer_id: vec![identifier.to_string()],
                product_id: Vec::new(),
                sku: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsRequest {
    pub date_from: String,
    pub date_to: String,
    pub metrics: Vec<&'static str>,
    pub dimension: Vec<&'static str>,
    pub filters: Vec<serde_json::Value>,
    pub sort: Vec<AnalyticsSort>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSort {
    pub key: &'static str,
    pub order: &'static str,
}

// ── Product info ──────────────────────────────────────────────────────

/// Response of `/v3/product/info/list`.
#[derive(Debug, Deserialize)]
pub struct ProductInfoResponse {
    #[serde(default)]
    pub items: Vec<ProductItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductItem {
    #[serde(default)]
    pub offer_id: Option<String>,
    #[serde(default)]
    pub sku: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    /// Decimal string, e.g. `"1290.0000"`.
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub stocks: Option<ProductStocks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductStocks {
    #[serde(default)]
    pub stocks: Vec<StockEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockEntry {
    #[serde(default)]
    pub present: u64,
}

impl ProductItem {
    pub fn into_product_info(self, requested: &str) -> ProductInfo {
        let price = self
            .price
            .as_deref()
            .and_then(|p| p.trim().replace(',', ".").parse::<f64>().ok())
            .unwrap_or(0.0);
        let stock = self
            .stocks
            .map(|s| s.stocks.iter().map(|e| e.present).sum())
            .unwrap_or(0);
        let offer_id = self
            .offer_id
            .filter(|o| !o.trim().is_empty())
            .unwrap_or_else(|| requested.trim().to_string());
        ProductInfo {
            name: self.name.unwrap_or_else(|| offer_id.clone()),
            offer_id,
            sku: self.sku.filter(|s| *s != 0),
            price,
            stock,
        }
    }
}

// ── Analytics ─────────────────────────────────────────────────────────

/// Response of `/v1/analytics/data`.
#[derive(Debug, Deserialize)]
pub struct AnalyticsResponse {
    #[serde(default)]
    pub result: AnalyticsResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsResult {
    #[serde(default)]
    pub data: Vec<AnalyticsRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsRow {
    #[serde(default)]
    pub dimensions: Vec<AnalyticsDimension>,
    #[serde(default)]
    pub metrics: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsDimension {
    #[serde(default)]
    pub id: String,
}

impl AnalyticsResult {
    /// Sum revenue and ordered units over the rows for `sku`.
    ///
    /// Metrics are requested as `[revenue, ordered_units]`; rows with fewer
    /// metrics are skipped.
    pub fn sales_for_sku(&self, sku: u64) -> SkuSales {
        let sku = sku.to_string();
        let mut revenue = 0.0;
        let mut units = 0.0;
        for row in &self.data {
            let Some(dim) = row.dimensions.first() else {
                continue;
            };
            if dim.id != sku || row.metrics.len() < 2 {
                continue;
            }
            revenue += row.metrics[0];
            units += row.metrics[1];
        }
        SkuSales {
            revenue,
            ordered_units: units.max(0.0).round() as u64,
        }
    }
}
