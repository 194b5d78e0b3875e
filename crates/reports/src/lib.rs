//! Order reports crate.
//!
//! Aggregates postings by product, joins them with unit economics, keeps
//! track of already-notified postings, and renders chat-ready text.

pub mod aggregate;
pub mod chunk;
pub mod dedup;
pub mod format;
pub mod summary;

pub use aggregate::{aggregate, aggregate_postings, AggregatedProduct, AggregatedProducts};
pub use chunk::{chunk_for_delivery, PARAGRAPH_BREAK};
pub use dedup::{filter_new, SeenPostings};
pub use format::{
    escape_html, format_plan_line, format_posting_notification, format_product_card,
    format_report, ProductCard,
};
pub use summary::{
    summarize, Profitability, ProductFinancials, ProductReportRow, ReportSummary, ReportTotals,
};
