//! Ozon Seller API client library.
//!
//! Provides the FBS posting feeds used by the order reports and new-order
//! notifications, plus product info and SKU analytics for product cards.

pub mod rate_limit;
pub mod rest;
pub mod types;

pub use rate_limit::RateLimiter;
pub use rest::OzonRestClient;
