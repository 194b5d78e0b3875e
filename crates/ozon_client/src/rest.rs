//! REST client for the Ozon Seller API.
//!
//! Covers: FBS posting feeds, product info, SKU sales analytics.
//! All methods are rate-limited and carry per-endpoint timeouts.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use common::{Error, OrderSource, Posting, ProductCatalog, ProductInfo, SkuSales};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::rate_limit::RateLimiter;
use crate::types::{
    AnalyticsRequest, AnalyticsResponse, AnalyticsSort, PostingListFilter, PostingListRequest,
    PostingListResponse, PostingListWith, ProductInfoRequest, ProductInfoResponse,
    UnfulfilledFilter, UnfulfilledListRequest, UnfulfilledListResponse,
};

const POSTING_LIST_PATH: &str = "/v3/posting/fbs/list";
const UNFULFILLED_LIST_PATH: &str = "/v3/posting/fbs/unfulfilled/list";
const PRODUCT_INFO_PATH: &str = "/v3/product/info/list";
const ANALYTICS_PATH: &str = "/v1/analytics/data";

const POSTING_PAGE_SIZE: u32 = 1000;
const UNFULFILLED_PAGE_SIZE: u32 = 100;
/// Upper bound on pages per call so a misbehaving `has_next` cannot spin.
const MAX_PAGES: u32 = 50;

const LIST_TIMEOUT: Duration = Duration::from_secs(20);
const UNFULFILLED_TIMEOUT: Duration = Duration::from_secs(15);
const INFO_TIMEOUT: Duration = Duration::from_secs(10);
const ANALYTICS_TIMEOUT: Duration = Duration::from_secs(15);

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 800;
    let compact = raw.replace('\n', " ").replace('\r', " ");
    if compact.chars().count() > MAX_CHARS {
        let cut: String = compact.chars().take(MAX_CHARS).collect();
        format!("{cut}…")
    } else {
        compact
    }
}

/// Offset pagination with a hard page cap.
#[derive(Debug, Default)]
struct PageCursor {
    offset: u32,
    pages: u32,
}

impl PageCursor {
    /// Offset for the next request, `None` once `MAX_PAGES` were fetched.
    fn next_offset(&self) -> Option<u32> {
        (self.pages < MAX_PAGES).then_some(self.offset)
    }

    fn advance(&mut self, items: usize) {
        self.pages += 1;
        self.offset = self
            .offset
            .saturating_add(u32::try_from(items).unwrap_or(u32::MAX));
    }
}

fn warn_truncated(path: &str, cursor: &PageCursor, fetched: usize) {
    warn!(
        "Ozon {} still had more after {} pages; returning the first {} postings (next offset {})",
        path, cursor.pages, fetched, cursor.offset
    );
}

/// RFC 3339 with a `Z` suffix and whole seconds, as the posting filters expect.
pub fn format_instant(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Async REST client for the Ozon Seller API.
#[derive(Debug, Clone)]
pub struct OzonRestClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    api_key: String,
    limiter: RateLimiter,
}

impl OzonRestClient {
    pub fn new(client_id: &str, api_key: &str, base_url: &str) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(LIST_TIMEOUT)
            .build()
            .map_err(|e| Error::http(&e))?;

        let base_url = normalize_base_url(base_url);
        info!("Ozon Seller API base URL: {}", base_url);

        Ok(Self {
            client,
            base_url,
            client_id: client_id.trim().to_string(),
            api_key: api_key.trim().to_string(),
            limiter: RateLimiter::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, timeout: Duration) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.limiter.wait().await;

        let resp = self
            .client
            .post(self.url(path))
            .header("Client-Id", &self.client_id)
            .header("Api-Key", &self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::http(&e))?;

        let status_code = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Ozon {} returned {}", path, status_code);
            return Err(Error::OzonApi {
                status: status_code,
                message: summarize_response_body(&body),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::http(&e))
    }

    // ── Posting feeds ─────────────────────────────────────────────────

    /// All FBS postings created in the window, any status.
    ///
    /// Follows `has_next` pagination.
    pub async fn list_fbs_postings(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Posting>, Error> {
        let mut postings = Vec::new();
        let mut cursor = PageCursor::default();

        while let Some(offset) = cursor.next_offset() {
            let request = PostingListRequest {
                dir: "ASC",
                limit: POSTING_PAGE_SIZE,
                offset,
                with: PostingListWith {
                    analytics_data: false,
                    financial_data: false,
                },
                filter: PostingListFilter {
                    since: format_instant(since),
                    to: format_instant(until),
                    status: String::new(),
                    delivery_method_id: Vec::new(),
                    warehouse_id: Vec::new(),
                },
            };

            let body: PostingListResponse = self
                .post_json(POSTING_LIST_PATH, &request, LIST_TIMEOUT)
                .await?;

            let count = body.result.postings.len();
            postings.extend(body.result.postings.into_iter().map(Posting::from));
            debug!("Fetched {} postings (total: {})", count, postings.len());

            if !body.result.has_next || count == 0 {
                return Ok(postings);
            }
            cursor.advance(count);
        }

        warn_truncated(POSTING_LIST_PATH, &cursor, postings.len());
        Ok(postings)
    }

    /// Unfulfilled FBS postings in `status` with a shipping cutoff in the window.
    pub async fn list_unfulfilled(
        &self,
        status: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Posting>, Error> {
        let mut postings = Vec::new();
        let mut cursor = PageCursor::default();

        while let Some(offset) = cursor.next_offset() {
            let request = UnfulfilledListRequest {
                dir: "asc",
                limit: UNFULFILLED_PAGE_SIZE,
                offset,
                filter: UnfulfilledFilter {
                    status: status.to_string(),
                    cutoff_from: format_instant(since),
                    cutoff_to: format_instant(until),
                },
            };

            let body: UnfulfilledListResponse = self
                .post_json(UNFULFILLED_LIST_PATH, &request, UNFULFILLED_TIMEOUT)
                .await?;

            let page = body.result.postings.len();
            postings.extend(body.result.postings.into_iter().map(Posting::from));

            if page == 0 || postings.len() as u64 >= body.result.count {
                debug!("Fetched {} unfulfilled postings in {}", postings.len(), status);
                return Ok(postings);
            }
            cursor.advance(page);
        }

        warn_truncated(UNFULFILLED_LIST_PATH, &cursor, postings.len());
        Ok(postings)
    }

    // ── Product card ──────────────────────────────────────────────────

    /// Look up a product by offer id or numeric SKU.
    ///
    /// `Ok(None)` when the cabinet has no such product.
    pub async fn product_info(&self, identifier: &str) -> Result<Option<ProductInfo>, Error> {
        let request = ProductInfoRequest::for_identifier(identifier);
        let body: ProductInfoResponse = self
            .post_json(PRODUCT_INFO_PATH, &request, INFO_TIMEOUT)
            .await?;

        Ok(body
            .items
            .into_iter()
            .next()
            .map(|item| item.into_product_info(identifier)))
    }

    /// Revenue and ordered units for `sku` over the trailing `days` days.
    pub async fn sku_sales(&self, sku: u64, days: i64) -> Result<SkuSales, Error> {
        let date_to = Utc::now().date_naive();
        let date_from = date_to - chrono::Duration::days(days.max(0));

        let request = AnalyticsRequest {
            date_from: date_from.format("%Y-%m-%d").to_string(),
            date_to: date_to.format("%Y-%m-%d").to_string(),
            metrics: vec!["revenue", "ordered_units"],
            dimension: vec!["sku"],
            filters: Vec::new(),
            sort: vec![AnalyticsSort {
                key: "ordered_units",
                order: "DESC",
            }],
            limit: 1000,
            offset: 0,
        };

        let body: AnalyticsResponse = self
            .post_json(ANALYTICS_PATH, &request, ANALYTICS_TIMEOUT)
            .await?;

        Ok(body.result.sales_for_sku(sku))
    }
}

#[async_trait]
impl OrderSource for OzonRestClient {
    async fn fetch_postings(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Posting>, Error> {
        self.list_fbs_postings(since, until).await
    }

    async fn fetch_unfulfilled(
        &self,
        status: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Posting>, Error> {
        self.list_unfulfilled(status, since, until).await
    }
}

#[async_trait]
impl ProductCatalog for OzonRestClient {
    async fn product_info(&self, identifier: &str) -> Result<Option<ProductInfo>, Error> {
        OzonRestClient::product_info(self, identifier).await
    }

    async fn sku_sales(&self, sku: u64, days: i64) -> Result<SkuSales, Error> {
        OzonRestClient::sku_sales(self, sku, days).await
    }
}
