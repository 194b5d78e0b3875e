//! Report assembly: fetch → aggregate → join ledger → render.

use chrono::{DateTime, NaiveDate, Utc};
use common::{Error, UnitEconomicsLookup};
use reports::{
    aggregate_postings, format_plan_line, format_report, summarize, ProductCard, ReportSummary,
    PARAGRAPH_BREAK,
};
use tracing::{debug, info, warn};

use crate::context::BotContext;

/// Summary of all postings created in `[since, until]`.
///
/// The ledger is loaded once, and only when there is something to price.
pub async fn summarize_window(
    ctx: &BotContext,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<ReportSummary, Error> {
    let postings = ctx.orders.fetch_postings(since, until).await?;
    let aggregated = aggregate_postings(&postings);
    if aggregated.is_empty() {
        debug!("No order lines between {} and {}", since, until);
        return Ok(ReportSummary::default());
    }

    let ledger = ctx.ledger.load_ledger().await?;
    let summary = summarize(&aggregated, &ledger);
    info!(
        "Summarized {} postings: {} products, {} unresolved, EBITDA {:.2}",
        postings.len(),
        summary.rows.len(),
        summary.unresolved_count(),
        summary.totals.ebitda
    );
    Ok(summary)
}

pub fn period_label(days: u32) -> String {
    if days == 1 {
        "за последние сутки".to_string()
    } else {
        format!("за последние {days} дн.")
    }
}

/// `now - span`, or a config error when either side leaves chrono's range.
pub fn window_start(
    now: DateTime<Utc>,
    span: Option<chrono::Duration>,
    what: &str,
) -> Result<DateTime<Utc>, Error> {
    span.and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| Error::Config(format!("{what} is out of range")))
}

/// Report for the trailing `days` days ending at `now`.
pub async fn build_period_report(
    ctx: &BotContext,
    days: u32,
    now: DateTime<Utc>,
) -> Result<String, Error> {
    let since = window_start(
        now,
        chrono::Duration::try_days(i64::from(days)),
        &format!("report window of {days} days"),
    )?;
    let summary = summarize_window(ctx, since, now).await?;
    Ok(format_report(
        &summary,
        &period_label(days),
        ctx.config.report.top_list_size,
    ))
}

/// Rendered daily digest plus the figures it was built from.
#[derive(Debug, Clone)]
pub struct Digest {
    pub date: NaiveDate,
    pub text: String,
    pub revenue: f64,
    pub plan: Option<f64>,
}

/// Digest for the local day before `now`, headed by the plan line if a
/// plan exists for that day.
pub async fn build_digest(ctx: &BotContext, now: DateTime<Utc>) -> Result<Digest, Error> {
    let today = ctx.frame.today(now);
    let date = today.pred_opt().unwrap_or(today);
    let (since, until) = ctx.frame.day_bounds(date);

    let summary = summarize_window(ctx, since, until).await?;
    let plan = ctx.plans.lock().await.get(date);
    let revenue = summary.totals.revenue;

    let report = format_report(
        &summary,
        &format!("за {}", date.format("%d.%m.%Y")),
        ctx.config.report.top_list_size,
    );
    let text = match format_plan_line(date, plan, revenue) {
        Some(line) => format!("{line}{PARAGRAPH_BREAK}{report}"),
        None => report,
    };

    Ok(Digest {
        date,
        text,
        revenue,
        plan,
    })
}

/// Product card for an offer id or SKU. `Ok(None)` when the shop has no
/// such product.
///
/// Analytics and ledger failures degrade the card instead of failing it.
pub async fn build_product_card(
    ctx: &BotContext,
    identifier: &str,
) -> Result<Option<ProductCard>, Error> {
    let identifier = identifier.trim();
    let Some(info) = ctx.catalog.product_info(identifier).await? else {
        return Ok(None);
    };

    let days = ctx.config.report.analytics_days;
    let sales = match info.sku {
        Some(sku) => match ctx.catalog.sku_sales(sku, days).await {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Analytics for SKU {} unavailable: {}", sku, e);
                None
            }
        },
        None => None,
    };

    let cost_per_unit = match ctx.ledger.load_ledger().await {
        Ok(ledger) => ledger.lookup(&info.offer_id).map(|ue| ue.cost_per_unit),
        Err(e) => {
            warn!("Ledger unavailable for product card: {}", e);
            None
        }
    };

    Ok(Some(ProductCard {
        info,
        sales,
        sales_days: days,
        cost_per_unit,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::TimeZone;
    use common::{ProductInfo, SkuSales, UnitEconomics};

    use super::*;
    use crate::testing::{posting, TestHarness};

    fn cup_economics() -> UnitEconomics {
        UnitEconomics {
            cost_per_unit: 50.0,
            sell_price_per_unit: 100.0,
            commission_per_unit: 10.0,
            logistics_per_unit: 5.0,
            storage_per_unit: 2.0,
            extra_cost_per_unit: 1.0,
        }
    }

    fn cup_info() -> ProductInfo {
        ProductInfo {
            offer_id: "CUP-01".into(),
            sku: Some(555),
            name: "Кружка".into(),
            price: 499.0,
            stock: 12,
        }
    }

    #[tokio::test]
    async fn test_period_report_window_and_content() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        harness.orders.set_postings(vec![
            posting("P1", &[("CUP-01", "Кружка", 2)]),
            posting("P2", &[("CUP-01", "", 1), ("GHOST", "Призрак", 4)]),
        ]);
        harness.ledger.insert("CUP-01", cup_economics());

        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let text = build_period_report(&ctx, 7, now).await.unwrap();

        let windows = harness.orders.posting_windows.lock().unwrap().clone();
        assert_eq!(windows, vec![(now - chrono::Duration::days(7), now)]);
        assert!(text.contains("за последние 7 дн."));
        assert!(text.contains("EBITDA: 96.00 ₽"));
        assert!(text.contains("Без данных: 1"));
        assert_eq!(harness.ledger.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_window_skips_ledger() {
        let harness = TestHarness::new();
        let ctx = harness.context();

        let text = build_period_report(&ctx, 1, Utc::now()).await.unwrap();
        assert!(text.contains("не найдено"));
        assert_eq!(harness.ledger.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        harness.orders.failing.store(true, Ordering::SeqCst);

        let err = build_period_report(&ctx, 3, Utc::now()).await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_oversized_window_is_config_error() {
        let harness = TestHarness::new();
        let ctx = harness.context();

        let err = build_period_report(&ctx, u32::MAX, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(harness.orders.total_calls(), 0);
    }

    #[test]
    fn test_window_start() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        assert_eq!(
            window_start(now, chrono::Duration::try_hours(2), "lookback").unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap()
        );
        assert!(window_start(now, chrono::Duration::try_hours(i64::MAX), "lookback").is_err());
    }

    #[tokio::test]
    async fn test_digest_without_plan_has_no_plan_line() {
        let harness = TestHarness::new();
        let ctx = harness.context();

        let now = Utc.with_ymd_and_hms(2026, 10, 16, 5, 0, 0).unwrap();
        let digest = build_digest(&ctx, now).await.unwrap();
        assert_eq!(digest.date, NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
        assert_eq!(digest.plan, None);
        assert!(!digest.text.contains("План"));
    }

    #[tokio::test]
    async fn test_product_card_full() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        *harness.catalog.product.lock().unwrap() = Some(cup_info());
        *harness.catalog.sales.lock().unwrap() = Some(SkuSales {
            revenue: 4990.0,
            ordered_units: 10,
        });
        harness.ledger.insert("CUP-01", cup_economics());

        let card = build_product_card(&ctx, " 555 ").await.unwrap().unwrap();
        assert_eq!(card.info.offer_id, "CUP-01");
        assert_eq!(card.sales.map(|s| s.ordered_units), Some(10));
        assert_eq!(card.cost_per_unit, Some(50.0));
        assert_eq!(card.sales_days, 14);
    }

    #[tokio::test]
    async fn test_product_card_degrades() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        *harness.catalog.product.lock().unwrap() = Some(cup_info());
        harness.ledger.failing.store(true, Ordering::SeqCst);

        let card = build_product_card(&ctx, "CUP-01").await.unwrap().unwrap();
        assert_eq!(card.sales, None);
        assert_eq!(card.cost_per_unit, None);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        assert!(build_product_card(&ctx, "NOPE").await.unwrap().is_none());
    }
}
