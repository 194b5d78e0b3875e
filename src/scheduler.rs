//! Background activities: new-order polling and the daily digest.
//!
//! Both run as independent Tokio tasks. Wall-clock anchoring uses a fixed
//! UTC offset with no daylight-saving rules.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use common::Error;
use reports::{escape_html, filter_new, format_posting_notification, SeenPostings};
use serde_json::json;
use teloxide::types::ChatId;
use tokio::time::{interval, interval_at, sleep, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::context::BotContext;
use crate::journal::write_event;
use crate::notifier::deliver_chunked;
use crate::pipeline;

/// Fixed-offset local time frame, e.g. UTC+3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFrame {
    offset: FixedOffset,
}

impl LocalFrame {
    pub fn new(utc_offset_hours: i32) -> Result<Self, Error> {
        utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| Error::Config(format!("UTC offset {utc_offset_hours}h is out of range")))
    }

    /// Local calendar date at `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// `[00:00, 24:00)` of a local date, as UTC instants.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let shift = chrono::Duration::seconds(i64::from(self.offset.local_minus_utc()));
        let start = Utc.from_utc_datetime(&(date.and_time(NaiveTime::MIN) - shift));
        (start, start + chrono::Duration::days(1))
    }
}

/// Time from `now` until the next `hour:00` in `frame`.
///
/// When the local clock is already at or past today's target, the answer
/// points at tomorrow.
pub fn duration_until_next_digest(
    now: DateTime<Utc>,
    frame: &LocalFrame,
    hour: u32,
) -> Result<Duration, Error> {
    let at = NaiveTime::from_hms_opt(hour, 0, 0)
        .ok_or_else(|| Error::Config(format!("digest hour {hour} is not a valid hour")))?;

    let local_now = now.with_timezone(&frame.offset).naive_local();
    let mut target = local_now.date().and_time(at);
    if local_now >= target {
        target = target + chrono::Duration::days(1);
    }

    (target - local_now)
        .to_std()
        .map_err(|e| Error::Other(format!("negative digest delay: {e}")))
}

/// Spacing between digests once the first one has fired.
pub const DIGEST_PERIOD: Duration = Duration::from_secs(24 * 3600);

/// Ticker that fires after `first`, then every [`DIGEST_PERIOD`]. Ticks run
/// on the monotonic clock, so a wall-clock step between digests cannot
/// produce an extra one; late ticks are skipped, never bursted.
pub fn digest_ticker(first: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + first, DIGEST_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Skip-if-running flag for one activity.
#[derive(Debug, Clone, Default)]
pub struct ActivityGuard {
    running: Arc<AtomicBool>,
}

/// Held while an activity runs; releases the guard on drop.
#[derive(Debug)]
pub struct ActivityPermit {
    running: Arc<AtomicBool>,
}

impl ActivityGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a previous run is still in progress.
    pub fn try_enter(&self) -> Option<ActivityPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActivityPermit {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for ActivityPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nobody to notify; nothing was fetched.
    NoTarget,
    /// A previous digest run was still in progress.
    Skipped,
    /// Upstream failure, reported to the target.
    Failed,
    /// Number of messages delivered.
    Completed(usize),
}

async fn report_failure(ctx: &BotContext, target: ChatId, what: &str, err: &Error) {
    let text = format!("⚠️ {what}: {}", escape_html(&err.short_message()));
    if let Err(e) = ctx.notifier.send_html(target, &text).await {
        warn!("Could not report failure to chat {}: {}", target.0, e);
    }
}

// ── New-order polling ────────────────────────────────────────────────

/// Owns the seen-posting set. `run_once` takes `&mut self`, so cycles of
/// one activity never overlap.
pub struct PollActivity {
    ctx: Arc<BotContext>,
    seen: SeenPostings,
    cycle_id: u64,
}

impl PollActivity {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self {
            ctx,
            seen: SeenPostings::new(),
            cycle_id: 0,
        }
    }

    /// One poll: fetch unfulfilled postings, push each one not seen before.
    pub async fn run_once(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        let Some(target) = self.ctx.target().await else {
            debug!("No notification target yet, skipping order poll");
            return CycleOutcome::NoTarget;
        };

        self.cycle_id = self.cycle_id.saturating_add(1);
        let schedule = &self.ctx.config.schedule;
        let lookback = pipeline::window_start(
            now,
            chrono::Duration::try_hours(schedule.poll_lookback_hours),
            "poll lookback",
        );
        let fetched = match lookback {
            Ok(since) => {
                self.ctx
                    .orders
                    .fetch_unfulfilled(&schedule.unfulfilled_status, since, now)
                    .await
            }
            Err(e) => Err(e),
        };

        let postings = match fetched {
            Ok(p) => p,
            Err(e) => {
                error!("Order poll failed: {}", e);
                report_failure(&self.ctx, target, "Не удалось проверить новые заказы Ozon", &e)
                    .await;
                write_event(
                    &self.ctx.journal,
                    "poll_failed",
                    json!({
                        "cycle_id": self.cycle_id,
                        "error": e.to_string()
                    }),
                )
                .await;
                return CycleOutcome::Failed;
            }
        };

        let fetched = postings.len();
        let fresh = filter_new(postings, &mut self.seen);
        let max_chars = self.ctx.config.report.max_message_chars;

        let mut delivered = 0usize;
        for posting in &fresh {
            let text = format_posting_notification(posting);
            let sent = deliver_chunked(self.ctx.notifier.as_ref(), target, &text, max_chars).await;
            delivered += sent;
            info!(
                "New posting {} announced ({} message(s))",
                posting.id().unwrap_or("-"),
                sent
            );
            write_event(
                &self.ctx.journal,
                "order_notified",
                json!({
                    "cycle_id": self.cycle_id,
                    "posting": posting.id(),
                    "lines": posting.lines.len(),
                    "delivered": sent > 0
                }),
            )
            .await;
        }

        debug!(
            "Poll cycle {}: fetched={} new={} seen_total={}",
            self.cycle_id,
            fetched,
            fresh.len(),
            self.seen.len()
        );
        write_event(
            &self.ctx.journal,
            "poll_cycle",
            json!({
                "cycle_id": self.cycle_id,
                "fetched": fetched,
                "new": fresh.len(),
                "seen_total": self.seen.len()
            }),
        )
        .await;

        CycleOutcome::Completed(delivered)
    }

    /// Poll forever: first run after the initial delay, then every interval.
    pub async fn run(mut self) {
        let initial = Duration::from_secs(self.ctx.config.schedule.poll_initial_delay_secs);
        let period = Duration::from_secs(self.ctx.config.schedule.poll_interval_secs);
        info!(
            "Order poll starts in {}s, every {}s",
            initial.as_secs(),
            period.as_secs()
        );
        sleep(initial).await;

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.run_once(Utc::now()).await;
        }
    }
}

// ── Daily digest ─────────────────────────────────────────────────────

/// Build and send the digest for the previous local day to `target`.
pub async fn run_digest(ctx: &BotContext, target: ChatId, now: DateTime<Utc>) -> CycleOutcome {
    let Some(_permit) = ctx.digest_guard.try_enter() else {
        warn!("Digest already running, skipping");
        return CycleOutcome::Skipped;
    };

    match pipeline::build_digest(ctx, now).await {
        Ok(digest) => {
            let delivered = deliver_chunked(
                ctx.notifier.as_ref(),
                target,
                &digest.text,
                ctx.config.report.max_message_chars,
            )
            .await;
            info!("Digest for {} sent ({} message(s))", digest.date, delivered);
            write_event(
                &ctx.journal,
                "digest_sent",
                json!({
                    "date": digest.date.to_string(),
                    "revenue": digest.revenue,
                    "plan": digest.plan,
                    "messages": delivered
                }),
            )
            .await;
            CycleOutcome::Completed(delivered)
        }
        Err(e) => {
            error!("Digest failed: {}", e);
            report_failure(ctx, target, "Не удалось собрать ежедневную сводку", &e).await;
            write_event(
                &ctx.journal,
                "digest_failed",
                json!({
                    "error": e.to_string()
                }),
            )
            .await;
            CycleOutcome::Failed
        }
    }
}

/// Timer-driven digest: a no-op until some chat has sent /start.
pub async fn run_scheduled_digest(ctx: &BotContext, now: DateTime<Utc>) -> CycleOutcome {
    match ctx.target().await {
        Some(target) => run_digest(ctx, target, now).await,
        None => {
            debug!("No notification target yet, skipping digest");
            CycleOutcome::NoTarget
        }
    }
}

/// First digest at the next digest hour, then one every 24 h.
pub async fn run_digest_loop(ctx: Arc<BotContext>) {
    let hour = ctx.config.schedule.digest_hour;
    let first = match duration_until_next_digest(Utc::now(), &ctx.frame, hour) {
        Ok(d) => d,
        Err(e) => {
            error!("Digest schedule is broken, stopping: {}", e);
            return;
        }
    };
    info!(
        "First digest in {}h{:02}m, then every 24h",
        first.as_secs() / 3600,
        (first.as_secs() % 3600) / 60
    );

    let mut ticker = digest_ticker(first);
    loop {
        ticker.tick().await;
        run_scheduled_digest(&ctx, Utc::now()).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use common::{BotConfig, UnitEconomics};

    use super::*;
    use crate::testing::{posting, RecordingNotifier, TestHarness};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn moscow() -> LocalFrame {
        LocalFrame::new(3).unwrap()
    }

    #[test]
    fn test_digest_one_second_before_target() {
        // 04:59:59 UTC = 07:59:59 local.
        let wait = duration_until_next_digest(utc(2026, 10, 16, 4, 59, 59), &moscow(), 8).unwrap();
        assert_eq!(wait, Duration::from_secs(1));
    }

    #[test]
    fn test_digest_exactly_at_target_goes_to_tomorrow() {
        let wait = duration_until_next_digest(utc(2026, 10, 16, 5, 0, 0), &moscow(), 8).unwrap();
        assert_eq!(wait, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_digest_just_after_target() {
        let wait = duration_until_next_digest(utc(2026, 10, 16, 5, 0, 1), &moscow(), 8).unwrap();
        assert_eq!(wait, Duration::from_secs(24 * 3600 - 1));
    }

    #[test]
    fn test_digest_across_local_midnight() {
        // 21:30 UTC = 00:30 local on the next day.
        let wait = duration_until_next_digest(utc(2026, 10, 15, 21, 30, 0), &moscow(), 8).unwrap();
        assert_eq!(wait, Duration::from_secs(7 * 3600 + 30 * 60));
    }

    #[test]
    fn test_invalid_hour_and_offset() {
        assert!(duration_until_next_digest(Utc::now(), &moscow(), 24).is_err());
        assert!(LocalFrame::new(30).is_err());
    }

    #[test]
    fn test_day_bounds_in_utc() {
        let frame = moscow();
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let (start, end) = frame.day_bounds(date);
        assert_eq!(start, utc(2026, 10, 14, 21, 0, 0));
        assert_eq!(end, utc(2026, 10, 15, 21, 0, 0));
        assert_eq!(frame.today(utc(2026, 10, 15, 21, 0, 0)), date.succ_opt().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_digest_ticker_fires_daily_after_first_delay() {
        // 5 ms before 08:00 local.
        let now = utc(2026, 10, 16, 4, 59, 59) + chrono::Duration::milliseconds(995);
        let first = duration_until_next_digest(now, &moscow(), 8).unwrap();
        assert_eq!(first, Duration::from_millis(5));

        let start = Instant::now();
        let mut ticker = digest_ticker(first);
        let t1 = ticker.tick().await;
        let t2 = ticker.tick().await;
        let t3 = ticker.tick().await;
        assert_eq!(t1 - start, first);
        assert_eq!(t2 - t1, DIGEST_PERIOD);
        assert_eq!(t3 - t2, DIGEST_PERIOD);
    }

    #[test]
    fn test_guard_skips_while_running() {
        let guard = ActivityGuard::new();
        let permit = guard.try_enter().expect("first entry");
        assert!(guard.is_running());
        assert!(guard.try_enter().is_none());
        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_enter().is_some());
    }

    #[tokio::test]
    async fn test_poll_without_target_fetches_nothing() {
        let harness = TestHarness::new();
        harness
            .orders
            .set_unfulfilled(vec![posting("P1", &[("CUP-01", "Кружка", 1)])]);
        let mut poll = PollActivity::new(harness.context());

        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::NoTarget);
        assert_eq!(harness.orders.total_calls(), 0);
        assert!(harness.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_poll_notifies_each_posting_once() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        ctx.set_target(ChatId(99)).await;
        harness.orders.set_unfulfilled(vec![
            posting("P1", &[("CUP-01", "Кружка", 1)]),
            posting("P2", &[("PLATE-02", "Тарелка", 2)]),
        ]);
        let mut poll = PollActivity::new(ctx);

        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::Completed(2));

        harness.orders.set_unfulfilled(vec![
            posting("P2", &[("PLATE-02", "Тарелка", 2)]),
            posting("P3", &[("CUP-01", "Кружка", 4)]),
        ]);
        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::Completed(1));

        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("P1"));
        assert!(messages[1].contains("P2"));
        assert!(messages[2].contains("P3"));
        assert!(harness.notifier.targets().iter().all(|t| *t == ChatId(99)));
    }

    #[tokio::test]
    async fn test_poll_failure_reported_to_target() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        ctx.set_target(ChatId(5)).await;
        harness.orders.failing.store(true, Ordering::SeqCst);
        let mut poll = PollActivity::new(ctx);

        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::Failed);
        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Ozon API answered with status 503"));

        // Next cycle recovers without restart.
        harness.orders.failing.store(false, Ordering::SeqCst);
        harness
            .orders
            .set_unfulfilled(vec![posting("P9", &[("CUP-01", "Кружка", 1)])]);
        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::Completed(1));
    }

    #[tokio::test]
    async fn test_poll_runs_while_digest_in_progress() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        ctx.set_target(ChatId(8)).await;
        harness
            .orders
            .set_unfulfilled(vec![posting("P1", &[("CUP-01", "Кружка", 1)])]);
        let _digest = ctx.digest_guard.try_enter().unwrap();
        let mut poll = PollActivity::new(ctx);

        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::Completed(1));
        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::Completed(0));
        assert_eq!(harness.orders.unfulfilled_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unrepresentable_lookback_reported_without_fetch() {
        let harness = TestHarness::new();
        let mut config = BotConfig::default();
        config.schedule.poll_lookback_hours = i64::MAX;
        let ctx = harness.context_with_config(config);
        ctx.set_target(ChatId(4)).await;
        let mut poll = PollActivity::new(ctx);

        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::Failed);
        assert_eq!(harness.orders.total_calls(), 0);
        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("poll lookback is out of range"));
    }

    #[tokio::test]
    async fn test_failed_notification_does_not_block_others() {
        let harness = TestHarness::with_notifier(RecordingNotifier::failing_on("BROKEN"));
        let ctx = harness.context();
        ctx.set_target(ChatId(5)).await;
        harness.orders.set_unfulfilled(vec![
            posting("BROKEN-1", &[("CUP-01", "Кружка", 1)]),
            posting("OK-2", &[("CUP-01", "Кружка", 1)]),
        ]);
        let mut poll = PollActivity::new(ctx);

        assert_eq!(poll.run_once(Utc::now()).await, CycleOutcome::Completed(1));
        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("OK-2"));
    }

    #[tokio::test]
    async fn test_scheduled_digest_without_target_is_noop() {
        let harness = TestHarness::new();
        let ctx = harness.context();

        assert_eq!(
            run_scheduled_digest(&ctx, Utc::now()).await,
            CycleOutcome::NoTarget
        );
        assert_eq!(harness.orders.total_calls(), 0);
        assert_eq!(harness.ledger.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_digest_covers_previous_local_day() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        ctx.set_target(ChatId(7)).await;
        harness
            .orders
            .set_postings(vec![posting("P1", &[("CUP-01", "Кружка", 3)])]);
        harness.ledger.insert(
            "CUP-01",
            UnitEconomics {
                cost_per_unit: 50.0,
                sell_price_per_unit: 100.0,
                commission_per_unit: 10.0,
                logistics_per_unit: 5.0,
                storage_per_unit: 2.0,
                extra_cost_per_unit: 1.0,
            },
        );
        let yesterday = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        ctx.plans.lock().await.set(yesterday, 600.0).unwrap();

        // 05:00 UTC on the 16th = 08:00 local.
        let outcome = run_scheduled_digest(&ctx, utc(2026, 10, 16, 5, 0, 0)).await;
        assert_eq!(outcome, CycleOutcome::Completed(1));

        let windows = harness.orders.posting_windows.lock().unwrap().clone();
        assert_eq!(
            windows,
            vec![(utc(2026, 10, 14, 21, 0, 0), utc(2026, 10, 15, 21, 0, 0))]
        );

        let text = harness.notifier.messages().join("\n\n");
        assert!(text.starts_with("🎯 План на 15.10.2026"));
        assert!(text.contains("(50.0% плана)"));
        assert!(text.contains("EBITDA: 96.00 ₽"));
    }

    #[tokio::test]
    async fn test_digest_skipped_while_running() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        let _permit = ctx.digest_guard.try_enter().unwrap();

        assert_eq!(
            run_digest(&ctx, ChatId(1), Utc::now()).await,
            CycleOutcome::Skipped
        );
        assert_eq!(harness.orders.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_digest_failure_reported() {
        let harness = TestHarness::new();
        let ctx = harness.context();
        harness
            .orders
            .set_postings(vec![posting("P1", &[("CUP-01", "Кружка", 1)])]);
        harness.ledger.failing.store(true, Ordering::SeqCst);

        assert_eq!(
            run_digest(&ctx, ChatId(3), Utc::now()).await,
            CycleOutcome::Failed
        );
        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("unit-economics sheet answered with status 403"));
    }
}
