//! In-memory fakes for the collaborator traits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    BotConfig, Error, LedgerSource, OrderLine, OrderSource, Posting, ProductCatalog, ProductInfo,
    SkuSales, UnitEconomics, UnitEconomicsTable,
};
use teloxide::types::ChatId;

use crate::context::{BotContext, Collaborators};
use crate::journal::EventJournal;
use crate::notifier::Notifier;
use crate::plan_store::PlanStore;
use crate::scheduler::LocalFrame;

pub fn posting(id: &str, lines: &[(&str, &str, u64)]) -> Posting {
    Posting {
        identifier: Some(id.to_string()),
        order_number: Some(format!("{id}-ORD")),
        status: Some("awaiting_packaging".into()),
        lines: lines
            .iter()
            .map(|(code, name, qty)| OrderLine::new(code, name, *qty))
            .collect(),
    }
}

fn outage() -> Error {
    Error::OzonApi {
        status: 503,
        message: "Service Unavailable".into(),
    }
}

#[derive(Default)]
pub struct FakeOrders {
    pub postings: Mutex<Vec<Posting>>,
    pub unfulfilled: Mutex<Vec<Posting>>,
    pub failing: AtomicBool,
    pub posting_windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    pub unfulfilled_calls: AtomicUsize,
}

impl FakeOrders {
    pub fn set_postings(&self, postings: Vec<Posting>) {
        *self.postings.lock().unwrap() = postings;
    }

    pub fn set_unfulfilled(&self, postings: Vec<Posting>) {
        *self.unfulfilled.lock().unwrap() = postings;
    }

    pub fn total_calls(&self) -> usize {
        self.posting_windows.lock().unwrap().len() + self.unfulfilled_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderSource for FakeOrders {
    async fn fetch_postings(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Posting>, Error> {
        self.posting_windows.lock().unwrap().push((since, until));
        if self.failing.load(Ordering::SeqCst) {
            return Err(outage());
        }
        Ok(self.postings.lock().unwrap().clone())
    }

    async fn fetch_unfulfilled(
        &self,
        _status: &str,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<Posting>, Error> {
        self.unfulfilled_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(outage());
        }
        Ok(self.unfulfilled.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeLedger {
    pub table: Mutex<UnitEconomicsTable>,
    pub failing: AtomicBool,
    pub loads: AtomicUsize,
}

impl FakeLedger {
    pub fn insert(&self, code: &str, economics: UnitEconomics) {
        self.table.lock().unwrap().insert_first(code, economics);
    }
}

#[async_trait]
impl LedgerSource for FakeLedger {
    async fn load_ledger(&self) -> Result<UnitEconomicsTable, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::SheetsApi {
                status: 403,
                message: "The caller does not have permission".into(),
            });
        }
        Ok(self.table.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub product: Mutex<Option<ProductInfo>>,
    /// `None` makes the analytics call fail.
    pub sales: Mutex<Option<SkuSales>>,
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn product_info(&self, identifier: &str) -> Result<Option<ProductInfo>, Error> {
        let product = self.product.lock().unwrap().clone();
        Ok(product.filter(|p| {
            p.offer_id == identifier || p.sku.map(|s| s.to_string()).as_deref() == Some(identifier)
        }))
    }

    async fn sku_sales(&self, _sku: u64, _days: i64) -> Result<SkuSales, Error> {
        self.sales
            .lock()
            .unwrap()
            .ok_or_else(|| Error::Http("analytics timed out".into()))
    }
}

/// Records every message; fails on messages containing `fail_marker`.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(ChatId, String)>>,
    pub fail_marker: Option<String>,
}

impl RecordingNotifier {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_marker: Some(marker.to_string()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn targets(&self) -> Vec<ChatId> {
        self.sent.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_html(&self, target: ChatId, text: &str) -> Result<(), Error> {
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(Error::Telegram("Bad Request: chat not found".into()));
            }
        }
        self.sent.lock().unwrap().push((target, text.to_string()));
        Ok(())
    }
}

/// Fakes plus a scratch directory for the journal and plan store.
pub struct TestHarness {
    pub orders: Arc<FakeOrders>,
    pub ledger: Arc<FakeLedger>,
    pub catalog: Arc<FakeCatalog>,
    pub notifier: Arc<RecordingNotifier>,
    pub dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self {
            orders: Arc::new(FakeOrders::default()),
            ledger: Arc::new(FakeLedger::default()),
            catalog: Arc::new(FakeCatalog::default()),
            notifier: Arc::new(notifier),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn context(&self) -> Arc<BotContext> {
        self.context_with_config(BotConfig::default())
    }

    pub fn context_with_config(&self, config: BotConfig) -> Arc<BotContext> {
        let frame = LocalFrame::new(config.schedule.utc_offset_hours).unwrap();
        let journal = EventJournal::open(self.dir.path().join("events")).unwrap();
        let plans = PlanStore::open(self.dir.path().join("plans.json")).unwrap();
        let collaborators = Collaborators {
            orders: self.orders.clone(),
            ledger: self.ledger.clone(),
            catalog: self.catalog.clone(),
            notifier: self.notifier.clone(),
        };
        Arc::new(BotContext::new(
            config,
            frame,
            collaborators,
            plans.shared(),
            journal.shared(),
        ))
    }
}
