//! Bot configuration types.

use serde::{Deserialize, Serialize};

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token from BotFather.
    #[serde(default)]
    pub telegram_bot_token: String,

    /// Chats allowed to talk to the bot. Empty means any chat.
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,

    /// Ozon Seller API credentials and endpoint.
    #[serde(default)]
    pub ozon: OzonConfig,

    /// Unit-economics spreadsheet location and credentials.
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// Background activity timing.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Report rendering parameters.
    #[serde(default)]
    pub report: ReportConfig,

    /// Local persistence.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Ozon Seller API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OzonConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_ozon_base_url")]
    pub api_base_url: String,
}

/// Google Sheets ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: String,

    /// Worksheet (tab) holding the unit-economics table.
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    /// Path to the Google service-account JSON key.
    #[serde(default = "default_service_account_file")]
    pub service_account_file: String,
}

/// Timing for the poll and digest activities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// New-order poll interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Delay before the first poll.
    #[serde(default = "default_poll_initial_delay")]
    pub poll_initial_delay_secs: u64,

    /// Trailing window for unfulfilled postings.
    #[serde(default = "default_poll_lookback_hours")]
    pub poll_lookback_hours: i64,

    /// Posting status that counts as a new order.
    #[serde(default = "default_unfulfilled_status")]
    pub unfulfilled_status: String,

    /// Fixed offset from UTC for "local" time. Not DST-aware.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,

    /// Local hour at which the daily digest fires.
    #[serde(default = "default_digest_hour")]
    pub digest_hour: u32,
}

/// Report rendering and delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Length of the top-profitable and top-loss lists.
    #[serde(default = "default_top_list_size")]
    pub top_list_size: usize,

    /// Max characters per outbound chat message.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Periods (days) offered on the report keyboard.
    #[serde(default = "default_period_options")]
    pub period_options: Vec<u32>,

    /// Trailing window for per-product sales analytics.
    #[serde(default = "default_analytics_days")]
    pub analytics_days: i64,
}

/// Files written by the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding revenue plans by date.
    #[serde(default = "default_plan_store_path")]
    pub plan_store_path: String,

    /// Directory for the daily JSONL event journal.
    #[serde(default = "default_events_dir")]
    pub events_dir: String,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_ozon_base_url() -> String {
    "https://api-seller.ozon.ru".into()
}
fn default_sheet_name() -> String {
    "Юнит экономика оз".into()
}
fn default_service_account_file() -> String {
    "service_account.json".into()
}

fn default_poll_interval() -> u64 {
    60
}
fn default_poll_initial_delay() -> u64 {
    10
}
fn default_poll_lookback_hours() -> i64 {
    1
}
fn default_unfulfilled_status() -> String {
    "awaiting_packaging".into()
}
fn default_utc_offset_hours() -> i32 {
    3
}
fn default_digest_hour() -> u32 {
    8
}

fn default_top_list_size() -> usize {
    5
}
fn default_max_message_chars() -> usize {
    3500
}
fn default_period_options() -> Vec<u32> {
    vec![1, 3, 7, 30]
}
fn default_analytics_days() -> i64 {
    14
}

fn default_plan_store_path() -> String {
    "revenue-plan.json".into()
}
fn default_events_dir() -> String {
    "events".into()
}

impl Default for OzonConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            api_key: String::new(),
            api_base_url: default_ozon_base_url(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: default_sheet_name(),
            service_account_file: default_service_account_file(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            poll_initial_delay_secs: default_poll_initial_delay(),
            poll_lookback_hours: default_poll_lookback_hours(),
            unfulfilled_status: default_unfulfilled_status(),
            utc_offset_hours: default_utc_offset_hours(),
            digest_hour: default_digest_hour(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_list_size: default_top_list_size(),
            max_message_chars: default_max_message_chars(),
            period_options: default_period_options(),
            analytics_days: default_analytics_days(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            plan_store_path: default_plan_store_path(),
            events_dir: default_events_dir(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            allowed_chat_ids: Vec::new(),
            ozon: OzonConfig::default(),
            sheets: SheetsConfig::default(),
            schedule: ScheduleConfig::default(),
            report: ReportConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
