//! Configuration loader: merges env vars, .env file, and config.toml.

use common::config::BotConfig;
use common::Error;
use std::path::Path;

/// Thirty days.
const MAX_POLL_LOOKBACK_HOURS: i64 = 24 * 30;

fn parse_i64_list(raw: &str, env_name: &str) -> Result<Vec<i64>, Error> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                Error::Config(format!("{env_name} must be a comma-separated list of chat ids"))
            })
        })
        .collect()
}

fn parse_i32(raw: &str, env_name: &str) -> Result<i32, Error> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer")))
}

fn parse_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn non_blank(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn validate_config(config: &BotConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.telegram_bot_token.trim().is_empty() {
        issues.push("TELEGRAM_BOT_TOKEN is required".into());
    }
    if config.ozon.client_id.trim().is_empty() {
        issues.push("OZON_CLIENT_ID is required".into());
    }
    if config.ozon.api_key.trim().is_empty() {
        issues.push("OZON_API_KEY is required".into());
    }
    if !config.ozon.api_base_url.starts_with("http") {
        issues.push("ozon.api_base_url must be an http(s) URL".into());
    }
    if config.sheets.spreadsheet_id.trim().is_empty() {
        issues.push("UNIT_ECONOMICS_SPREADSHEET_ID is required".into());
    }
    if config.sheets.sheet_name.trim().is_empty() {
        issues.push("sheets.sheet_name must not be empty".into());
    }
    if config.sheets.service_account_file.trim().is_empty() {
        issues.push("GOOGLE_SERVICE_ACCOUNT_FILE must not be empty".into());
    }

    let schedule = &config.schedule;
    if schedule.poll_interval_secs == 0 {
        issues.push("schedule.poll_interval_secs must be > 0".into());
    }
    if !(1..=MAX_POLL_LOOKBACK_HOURS).contains(&schedule.poll_lookback_hours) {
        issues.push(format!(
            "schedule.poll_lookback_hours must be in [1, {MAX_POLL_LOOKBACK_HOURS}]"
        ));
    }
    if schedule.unfulfilled_status.trim().is_empty() {
        issues.push("schedule.unfulfilled_status must not be empty".into());
    }
    if !(-12..=14).contains(&schedule.utc_offset_hours) {
        issues.push("schedule.utc_offset_hours must be in [-12, 14]".into());
    }
    if schedule.digest_hour > 23 {
        issues.push("schedule.digest_hour must be in [0, 23]".into());
    }

    let report = &config.report;
    if report.top_list_size == 0 {
        issues.push("report.top_list_size must be > 0".into());
    }
    if report.max_message_chars == 0 || report.max_message_chars > 4096 {
        issues.push("report.max_message_chars must be in [1, 4096]".into());
    }
    if report.period_options.is_empty() || report.period_options.contains(&0) {
        issues.push("report.period_options must be non-empty and all > 0".into());
    }
    if report.analytics_days <= 0 {
        issues.push("report.analytics_days must be > 0".into());
    }

    if config.storage.plan_store_path.trim().is_empty() {
        issues.push("PLAN_STORE_PATH must not be empty".into());
    }
    if config.storage.events_dir.trim().is_empty() {
        issues.push("EVENTS_DIR must not be empty".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load bot configuration from environment and optional config file.
pub fn load_config() -> Result<BotConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = BotConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Some(token) = std::env::var("TELEGRAM_BOT_TOKEN").ok().and_then(non_blank) {
        config.telegram_bot_token = token;
    }
    if let Some(id) = std::env::var("OZON_CLIENT_ID").ok().and_then(non_blank) {
        config.ozon.client_id = id;
    }
    if let Some(key) = std::env::var("OZON_API_KEY").ok().and_then(non_blank) {
        config.ozon.api_key = key;
    }
    if let Some(url) = std::env::var("OZON_API_BASE_URL").ok().and_then(non_blank) {
        config.ozon.api_base_url = url;
    }
    if let Some(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_FILE")
        .ok()
        .and_then(non_blank)
    {
        config.sheets.service_account_file = path;
    }
    if let Some(id) = std::env::var("UNIT_ECONOMICS_SPREADSHEET_ID")
        .ok()
        .and_then(non_blank)
    {
        config.sheets.spreadsheet_id = id;
    }
    if let Some(sheet) = std::env::var("UNIT_ECONOMICS_SHEET").ok().and_then(non_blank) {
        config.sheets.sheet_name = sheet;
    }
    if let Ok(raw) = std::env::var("BOT_ALLOWED_CHAT_IDS") {
        config.allowed_chat_ids = parse_i64_list(&raw, "BOT_ALLOWED_CHAT_IDS")?;
    }
    if let Ok(raw) = std::env::var("BOT_UTC_OFFSET_HOURS") {
        config.schedule.utc_offset_hours = parse_i32(&raw, "BOT_UTC_OFFSET_HOURS")?;
    }
    if let Ok(raw) = std::env::var("BOT_DIGEST_HOUR") {
        config.schedule.digest_hour = parse_u32(&raw, "BOT_DIGEST_HOUR")?;
    }
    if let Some(path) = std::env::var("PLAN_STORE_PATH").ok().and_then(non_blank) {
        config.storage.plan_store_path = path;
    }
    if let Some(dir) = std::env::var("EVENTS_DIR").ok().and_then(non_blank) {
        config.storage.events_dir = dir;
    }

    // 5. Validate.
    validate_config(&config)?;

    Ok(config)
}
