//! Ozon-bot: Telegram assistant for an Ozon marketplace shop.
//!
//! Single-binary Tokio application that:
//! 1. Answers operator commands and menu buttons in Telegram
//! 2. Builds order reports priced from the unit-economics sheet
//! 3. Polls Ozon for new unfulfilled postings and announces each once
//! 4. Sends a daily digest at a fixed local hour

mod bot;
mod config;
mod context;
mod journal;
mod notifier;
mod pipeline;
mod plan_store;
mod scheduler;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use serde_json::json;
use teloxide::Bot;
use tracing::{error, info};

use ozon_client::OzonRestClient;
use sheets_client::{ServiceAccountAuth, SheetsClient};

use crate::context::{BotContext, Collaborators};
use crate::journal::{write_event, EventJournal};
use crate::notifier::TelegramNotifier;
use crate::plan_store::PlanStore;
use crate::scheduler::{LocalFrame, PollActivity};

/// Ozon shop assistant bot
#[derive(Parser)]
#[command(name = "ozon-bot", about = "Telegram assistant for an Ozon shop")]
struct Cli {
    /// Query the Ozon API once, print what came back, then exit.
    #[arg(long)]
    check_ozon: bool,

    /// Print the order report for the last N days to stdout and exit.
    #[arg(long, value_name = "N")]
    report_days: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ozon_bot=info,ozon_client=info,sheets_client=info,reports=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("🛒 Ozon Bot starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Schedule: poll every {}s (first after {}s, lookback {}h), digest at {:02}:00 UTC{:+}",
        cfg.schedule.poll_interval_secs,
        cfg.schedule.poll_initial_delay_secs,
        cfg.schedule.poll_lookback_hours,
        cfg.schedule.digest_hour,
        cfg.schedule.utc_offset_hours,
    );
    if cfg.allowed_chat_ids.is_empty() {
        info!("Access: any chat");
    } else {
        info!("Access: {} allowed chat(s)", cfg.allowed_chat_ids.len());
    }

    let frame = LocalFrame::new(cfg.schedule.utc_offset_hours)?;

    let journal = EventJournal::open(&cfg.storage.events_dir).with_context(|| {
        format!(
            "failed to initialize event journal in {}",
            cfg.storage.events_dir
        )
    })?;
    info!("Event journal: {}", journal.current_file().display());
    let journal = journal.shared();

    let ozon = Arc::new(OzonRestClient::new(
        &cfg.ozon.client_id,
        &cfg.ozon.api_key,
        &cfg.ozon.api_base_url,
    )?);

    // ── Check-ozon mode ──────────────────────────────────────────────
    if cli.check_ozon {
        info!("Running Ozon API check...");
        let now = Utc::now();
        let since = now - chrono::Duration::hours(24);
        match ozon
            .list_unfulfilled(&cfg.schedule.unfulfilled_status, since, now)
            .await
        {
            Ok(postings) => {
                info!(
                    "✅ Ozon API reachable: {} posting(s) in {} over the last 24h",
                    postings.len(),
                    cfg.schedule.unfulfilled_status
                );
                return Ok(());
            }
            Err(e) => {
                error!("❌ Ozon API check failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let auth = ServiceAccountAuth::from_file(&cfg.sheets.service_account_file)
        .with_context(|| {
            format!(
                "failed to load service account key from {}",
                cfg.sheets.service_account_file
            )
        })?;
    let sheets = Arc::new(SheetsClient::new(
        auth,
        &cfg.sheets.spreadsheet_id,
        &cfg.sheets.sheet_name,
    )?);

    let plans = PlanStore::open(&cfg.storage.plan_store_path)?;
    info!("Revenue plans: {}", plans.path().display());

    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let collaborators = Collaborators {
        orders: ozon.clone(),
        ledger: sheets,
        catalog: ozon,
        notifier: Arc::new(TelegramNotifier::new(bot.clone())),
    };
    let ctx = Arc::new(BotContext::new(
        cfg.clone(),
        frame,
        collaborators,
        plans.shared(),
        journal.clone(),
    ));

    // ── One-shot report mode ─────────────────────────────────────────
    if let Some(days) = cli.report_days {
        let report = pipeline::build_period_report(&ctx, days, Utc::now()).await?;
        println!("{report}");
        return Ok(());
    }

    write_event(
        &journal,
        "bot_start",
        json!({
            "bot": "ozon-bot",
            "allowed_chats": cfg.allowed_chat_ids.len(),
            "schedule": {
                "poll_interval_secs": cfg.schedule.poll_interval_secs,
                "poll_lookback_hours": cfg.schedule.poll_lookback_hours,
                "utc_offset_hours": cfg.schedule.utc_offset_hours,
                "digest_hour": cfg.schedule.digest_hour
            }
        }),
    )
    .await;

    // Task 1: New-order polling
    let poll_handle = tokio::spawn(PollActivity::new(ctx.clone()).run());

    // Task 2: Daily digest
    let digest_handle = tokio::spawn(scheduler::run_digest_loop(ctx.clone()));

    // Task 3: Telegram dispatcher
    let bot_handle = tokio::spawn(bot::run_dispatcher(bot, ctx.clone()));

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("🚀 Ozon Bot is running. Press Ctrl+C to stop.");

    let shutdown_reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            "ctrl_c"
        }
        r = poll_handle => {
            error!("Poll task exited: {:?}", r);
            "poll_task_exit"
        }
        r = digest_handle => {
            error!("Digest task exited: {:?}", r);
            "digest_task_exit"
        }
        r = bot_handle => {
            error!("Telegram dispatcher exited: {:?}", r);
            "dispatcher_exit"
        }
    };

    write_event(
        &journal,
        "bot_shutdown",
        json!({ "reason": shutdown_reason }),
    )
    .await;

    info!("Ozon Bot stopped ({})", shutdown_reason);
    Ok(())
}
