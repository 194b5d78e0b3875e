//! Telegram front end: commands, menu buttons and free-text handling.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use reports::{escape_html, format_product_card};
use serde_json::json;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use crate::context::{BotContext, ChatMode};
use crate::journal::write_event;
use crate::notifier::deliver_chunked;
use crate::{pipeline, scheduler};

type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), HandlerError>;

const CALLBACK_ANALYTICS: &str = "ozon:analytics";
const CALLBACK_ORDERS_MENU: &str = "ozon:orders";
const CALLBACK_PERIOD_PREFIX: &str = "ozon:orders:";

const MENU_TEXT: &str = "Я бот-агент для маркетплейсов.\n\n\
    Сейчас могу:\n\
    • Показать аналитику по отдельным товарам Ozon\n\
    • Сделать отчёт по заказам Ozon за период (по артикулам)\n\n\
    Выбери действие:";

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Команды бота:")]
pub enum Command {
    #[command(description = "начать работу и получать уведомления о заказах")]
    Start,
    #[command(description = "главное меню")]
    Menu,
    #[command(description = "план выручки: /plan [ГГГГ-ММ-ДД] сумма")]
    Plan(String),
    #[command(description = "сводка за вчера прямо сейчас")]
    Digest,
    #[command(description = "список команд")]
    Help,
}

/// Inline button presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    ProductAnalytics,
    OrdersMenu,
    Period(u32),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            CALLBACK_ANALYTICS => Some(Self::ProductAnalytics),
            CALLBACK_ORDERS_MENU => Some(Self::OrdersMenu),
            other => other
                .strip_prefix(CALLBACK_PERIOD_PREFIX)
                .and_then(|days| days.parse::<u32>().ok())
                .filter(|days| *days > 0)
                .map(Self::Period),
        }
    }
}

/// What `/plan` was asked to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanRequest {
    Show(NaiveDate),
    Set(NaiveDate, f64),
}

/// Parse `/plan` arguments: nothing, `<amount>`, `<date>`, or `<date> <amount>`.
pub fn parse_plan_args(args: &str, today: NaiveDate) -> Result<PlanRequest, String> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let Some((first, rest)) = parts.split_first() else {
        return Ok(PlanRequest::Show(today));
    };

    match NaiveDate::parse_from_str(first, "%Y-%m-%d") {
        Ok(date) if rest.is_empty() => Ok(PlanRequest::Show(date)),
        Ok(date) => parse_amount(&rest.concat()).map(|amount| PlanRequest::Set(date, amount)),
        Err(_) => parse_amount(&parts.concat()).map(|amount| PlanRequest::Set(today, amount)),
    }
}

fn parse_amount(raw: &str) -> Result<f64, String> {
    let cleaned: String = raw
        .trim_end_matches('₽')
        .trim_end_matches("р.")
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(format!("Не понял сумму «{}»", raw.trim())),
    }
}

/// Russian noun form for a day count: 1 день, 3 дня, 7 дней.
fn days_word(n: u32) -> &'static str {
    match (n % 10, n % 100) {
        (1, r) if r != 11 => "день",
        (2..=4, r) if !(12..=14).contains(&r) => "дня",
        _ => "дней",
    }
}

pub fn is_menu_text(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "меню" | "menu" | "главное меню"
    )
}

pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "📊 Аналитика Ozon",
            CALLBACK_ANALYTICS,
        )],
        vec![InlineKeyboardButton::callback(
            "📈 Отчёт по заказам Ozon",
            CALLBACK_ORDERS_MENU,
        )],
    ])
}

pub fn period_keyboard(options: &[u32]) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = options
        .iter()
        .map(|days| {
            InlineKeyboardButton::callback(
                format!("{days} {}", days_word(*days)),
                format!("{CALLBACK_PERIOD_PREFIX}{days}"),
            )
        })
        .collect();
    InlineKeyboardMarkup::new(buttons.chunks(2).map(|row| row.to_vec()))
}

async fn send_html(bot: &Bot, chat: ChatId, text: impl Into<String>) -> HandlerResult {
    bot.send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn show_menu(bot: &Bot, chat: ChatId, text: &str) -> HandlerResult {
    bot.send_message(chat, text)
        .reply_markup(main_menu_keyboard())
        .await?;
    Ok(())
}

async fn refuse(bot: &Bot, chat: ChatId) -> HandlerResult {
    info!("Rejected update from unauthorized chat {}", chat.0);
    bot.send_message(chat, "⛔ У этого чата нет доступа к боту.")
        .await?;
    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<BotContext>,
) -> HandlerResult {
    let chat = msg.chat.id;
    if !ctx.is_authorized(chat) {
        return refuse(&bot, chat).await;
    }

    match cmd {
        Command::Start => {
            ctx.set_target(chat).await;
            ctx.set_mode(chat, ChatMode::Menu).await;
            write_event(&ctx.journal, "target_set", json!({"chat_id": chat.0})).await;

            let name = msg
                .from
                .as_ref()
                .map(|u| u.first_name.clone())
                .unwrap_or_default();
            let greeting = if name.is_empty() {
                format!("Привет!\n\n{MENU_TEXT}")
            } else {
                format!("Привет, {name}!\n\n{MENU_TEXT}")
            };
            show_menu(&bot, chat, &greeting).await?;
        }
        Command::Menu => {
            ctx.set_mode(chat, ChatMode::Menu).await;
            show_menu(&bot, chat, MENU_TEXT).await?;
        }
        Command::Help => {
            bot.send_message(chat, Command::descriptions().to_string())
                .await?;
        }
        Command::Plan(args) => handle_plan(&bot, &ctx, chat, &args).await?,
        Command::Digest => {
            if ctx.digest_guard.is_running() {
                bot.send_message(chat, "Сводка уже собирается, подожди немного.")
                    .await?;
                return Ok(());
            }
            bot.send_message(chat, "⏳ Собираю сводку за вчера…").await?;
            scheduler::run_digest(&ctx, chat, Utc::now()).await;
        }
    }
    Ok(())
}

async fn handle_plan(bot: &Bot, ctx: &BotContext, chat: ChatId, args: &str) -> HandlerResult {
    let today = ctx.frame.today(Utc::now());
    let request = match parse_plan_args(args, today) {
        Ok(r) => r,
        Err(reason) => {
            let text = format!(
                "{}.\nФормат: <code>/plan 150000</code> или <code>/plan 2026-10-20 150000</code>",
                escape_html(&reason)
            );
            return send_html(bot, chat, text).await;
        }
    };

    match request {
        PlanRequest::Show(date) => {
            let plan = ctx.plans.lock().await.get(date);
            let text = match plan {
                Some(amount) => format!("🎯 План на {}: {:.2} ₽", date.format("%d.%m.%Y"), amount),
                None => format!("План на {} не задан.", date.format("%d.%m.%Y")),
            };
            bot.send_message(chat, text).await?;
        }
        PlanRequest::Set(date, amount) => {
            let stored = ctx.plans.lock().await.set(date, amount);
            match stored {
                Ok(()) => {
                    write_event(
                        &ctx.journal,
                        "plan_set",
                        json!({
                            "date": date.to_string(),
                            "amount": amount
                        }),
                    )
                    .await;
                    bot.send_message(
                        chat,
                        format!(
                            "✅ План на {} сохранён: {:.2} ₽",
                            date.format("%d.%m.%Y"),
                            amount
                        ),
                    )
                    .await?;
                }
                Err(e) => {
                    warn!("Saving plan failed: {}", e);
                    bot.send_message(chat, "⚠️ Не удалось сохранить план.")
                        .await?;
                }
            }
        }
    }
    Ok(())
}

async fn handle_text(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat = msg.chat.id;
    if !ctx.is_authorized(chat) {
        return refuse(&bot, chat).await;
    }

    let text = text.trim();
    if is_menu_text(text) {
        ctx.set_mode(chat, ChatMode::Menu).await;
        return show_menu(&bot, chat, MENU_TEXT).await;
    }

    match ctx.mode(chat).await {
        ChatMode::ProductLookup => {
            let reply = match pipeline::build_product_card(&ctx, text).await {
                Ok(Some(card)) => format_product_card(&card),
                Ok(None) => format!(
                    "Товар <code>{}</code> не найден в кабинете Ozon.",
                    escape_html(text)
                ),
                Err(e) => {
                    warn!("Product lookup for {} failed: {}", text, e);
                    format!(
                        "⚠️ Ошибка запроса к Ozon: {}",
                        escape_html(&e.short_message())
                    )
                }
            };
            send_html(&bot, chat, reply).await?;
            send_html(
                &bot,
                chat,
                "Можешь ввести следующий артикул Ozon.\n\
                 Или напиши <code>меню</code> или /menu для возврата в главное меню.",
            )
            .await?;
        }
        ChatMode::Menu => {
            bot.send_message(
                chat,
                "Пока я понимаю только команды через меню.\n\
                 Нажми /start или /menu и выбери действие.",
            )
            .await?;
        }
    }
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, ctx: Arc<BotContext>) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(chat) = q.message.as_ref().map(|m| m.chat().id) else {
        return Ok(());
    };
    if !ctx.is_authorized(chat) {
        return refuse(&bot, chat).await;
    }

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        debug!("Ignoring unknown callback data {:?}", q.data);
        return Ok(());
    };

    match action {
        CallbackAction::ProductAnalytics => {
            ctx.set_mode(chat, ChatMode::ProductLookup).await;
            send_html(
                &bot,
                chat,
                "Режим: Ozon.\n\
                 Введи артикул <b>Ozon</b> (offer_id или SKU).\n\
                 Чтобы вернуться в меню — напиши <code>меню</code> или команду /menu.",
            )
            .await?;
        }
        CallbackAction::OrdersMenu => {
            bot.send_message(chat, "Выбери период для отчёта по заказам Ozon:")
                .reply_markup(period_keyboard(&ctx.config.report.period_options))
                .await?;
        }
        CallbackAction::Period(days) => {
            if !ctx.config.report.period_options.contains(&days) {
                debug!("Ignoring period {} outside the configured options", days);
                return Ok(());
            }
            send_period_report(&bot, &ctx, chat, days).await?;
        }
    }
    Ok(())
}

async fn send_period_report(
    bot: &Bot,
    ctx: &BotContext,
    chat: ChatId,
    days: u32,
) -> HandlerResult {
    bot.send_message(
        chat,
        format!("⏳ Формирую отчёт {}…", pipeline::period_label(days)),
    )
    .await?;

    match pipeline::build_period_report(ctx, days, Utc::now()).await {
        Ok(report) => {
            let messages = deliver_chunked(
                ctx.notifier.as_ref(),
                chat,
                &report,
                ctx.config.report.max_message_chars,
            )
            .await;
            write_event(
                &ctx.journal,
                "report_sent",
                json!({
                    "chat_id": chat.0,
                    "days": days,
                    "messages": messages
                }),
            )
            .await;
        }
        Err(e) => {
            warn!("Period report for {} days failed: {}", days, e);
            send_html(
                bot,
                chat,
                format!(
                    "⚠️ Ошибка при получении заказов: {}",
                    escape_html(&e.short_message())
                ),
            )
            .await?;
        }
    }
    Ok(())
}

pub fn schema() -> UpdateHandler<HandlerError> {
    let commands = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let messages = Update::filter_message()
        .branch(commands)
        .branch(dptree::endpoint(handle_text));

    let callbacks = Update::filter_callback_query().endpoint(handle_callback);

    dptree::entry().branch(messages).branch(callbacks)
}

/// Long-poll Telegram until the process stops.
pub async fn run_dispatcher(bot: Bot, ctx: Arc<BotContext>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register bot commands: {}", e);
    }

    info!("Telegram dispatcher starting long polling");
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![ctx])
        .default_handler(|update| async move {
            debug!("Unhandled update {:?}", update.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in Telegram handler",
        ))
        .build()
        .dispatch()
        .await;
}
