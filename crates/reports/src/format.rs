//! Telegram-HTML rendering of reports, notifications and product cards.
//!
//! Every function returns paragraphs joined by [`PARAGRAPH_BREAK`] so the
//! result can go straight through [`crate::chunk_for_delivery`].

use chrono::NaiveDate;
use common::{Posting, ProductInfo, SkuSales};
use serde::Serialize;

use crate::chunk::PARAGRAPH_BREAK;
use crate::summary::{ProductFinancials, ProductReportRow, ReportSummary};

/// Marker shown for products the ledger does not know.
pub const NO_FINANCIAL_DATA: &str = "⚠️ нет данных в юнит-экономике";

/// Escape the characters Telegram HTML treats as markup.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn money(value: f64) -> String {
    format!("{value:.2} ₽")
}

/// Full financial report for one window.
///
/// `window` is a human label such as `"за 7 дн."`; it is escaped here.
pub fn format_report(summary: &ReportSummary, window: &str, top_n: usize) -> String {
    let window = escape_html(window);

    if summary.is_empty() {
        return format!("📭 Заказов Ozon {window} не найдено.");
    }

    let mut paragraphs = Vec::with_capacity(summary.rows.len() + 5);
    paragraphs.push(format!(
        "📊 <b>Отчёт по заказам Ozon {window}</b>\nТоваров: {}, единиц: {}",
        summary.rows.len(),
        summary.total_units()
    ));

    for row in &summary.rows {
        paragraphs.push(product_paragraph(row));
    }

    let t = &summary.totals;
    paragraphs.push(format!(
        "<b>Итого</b>\n\
         Выручка: {}\n\
         Себестоимость: {}\n\
         Комиссия: {}\n\
         Логистика: {}\n\
         Хранение: {}\n\
         Доп. расходы: {}\n\
         <b>EBITDA: {}</b>",
        money(t.revenue),
        money(t.cost),
        money(t.commission),
        money(t.logistics),
        money(t.storage),
        money(t.extra),
        money(t.ebitda),
    ));

    let mut counts = format!(
        "✅ Прибыльных позиций: {}\n🔻 Убыточных позиций: {}",
        summary.profitable_count(),
        summary.loss_count()
    );
    let unresolved = summary.unresolved_count();
    if unresolved > 0 {
        counts.push_str(&format!("\n❔ Без данных: {unresolved}"));
    }
    paragraphs.push(counts);

    paragraphs.push(top_list(
        &format!("🏆 Топ-{top_n} прибыльных"),
        &summary.top_profitable(top_n),
    ));
    paragraphs.push(top_list(
        &format!("📉 Топ-{top_n} убыточных"),
        &summary.top_loss_making(top_n),
    ));

    paragraphs.join(PARAGRAPH_BREAK)
}

fn product_paragraph(row: &ProductReportRow) -> String {
    let product = &row.product;
    let mut text = format!(
        "<b>{}</b> · {}\nКол-во: {} шт",
        escape_html(&product.product_code),
        escape_html(product.display_name()),
        product.total_quantity
    );

    match &row.financials {
        Some(f) => {
            text.push_str(&format!(
                "\nВыручка: {}\n\
                 Себестоимость: {}\n\
                 Комиссия: {}\n\
                 Логистика: {}\n\
                 Хранение: {}\n\
                 Доп. расходы: {}\n\
                 EBITDA/шт: {}\n\
                 EBITDA: {}",
                money(f.revenue),
                money(f.cost_total),
                money(f.commission_total),
                money(f.logistics_total),
                money(f.storage_total),
                money(f.extra_total),
                money(f.ebitda_per_unit),
                money(f.ebitda_total),
            ));
        }
        None => {
            text.push('\n');
            text.push_str(NO_FINANCIAL_DATA);
        }
    }
    text
}

fn top_list(title: &str, rows: &[(&ProductReportRow, ProductFinancials)]) -> String {
    let mut text = format!("<b>{title}</b>");
    if rows.is_empty() {
        text.push_str("\nнет");
        return text;
    }
    for (i, (row, f)) in rows.iter().enumerate() {
        text.push_str(&format!(
            "\n{}. {} · {}: {}",
            i + 1,
            escape_html(&row.product.product_code),
            escape_html(row.product.display_name()),
            money(f.ebitda_total)
        ));
    }
    text
}

/// Push message for one newly seen posting.
pub fn format_posting_notification(posting: &Posting) -> String {
    let mut text = format!(
        "🆕 <b>Новый заказ Ozon</b>\nОтправление: {}",
        escape_html(posting.id().unwrap_or("—"))
    );
    if let Some(order) = posting.order_number.as_deref() {
        text.push_str(&format!("\nЗаказ: {}", escape_html(order)));
    }
    if let Some(status) = posting.status.as_deref() {
        text.push_str(&format!("\nСтатус: {}", escape_html(status)));
    }

    let items: Vec<String> = posting
        .lines
        .iter()
        .filter_map(|line| {
            let code = line.code()?;
            Some(format!(
                "• {} · {} × {}",
                escape_html(code),
                escape_html(line.name().unwrap_or(code)),
                line.quantity
            ))
        })
        .collect();

    if !items.is_empty() {
        text.push_str(PARAGRAPH_BREAK);
        text.push_str(&items.join("\n"));
    }
    text
}

/// Plan-vs-fact line for one local date. `None` when no plan is set.
pub fn format_plan_line(date: NaiveDate, plan: Option<f64>, fact: f64) -> Option<String> {
    let plan = plan?;
    let mut text = format!(
        "🎯 План на {}: {}\nФакт: {}",
        date.format("%d.%m.%Y"),
        money(plan),
        money(fact)
    );
    if plan > 0.0 {
        text.push_str(&format!(" ({:.1}% плана)", fact / plan * 100.0));
    }
    Some(text)
}

/// Single-product analytics view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCard {
    pub info: ProductInfo,
    /// `None` when the analytics call failed or the product has no SKU.
    pub sales: Option<SkuSales>,
    pub sales_days: i64,
    /// Ledger cost per unit, `None` when the product has no ledger row.
    pub cost_per_unit: Option<f64>,
}

pub fn format_product_card(card: &ProductCard) -> String {
    let info = &card.info;
    let mut text = format!(
        "📦 <b>{}</b>\nАртикул: {}",
        escape_html(&info.name),
        escape_html(&info.offer_id)
    );
    if let Some(sku) = info.sku {
        text.push_str(&format!("\nSKU: {sku}"));
    }
    text.push_str(&format!(
        "\nЦена: {}\nОстаток: {} шт",
        money(info.price),
        info.stock
    ));

    match card.sales {
        Some(sales) => text.push_str(&format!(
            "\nЗаказано за {} дн.: {} шт на {}",
            card.sales_days,
            sales.ordered_units,
            money(sales.revenue)
        )),
        None => text.push_str("\nАналитика продаж недоступна"),
    }

    match card.cost_per_unit {
        Some(cost) => text.push_str(&format!("\nСебестоимость: {}", money(cost))),
        None => text.push_str("\nСебестоимость: нет в юнит-экономике"),
    }
    text
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use common::{OrderLine, UnitEconomics};

    use super::*;
    use crate::aggregate::aggregate;
    use crate::summary::summarize;

    fn sample_summary() -> ReportSummary {
        let lines = vec![
            OrderLine::new("CUP-01", "Кружка <белая>", 3),
            OrderLine::new("GHOST", "Нет в таблице", 1),
        ];
        let mut ledger = HashMap::new();
        ledger.insert(
            "CUP-01".to_string(),
            UnitEconomics {
                cost_per_unit: 50.0,
                sell_price_per_unit: 100.0,
                commission_per_unit: 10.0,
                logistics_per_unit: 5.0,
                storage_per_unit: 2.0,
                extra_cost_per_unit: 1.0,
            },
        );
        summarize(&aggregate(&lines), &ledger)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape_html("обычный текст"), "обычный текст");
    }

    #[test]
    fn test_report_section_order() {
        let text = format_report(&sample_summary(), "за 1 дн.", 5);

        let pos = |needle: &str| text.find(needle).unwrap_or_else(|| panic!("{needle} missing"));
        let cup = pos("CUP-01");
        let ghost = pos("GHOST");
        let totals = pos("Итого");
        let counts = pos("Прибыльных позиций: 1");
        let top = pos("Топ-5 прибыльных");
        let worst = pos("Топ-5 убыточных");
        assert!(cup < ghost && ghost < totals && totals < counts && counts < top && top < worst);

        assert!(text.contains("EBITDA: 96.00 ₽"));
        assert!(text.contains("Выручка: 300.00 ₽"));
        assert!(text.contains("Кружка &lt;белая&gt;"));
        assert!(text.contains(NO_FINANCIAL_DATA));
        assert!(text.contains("Без данных: 1"));
    }

    #[test]
    fn test_empty_report() {
        let text = format_report(&ReportSummary::default(), "за 7 дн.", 5);
        assert_eq!(text, "📭 Заказов Ozon за 7 дн. не найдено.");
    }

    #[test]
    fn test_posting_notification() {
        let posting = Posting {
            identifier: Some("0123-0001-1".into()),
            order_number: Some("0123-0001".into()),
            status: Some("awaiting_packaging".into()),
            lines: vec![
                OrderLine::new("CUP-01", "Кружка", 2),
                OrderLine::new("", "без кода", 1),
            ],
        };
        let text = format_posting_notification(&posting);
        assert!(text.contains("Отправление: 0123-0001-1"));
        assert!(text.contains("Заказ: 0123-0001"));
        assert!(text.contains("• CUP-01 · Кружка × 2"));
        assert!(!text.contains("без кода"));
    }

    #[test]
    fn test_plan_line() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_eq!(format_plan_line(date, None, 10.0), None);

        let line = format_plan_line(date, Some(1000.0), 250.0).unwrap();
        assert!(line.contains("15.10.2026"));
        assert!(line.contains("(25.0% плана)"));

        let zero = format_plan_line(date, Some(0.0), 250.0).unwrap();
        assert!(!zero.contains('%'));
    }

    #[test]
    fn test_product_card_markers() {
        let card = ProductCard {
            info: ProductInfo {
                offer_id: "CUP-01".into(),
                sku: Some(123456),
                name: "Кружка".into(),
                price: 499.0,
                stock: 12,
            },
            sales: None,
            sales_days: 14,
            cost_per_unit: None,
        };
        let text = format_product_card(&card);
        assert!(text.contains("SKU: 123456"));
        assert!(text.contains("Остаток: 12 шт"));
        assert!(text.contains("Аналитика продаж недоступна"));
        assert!(text.contains("нет в юнит-экономике"));

        let card = ProductCard {
            sales: Some(SkuSales {
                revenue: 4990.0,
                ordered_units: 10,
            }),
            cost_per_unit: Some(120.0),
            ..card
        };
        let text = format_product_card(&card);
        assert!(text.contains("Заказано за 14 дн.: 10 шт на 4990.00 ₽"));
        assert!(text.contains("Себестоимость: 120.00 ₽"));
    }
}
