//! 文本渲染
//!
//! - [`fingerprint`] - 变更检测用的规范化状态块
//! - [`order_card`] / [`notification_text`] - 通知与详情正文
//! - [`overview`] / [`detail`] - 交互界面（正文 + 控件）

use crate::channel::{Control, Keyboard};
use crate::navigation::ControlPayload;
use crate::session::{FilterMode, Rendered, Session};
use shared::OrderRecord;
use std::collections::HashMap;
use std::path::Path;

/// 概览中最多显示的订单按钮数
pub const MAX_ORDER_BUTTONS: usize = 40;

pub const NOTIFICATION_HEADER: &str = "📢 Обновление статусов:";

/// Office code → human-readable address
#[derive(Debug, Clone, Default)]
pub struct OfficeAliases {
    map: HashMap<String, String>,
}

impl OfficeAliases {
    /// 文件可选；不存在或格式错误时不做替换
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read office aliases");
                return Self::default();
            }
        };
        match serde_json::from_slice::<HashMap<String, String>>(&bytes) {
            Ok(map) => {
                tracing::info!(count = map.len(), "Office aliases loaded");
                Self { map }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid office aliases file");
                Self::default()
            }
        }
    }

    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        self.map.get(code).map(String::as_str).unwrap_or(code)
    }
}

pub fn status_emoji(status: &str) -> &'static str {
    let status = status.to_lowercase();
    if status.contains("готово") {
        "✅"
    } else if status.contains("в пути") {
        "🚚"
    } else if status.contains("к заказу") {
        "🕐"
    } else if status.contains("отказ") {
        "❌"
    } else {
        "📦"
    }
}

/// Normalized status block used for change detection
///
/// 只包含来源稳定的字段；日期、网点别名和装饰不参与比较。
pub fn fingerprint(order: &OrderRecord) -> String {
    let mut lines = vec![
        format!("#{}", order.number.trim()),
        format!("paid={}", order.paid),
        format!("sum={}", order.sum.normalize()),
    ];
    for item in &order.positions {
        lines.push(format!(
            "{}|{}|{}|{}|{}",
            item.brand.trim(),
            item.description.trim(),
            item.price_out.trim(),
            item.quantity.trim(),
            item.status.trim()
        ));
    }
    lines.join("\n")
}

pub fn order_card(order: &OrderRecord, aliases: &OfficeAliases) -> String {
    let paid = if order.paid { "Оплачен" } else { "Не оплачен" };
    let mut lines = vec![
        format!("📦 Заказ №{}", order.number),
        format!("📅 Дата: {}", dash_if_empty(&order.date)),
        format!("🏢 Офис: {}", aliases.resolve(&order.delivery_office)),
        format!("💳 Оплата: {}", dash_if_empty(&order.payment_type)),
        format!("💰 Сумма: {:.2} ₽", order.sum),
        format!("📍 Статус оплаты: {paid}"),
    ];

    for item in &order.positions {
        lines.push(String::new());
        lines.push(format!(
            "{} {} {}",
            status_emoji(&item.status),
            item.brand.trim(),
            item.description.trim()
        ));
        lines.push(format!("   💵 {} ₽ × {}", item.price_out, item.quantity));
        lines.push(format!("   📄 {}", item.status));
    }

    lines.join("\n").trim().to_string()
}

pub fn notification_text(card: &str) -> String {
    format!("{NOTIFICATION_HEADER}\n\n{card}")
}

fn dash_if_empty(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

fn control(label: impl Into<String>, payload: ControlPayload) -> Option<Control> {
    match payload.encode() {
        Ok(wire) => Some(Control::new(label, wire)),
        Err(e) => {
            tracing::warn!(payload = %payload, error = %e, "Control payload dropped");
            None
        }
    }
}

fn order_button_label(order: &OrderRecord) -> String {
    let marker = if order.is_active() { "⏳" } else { "✅" };
    let unpaid = if order.paid { "" } else { " · 💳" };
    format!("{marker} №{} · {:.2} ₽{unpaid}", order.number, order.sum)
}

/// Overview of the session's filtered order list
pub fn overview(session: &Session, notice: Option<&str>) -> Rendered {
    let filtered = session.filtered();
    let metrics = session.metrics;

    let mut text = String::new();
    if let Some(notice) = notice {
        text.push_str(notice);
        text.push_str("\n\n");
    }
    text.push_str("🧾 Ваши заказы\n");
    text.push_str(&format!(
        "Всего: {} · Активных: {} · Не оплачено: {}\n",
        metrics.total, metrics.active, metrics.unpaid
    ));
    text.push_str(&format!("Фильтр: {}\n\n", session.active_filter.label()));

    if metrics.total == 0 {
        text.push_str("🕐 У вас пока нет заказов.");
    } else if filtered.is_empty() {
        text.push_str("Нет заказов по выбранному фильтру.");
    } else if filtered.len() > MAX_ORDER_BUTTONS {
        text.push_str(&format!(
            "Показаны первые {MAX_ORDER_BUTTONS} из {}.",
            filtered.len()
        ));
    } else {
        text.push_str("Выберите заказ:");
    }

    let mut keyboard = Keyboard::new();
    for order in filtered.iter().take(MAX_ORDER_BUTTONS) {
        let Some(token) = session.token_for(order.id()) else {
            continue;
        };
        let button = control(
            order_button_label(order),
            ControlPayload::Select(token.to_string()),
        );
        keyboard = keyboard.row(button.into_iter().collect());
    }

    let filters = FilterMode::ALL_MODES
        .iter()
        .filter_map(|&mode| {
            let label = if mode == session.active_filter {
                format!("• {}", mode.label())
            } else {
                mode.label().to_string()
            };
            control(label, ControlPayload::Filter(mode))
        })
        .collect();
    keyboard = keyboard
        .row(filters)
        .row(control("🔄 Обновить", ControlPayload::Refresh).into_iter().collect());

    Rendered {
        text: text.trim_end().to_string(),
        keyboard,
    }
}

/// Detail card of one order with refresh / back controls
pub fn detail(
    session: &Session,
    order: &OrderRecord,
    aliases: &OfficeAliases,
    notice: Option<&str>,
) -> Rendered {
    let mut text = String::new();
    if let Some(notice) = notice {
        text.push_str(notice);
        text.push_str("\n\n");
    }
    text.push_str(&order_card(order, aliases));

    let mut row = Vec::new();
    if let Some(token) = session.token_for(order.id()) {
        row.extend(control(
            "🔄 Обновить заказ",
            ControlPayload::RefreshOrder(token.to_string()),
        ));
    }
    row.extend(control("⬅️ К списку", ControlPayload::Back));

    Rendered {
        text,
        keyboard: Keyboard::new().row(row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::order;

    #[test]
    fn test_status_emoji() {
        assert_eq!(status_emoji("Готово к выдаче"), "✅");
        assert_eq!(status_emoji("В пути"), "🚚");
        assert_eq!(status_emoji("К заказу"), "🕐");
        assert_eq!(status_emoji("Отказ поставщика"), "❌");
        assert_eq!(status_emoji("Принят"), "📦");
    }

    #[test]
    fn test_fingerprint_ignores_cosmetic_fields() {
        let mut a = order("100", false, &["в пути"]);
        let mut b = a.clone();
        a.date = "2025-03-01".into();
        b.date = "2025-03-02".into();
        b.delivery_office = "12".into();
        assert_eq!(fingerprint(&a), fingerprint(&b));

        b.positions[0].status = "готово".into();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_order_card_uses_alias() {
        let mut o = order("100", true, &["в пути"]);
        o.delivery_office = "12".into();
        let aliases = OfficeAliases::from_map(HashMap::from([(
            "12".to_string(),
            "ул. Ленина, 1".to_string(),
        )]));
        let card = order_card(&o, &aliases);
        assert!(card.starts_with("📦 Заказ №100"));
        assert!(card.contains("🏢 Офис: ул. Ленина, 1"));
        assert!(card.contains("📍 Статус оплаты: Оплачен"));
        assert!(card.contains("🚚"));

        let text = notification_text(&card);
        assert!(text.starts_with(NOTIFICATION_HEADER));
    }

    #[test]
    fn test_overview_controls() {
        let session = Session::build(
            "acc-1",
            vec![
                order("100", false, &["в пути"]),
                order("101", true, &["готово"]),
            ],
            None,
        );
        let rendered = overview(&session, None);
        assert!(rendered.text.contains("Всего: 2 · Активных: 1 · Не оплачено: 1"));
        assert!(rendered.text.contains("Фильтр: Активные"));

        let payloads: Vec<&str> = rendered
            .keyboard
            .controls()
            .map(|c| c.payload.as_str())
            .collect();
        // 默认过滤为 active，只有 100 一个订单按钮
        let select = format!("o:{}", session.token_for("100").unwrap());
        assert_eq!(payloads, vec![select.as_str(), "f:all", "f:active", "f:unpaid", "r:"]);
        assert!(
            rendered
                .keyboard
                .controls()
                .any(|c| c.label == "• Активные")
        );
    }

    #[test]
    fn test_overview_caps_buttons() {
        let orders = (0..MAX_ORDER_BUTTONS + 5)
            .map(|i| order(&format!("{}", 1000 + i), false, &["в пути"]))
            .collect();
        let session = Session::build("acc-1", orders, None);
        let rendered = overview(&session, Some("ℹ️ notice"));
        assert!(rendered.text.starts_with("ℹ️ notice"));
        let order_buttons = rendered
            .keyboard
            .controls()
            .filter(|c| c.payload.starts_with("o:"))
            .count();
        assert_eq!(order_buttons, MAX_ORDER_BUTTONS);
    }

    #[test]
    fn test_detail_controls() {
        let session = Session::build("acc-1", vec![order("100", false, &["в пути"])], None);
        let rendered = detail(&session, &session.orders[0], &OfficeAliases::default(), None);
        let payloads: Vec<&str> = rendered
            .keyboard
            .controls()
            .map(|c| c.payload.as_str())
            .collect();
        let refresh = format!("u:{}", session.token_for("100").unwrap());
        assert_eq!(payloads, vec![refresh.as_str(), "b:"]);
    }
}
