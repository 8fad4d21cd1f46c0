use super::tokens::TokenAllocator;
use crate::channel::Keyboard;
use shared::util::now_millis;
use shared::{AccountId, MessageRef, OrderRecord};
use std::collections::{HashMap, HashSet};

/// 概览过滤方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    All,
    Active,
    Unpaid,
}

impl FilterMode {
    pub const ALL_MODES: [FilterMode; 3] = [FilterMode::All, FilterMode::Active, FilterMode::Unpaid];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "all" => Some(FilterMode::All),
            "active" => Some(FilterMode::Active),
            "unpaid" => Some(FilterMode::Unpaid),
            _ => None,
        }
    }

    /// 载荷中的名字
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Active => "active",
            FilterMode::Unpaid => "unpaid",
        }
    }

    /// 按钮文字
    pub fn label(&self) -> &'static str {
        match self {
            FilterMode::All => "Все",
            FilterMode::Active => "Активные",
            FilterMode::Unpaid => "Не оплачены",
        }
    }

    pub fn matches(&self, order: &OrderRecord) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => order.is_active(),
            FilterMode::Unpaid => !order.paid,
        }
    }
}

/// Order counters shown on the overview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub total: usize,
    pub active: usize,
    pub unpaid: usize,
}

impl Metrics {
    pub fn compute(orders: &[OrderRecord]) -> Self {
        Self {
            total: orders.len(),
            active: orders.iter().filter(|o| o.is_active()).count(),
            unpaid: orders.iter().filter(|o| !o.paid).count(),
        }
    }
}

/// Navigation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Overview,
    /// 当前查看的订单号
    Detail(String),
}

/// 已显示在活动消息上的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub keyboard: Keyboard,
}

/// Per-chat transient state of the browsing UI
///
/// 只存在于内存；重启后为空，首次交互前需强制同步一次。
#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: AccountId,
    /// 每次强制同步 +1
    pub generation: u64,
    /// 来源返回顺序
    pub orders: Vec<OrderRecord>,
    /// 订单号 → `orders` 下标
    pub orders_by_number: HashMap<String, usize>,
    pub tokens: TokenAllocator,
    pub active_filter: FilterMode,
    pub metrics: Metrics,
    pub last_synced_at: i64,
    pub view: View,
    /// 概览/详情所在的消息
    pub active_message_ref: Option<MessageRef>,
    pub menu_message_ref: Option<MessageRef>,
    /// 本会话发出的消息，重置时清理
    pub tracked_message_refs: HashSet<MessageRef>,
    pub displayed: Option<Rendered>,
}

impl Session {
    /// Build a new generation from freshly fetched orders
    ///
    /// 同一账户的上一代会话提供令牌、过滤方式、视图和消息引用；
    /// 换账户则从头开始。
    pub fn build(account_id: &str, orders: Vec<OrderRecord>, previous: Option<Session>) -> Self {
        let previous = previous.filter(|p| p.account_id == account_id);

        let tokens = match &previous {
            Some(p) => p.tokens.reallocate(orders.iter().map(|o| o.id())),
            None => TokenAllocator::seeded().reallocate(orders.iter().map(|o| o.id())),
        };

        let mut orders_by_number = HashMap::with_capacity(orders.len());
        for (index, order) in orders.iter().enumerate() {
            orders_by_number.entry(order.id().to_string()).or_insert(index);
        }
        let metrics = Metrics::compute(&orders);
        let default_filter = if metrics.active > 0 {
            FilterMode::Active
        } else {
            FilterMode::All
        };

        match previous {
            Some(p) => Self {
                account_id: account_id.to_string(),
                generation: p.generation + 1,
                orders,
                orders_by_number,
                tokens,
                active_filter: p.active_filter,
                metrics,
                last_synced_at: now_millis(),
                view: p.view,
                active_message_ref: p.active_message_ref,
                menu_message_ref: p.menu_message_ref,
                tracked_message_refs: p.tracked_message_refs,
                displayed: p.displayed,
            },
            None => Self {
                account_id: account_id.to_string(),
                generation: 1,
                orders,
                orders_by_number,
                tokens,
                active_filter: default_filter,
                metrics,
                last_synced_at: now_millis(),
                view: View::Overview,
                active_message_ref: None,
                menu_message_ref: None,
                tracked_message_refs: HashSet::new(),
                displayed: None,
            },
        }
    }

    pub fn order(&self, number: &str) -> Option<&OrderRecord> {
        self.orders_by_number
            .get(number)
            .and_then(|&index| self.orders.get(index))
    }

    /// 令牌 → 订单
    pub fn resolve_token(&self, token: &str) -> Option<&OrderRecord> {
        self.tokens
            .number_for(token)
            .and_then(|number| self.order(number))
    }

    pub fn token_for(&self, number: &str) -> Option<&str> {
        self.tokens.token_for(number)
    }

    /// 按当前过滤方式筛选，保持来源顺序
    pub fn filtered(&self) -> Vec<&OrderRecord> {
        self.orders
            .iter()
            .filter(|o| self.active_filter.matches(o))
            .collect()
    }

    /// 记录新的活动消息
    pub fn set_active_message(&mut self, message: MessageRef) {
        if self.active_message_ref != Some(message) {
            self.displayed = None;
        }
        self.active_message_ref = Some(message);
        self.tracked_message_refs.insert(message);
    }

    pub fn track(&mut self, message: MessageRef) {
        self.tracked_message_refs.insert(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::order;

    fn sample_orders() -> Vec<OrderRecord> {
        vec![
            order("100", false, &["в пути"]),
            order("101", true, &["готово"]),
        ]
    }

    #[test]
    fn test_filters_and_metrics() {
        let mut session = Session::build("acc-1", sample_orders(), None);
        assert_eq!(
            session.metrics,
            Metrics {
                total: 2,
                active: 1,
                unpaid: 1
            }
        );

        session.active_filter = FilterMode::All;
        let ids: Vec<&str> = session.filtered().iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec!["100", "101"]);

        session.active_filter = FilterMode::Active;
        let ids: Vec<&str> = session.filtered().iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec!["100"]);

        session.active_filter = FilterMode::Unpaid;
        let ids: Vec<&str> = session.filtered().iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec!["100"]);
    }

    #[test]
    fn test_default_filter() {
        let session = Session::build("acc-1", sample_orders(), None);
        assert_eq!(session.active_filter, FilterMode::Active);
        assert_eq!(session.view, View::Overview);

        let closed = vec![order("101", true, &["готово"])];
        let session = Session::build("acc-1", closed, None);
        assert_eq!(session.active_filter, FilterMode::All);
    }

    #[test]
    fn test_next_generation_carries_ui_state() {
        let mut first = Session::build("acc-1", sample_orders(), None);
        first.active_filter = FilterMode::Unpaid;
        first.set_active_message(MessageRef(42));
        let token = first.token_for("101").unwrap().to_string();

        let mut orders = sample_orders();
        orders.push(order("102", false, &[]));
        let second = Session::build("acc-1", orders, Some(first));

        assert_eq!(second.generation, 2);
        assert_eq!(second.active_filter, FilterMode::Unpaid);
        assert_eq!(second.active_message_ref, Some(MessageRef(42)));
        assert_eq!(second.resolve_token(&token).unwrap().id(), "101");
    }

    #[test]
    fn test_other_account_starts_fresh() {
        let mut first = Session::build("acc-1", sample_orders(), None);
        first.set_active_message(MessageRef(42));
        let second = Session::build("acc-2", sample_orders(), Some(first));
        assert_eq!(second.generation, 1);
        assert!(second.active_message_ref.is_none());
    }

    #[test]
    fn test_filter_mode_names() {
        for mode in FilterMode::ALL_MODES {
            assert_eq!(FilterMode::parse(mode.as_str()), Some(mode));
        }
        assert!(FilterMode::parse("paid").is_none());
    }
}
