//! Order record as returned by the remote order platform
//!
//! 只读、每次拉取都重新获得，不归本系统所有。

use crate::serde_helpers;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 已关闭状态关键字（小写、子串匹配）
///
/// 行项目状态包含任一关键字即视为已结束。
pub const CLOSED_STATUS_KEYWORDS: &[&str] = &[
    "готово",
    "выдан",
    "выполнен",
    "закрыт",
    "завершен",
    "завершён",
    "отмен",
    "отказ",
    "done",
    "issued",
    "closed",
    "completed",
    "cancelled",
    "canceled",
    "refused",
];

/// Order line item (position)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub brand: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub description: String,
    /// 状态标签（本地化文本，例如 "в пути"）
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub status: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub price_out: String,
    #[serde(default = "default_quantity", deserialize_with = "serde_helpers::string_or_number")]
    pub quantity: String,
}

fn default_quantity() -> String {
    "1".to_string()
}

impl LineItem {
    /// 状态是否属于已关闭集合
    pub fn is_closed(&self) -> bool {
        let status = self.status.to_lowercase();
        CLOSED_STATUS_KEYWORDS
            .iter()
            .any(|keyword| status.contains(keyword))
    }
}

/// Order record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// 订单号（远端唯一标识）
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub number: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub date: String,
    /// 取货网点代码
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub delivery_office: String,
    #[serde(default, deserialize_with = "serde_helpers::lenient_decimal")]
    pub sum: Decimal,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub payment_type: String,
    #[serde(default, deserialize_with = "serde_helpers::flexible_bool")]
    pub paid: bool,
    #[serde(default)]
    pub positions: Vec<LineItem>,
}

impl OrderRecord {
    pub fn id(&self) -> &str {
        &self.number
    }

    /// 订单是否仍在进行中
    ///
    /// 至少一个行项目未关闭即为进行中；没有行项目时以未付款为准。
    pub fn is_active(&self) -> bool {
        if self.positions.is_empty() {
            return !self.paid;
        }
        self.positions.iter().any(|item| !item.is_closed())
    }
}
