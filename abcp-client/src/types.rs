//! Response types

use serde::{Deserialize, Serialize};
use shared::serde_helpers;

/// User profile returned by the users endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// 平台用户 ID（订单接口的 `userId`）
    #[serde(deserialize_with = "serde_helpers::string_or_number")]
    pub user_id: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub name: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub balance: String,
    #[serde(default, deserialize_with = "serde_helpers::string_or_number")]
    pub debt: String,
}
