//! 远端订单来源
//!
//! [`OrderSource`] 返回某账户当前的订单列表（按来源顺序），
//! [`AccountResolver`] 按手机号查找账户。任何失败对核心而言都只是"本轮无更新"。

mod abcp;

use async_trait::async_trait;
use shared::{AccountId, OrderRecord};
use thiserror::Error;

pub use abcp::AbcpOrderSource;

/// Remote source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status}")]
    Status { status: u16 },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<abcp_client::ClientError> for SourceError {
    fn from(e: abcp_client::ClientError) -> Self {
        use abcp_client::ClientError;
        match e {
            ClientError::Http(e) => SourceError::Transport(e.to_string()),
            ClientError::Status { status, .. } => SourceError::Status { status },
            ClientError::InvalidResponse(msg) => SourceError::Malformed(msg),
            ClientError::Serialization(e) => SourceError::Malformed(e.to_string()),
        }
    }
}

/// Account resolved from a phone number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccount {
    pub account_id: AccountId,
    pub name: String,
    pub balance: String,
    pub debt: String,
}

#[async_trait]
pub trait OrderSource: Send + Sync {
    /// 没有订单时返回空列表
    async fn fetch(&self, account_id: &str) -> Result<Vec<OrderRecord>, SourceError>;
}

#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve_phone(&self, phone: &str) -> Result<Option<ResolvedAccount>, SourceError>;
}
