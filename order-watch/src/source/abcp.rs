use super::{AccountResolver, OrderSource, ResolvedAccount, SourceError};
use abcp_client::{AbcpClient, UserProfile};
use async_trait::async_trait;
use shared::OrderRecord;

/// [`OrderSource`] / [`AccountResolver`] over the ABCP HTTP API
///
/// 超时由 `ClientConfig` 按接口设置，核心层不做取消。
#[derive(Debug, Clone)]
pub struct AbcpOrderSource {
    client: AbcpClient,
}

impl AbcpOrderSource {
    pub fn new(client: AbcpClient) -> Self {
        Self { client }
    }
}

impl From<UserProfile> for ResolvedAccount {
    fn from(user: UserProfile) -> Self {
        Self {
            account_id: user.user_id,
            name: user.name,
            balance: user.balance,
            debt: user.debt,
        }
    }
}

#[async_trait]
impl OrderSource for AbcpOrderSource {
    async fn fetch(&self, account_id: &str) -> Result<Vec<OrderRecord>, SourceError> {
        Ok(self.client.get_orders(account_id).await?)
    }
}

#[async_trait]
impl AccountResolver for AbcpOrderSource {
    async fn resolve_phone(&self, phone: &str) -> Result<Option<ResolvedAccount>, SourceError> {
        let user = self.client.get_user_by_phone(phone).await?;
        Ok(user
            .filter(|u| !u.user_id.trim().is_empty())
            .map(ResolvedAccount::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abcp_client::ClientError;

    #[test]
    fn test_client_error_mapping() {
        let status: SourceError = ClientError::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(status, SourceError::Status { status: 502 }));

        let malformed: SourceError = ClientError::InvalidResponse("x".into()).into();
        assert!(matches!(malformed, SourceError::Malformed(_)));
    }

    #[test]
    fn test_profile_to_resolved_account() {
        let account = ResolvedAccount::from(UserProfile {
            user_id: "4242".into(),
            name: "Иван".into(),
            balance: "10.00".into(),
            debt: "0".into(),
        });
        assert_eq!(account.account_id, "4242");
        assert_eq!(account.name, "Иван");
    }
}
