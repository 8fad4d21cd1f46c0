//! HTTP client for the remote order platform

use crate::{ClientConfig, ClientError, ClientResult, UserProfile};
use reqwest::{Client, Request};
use shared::order::OrderRecord;
use shared::util::mask_phone;
use std::time::Duration;

/// 日志中响应体的最大截取长度
const BODY_PREVIEW_LEN: usize = 400;

/// HTTP client for the ABCP users / orders endpoints
#[derive(Debug, Clone)]
pub struct AbcpClient {
    client: Client,
    config: ClientConfig,
}

impl AbcpClient {
    /// Create a new client from configuration
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    /// Build the users lookup request
    pub fn users_request(&self, phone: &str) -> ClientResult<Request> {
        let request = self
            .client
            .get(&self.config.users_url)
            .query(&[
                ("userlogin", self.config.login.as_str()),
                ("userpsw", self.config.password.as_str()),
                ("phone", phone),
            ])
            .timeout(Duration::from_secs(self.config.users_timeout))
            .build()?;
        Ok(request)
    }

    /// Build the orders request
    pub fn orders_request(&self, user_id: &str) -> ClientResult<Request> {
        let request = self
            .client
            .get(&self.config.orders_url)
            .query(&[
                ("userlogin", self.config.login.as_str()),
                ("userpsw", self.config.password.as_str()),
                ("userId", user_id),
            ])
            .timeout(Duration::from_secs(self.config.orders_timeout))
            .build()?;
        Ok(request)
    }

    /// Look up a user by normalized phone number
    ///
    /// 返回列表中的第一个用户；空列表返回 `None`。
    pub async fn get_user_by_phone(&self, phone: &str) -> ClientResult<Option<UserProfile>> {
        tracing::info!(phone = %mask_phone(phone), "→ [API users] lookup");
        let body = self.execute(self.users_request(phone)?).await?;
        let user = parse_users(&body)?;
        tracing::info!(found = user.is_some(), "← [API users] parsed");
        Ok(user)
    }

    /// Fetch the order list of one account
    ///
    /// 非数组 JSON 视为"没有订单"。
    pub async fn get_orders(&self, user_id: &str) -> ClientResult<Vec<OrderRecord>> {
        tracing::debug!(user_id = %user_id, "→ [API orders] fetch");
        let body = self.execute(self.orders_request(user_id)?).await?;
        let orders = parse_orders(&body)?;
        tracing::debug!(user_id = %user_id, count = orders.len(), "← [API orders] parsed");
        Ok(orders)
    }

    /// Send the request and return the body of a successful response
    async fn execute(&self, request: Request) -> ClientResult<String> {
        // 请求 URL 带凭据和手机号，错误里不保留
        let response = self
            .client
            .execute(request)
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = response.status();
        let body = response.text().await.map_err(reqwest::Error::without_url)?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        Ok(body)
    }
}

/// Parse the users endpoint body
pub fn parse_users(body: &str) -> ClientResult<Option<UserProfile>> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    match value {
        serde_json::Value::Array(items) => match items.into_iter().next() {
            Some(first) => Ok(Some(serde_json::from_value(first)?)),
            None => Ok(None),
        },
        other => Err(ClientError::InvalidResponse(format!(
            "expected user list, got {}",
            preview(&other.to_string())
        ))),
    }
}

/// Parse the orders endpoint body
pub fn parse_orders(body: &str) -> ClientResult<Vec<OrderRecord>> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        other => {
            tracing::warn!(body = %preview(&other.to_string()), "[API orders] Unexpected JSON type");
            Ok(Vec::new())
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AbcpClient {
        let config = ClientConfig::new(
            "https://abcp.example/cp/users",
            "https://abcp.example/cp/orders",
            "api-login",
            "md5hash",
        );
        AbcpClient::new(config).unwrap()
    }

    #[test]
    fn test_orders_request_carries_credentials_and_user() {
        let client = test_client();
        let request = client.orders_request("4242").unwrap();
        let url = request.url().as_str();
        assert!(url.starts_with("https://abcp.example/cp/orders?"));
        assert!(url.contains("userlogin=api-login"));
        assert!(url.contains("userpsw=md5hash"));
        assert!(url.contains("userId=4242"));
        assert_eq!(request.timeout(), Some(&Duration::from_secs(15)));
    }

    #[test]
    fn test_users_request_timeout() {
        let client = test_client();
        let request = client.users_request("79001234567").unwrap();
        assert!(request.url().as_str().contains("phone=79001234567"));
        assert_eq!(request.timeout(), Some(&Duration::from_secs(10)));
    }

    #[test]
    fn test_parse_users_takes_first() {
        let body = r#"[{"userId": 4242, "name": "Иван", "balance": "10.00", "debt": 0}, {"userId": 1}]"#;
        let user = parse_users(body).unwrap().unwrap();
        assert_eq!(user.user_id, "4242");
        assert_eq!(user.name, "Иван");
        assert_eq!(user.debt, "0");

        assert!(parse_users("[]").unwrap().is_none());
        assert!(parse_users(r#"{"error": "x"}"#).is_err());
    }

    #[test]
    fn test_parse_orders_non_list_is_empty() {
        assert!(parse_orders(r#"{"message": "no orders"}"#).unwrap().is_empty());
        assert!(parse_orders("not json").is_err());

        let orders = parse_orders(r#"[{"number": "A1", "paid": true, "positions": []}]"#).unwrap();
        assert_eq!(orders.len(), 1);
        assert!(orders[0].paid);
    }
}
