//! Client configuration

/// Client configuration for the remote order platform
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Users endpoint (lookup by phone)
    pub users_url: String,

    /// Orders endpoint (orders by user id)
    pub orders_url: String,

    /// API login (`userlogin`)
    pub login: String,

    /// API password (`userpsw`)
    pub password: String,

    /// Users request timeout in seconds
    pub users_timeout: u64,

    /// Orders request timeout in seconds
    pub orders_timeout: u64,
}

impl ClientConfig {
    /// Create a new configuration with default timeouts
    pub fn new(
        users_url: impl Into<String>,
        orders_url: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            users_url: users_url.into(),
            orders_url: orders_url.into(),
            login: login.into(),
            password: password.into(),
            users_timeout: 10,
            orders_timeout: 15,
        }
    }

    /// Set request timeouts (seconds)
    pub fn with_timeouts(mut self, users_timeout: u64, orders_timeout: u64) -> Self {
        self.users_timeout = users_timeout;
        self.orders_timeout = orders_timeout;
        self
    }
}
