//! Client configuration.

use crate::session::DEFAULT_REVALIDATE_INTERVAL;
use std::time::Duration;

/// Environment variable holding the base endpoint.
pub const ENDPOINT_ENV: &str = "PART_API_ENDPOINT";
/// Environment variable overriding the `User-Agent` header.
pub const USER_AGENT_ENV: &str = "PART_API_USER_AGENT";

const DEFAULT_USER_AGENT: &str = concat!("part-api/", env!("CARGO_PKG_VERSION"));

/// Settings for [`crate::PartClient`].
///
/// ```
/// use part_api::PartApiConfig;
///
/// let config = PartApiConfig::new().base_endpoint("http://localhost:8080/api");
/// assert_eq!(config.base_endpoint, "http://localhost:8080/api");
/// ```
#[derive(Debug, Clone)]
pub struct PartApiConfig {
    /// Prefix prepended verbatim to every request path. Empty means paths
    /// must already be absolute.
    pub base_endpoint: String,
    /// Minimum spacing between two background session checks.
    pub revalidate_interval: Duration,
    pub user_agent: String,
}

impl PartApiConfig {
    pub fn new() -> Self {
        Self {
            base_endpoint: String::new(),
            revalidate_interval: DEFAULT_REVALIDATE_INTERVAL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Defaults overlaid with `PART_API_ENDPOINT` / `PART_API_USER_AGENT`.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(endpoint) = non_empty_env(ENDPOINT_ENV) {
            config.base_endpoint = endpoint;
        }
        if let Some(agent) = non_empty_env(USER_AGENT_ENV) {
            config.user_agent = agent;
        }
        config
    }

    pub fn base_endpoint(mut self, base_endpoint: impl Into<String>) -> Self {
        self.base_endpoint = base_endpoint.into();
        self
    }

    pub fn revalidate_interval(mut self, interval: Duration) -> Self {
        self.revalidate_interval = interval;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Full URL for `path`: plain concatenation with the base endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_endpoint, path)
    }
}

impl Default for PartApiConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
