//! Common types for dmrelay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recipient identifier (a username without the `@` prefix)
pub type Username = String;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Terminal status of one recipient within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Success,
    Failed,
    Skipped,
    RateLimited,
    AuthenticationError,
    UserNotFound,
    Blocked,
}

impl MessageStatus {
    /// Whether this status counts as a delivered message
    pub fn is_success(self) -> bool {
        matches!(self, MessageStatus::Success)
    }

    /// Whether a recipient with this status was actually attempted
    pub fn is_attempted(self) -> bool {
        !matches!(self, MessageStatus::Skipped)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageStatus::Success => write!(f, "SUCCESS"),
            MessageStatus::Failed => write!(f, "FAILED"),
            MessageStatus::Skipped => write!(f, "SKIPPED"),
            MessageStatus::RateLimited => write!(f, "RATE_LIMITED"),
            MessageStatus::AuthenticationError => write!(f, "AUTHENTICATION_ERROR"),
            MessageStatus::UserNotFound => write!(f, "USER_NOT_FOUND"),
            MessageStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Proxy settings as supplied with a run request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfiguration {
    #[serde(default)]
    pub use_apify_proxy: bool,

    #[serde(default)]
    pub apify_proxy_groups: Option<Vec<String>>,

    #[serde(default)]
    pub proxy_urls: Option<Vec<String>>,
}

/// Credentials for an authenticated proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: String,
}

/// A normalized proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub credentials: Option<ProxyCredentials>,
}

impl std::fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials are never rendered
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&MessageStatus::RateLimited).unwrap();
        assert_eq!(json, "\"RATE_LIMITED\"");

        let status: MessageStatus = serde_json::from_str("\"USER_NOT_FOUND\"").unwrap();
        assert_eq!(status, MessageStatus::UserNotFound);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MessageStatus::Success.to_string(), "SUCCESS");
        assert_eq!(
            MessageStatus::AuthenticationError.to_string(),
            "AUTHENTICATION_ERROR"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(MessageStatus::Success.is_success());
        assert!(!MessageStatus::Blocked.is_success());
        assert!(MessageStatus::RateLimited.is_attempted());
        assert!(!MessageStatus::Skipped.is_attempted());
    }

    #[test]
    fn test_proxy_endpoint_display_hides_credentials() {
        let endpoint = ProxyEndpoint {
            protocol: "http".to_string(),
            host: "proxy.example.com".to_string(),
            port: 8080,
            credentials: Some(ProxyCredentials {
                username: "user".to_string(),
                password: "secret".to_string(),
            }),
        };
        assert_eq!(endpoint.to_string(), "http://proxy.example.com:8080");
    }
}
