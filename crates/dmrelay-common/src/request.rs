//! Run request model and validation
//!
//! A [`RawRunRequest`] is the untrusted JSON input. [`RunRequest::validate`]
//! normalizes it and checks every bound, collecting all violations into a
//! single [`Error::Validation`](crate::Error::Validation).

use crate::types::{ProxyConfiguration, Username};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;

/// Minimum session credential length after trimming
pub const MIN_SESSION_ID_LEN: usize = 10;

/// Maximum message length in characters
pub const MAX_MESSAGE_CHARS: usize = 1000;

pub const DELAY_RANGE: RangeInclusive<u64> = 10..=300;
pub const HOURLY_CAP_RANGE: RangeInclusive<u32> = 1..=50;
pub const DAILY_CAP_RANGE: RangeInclusive<u32> = 1..=200;
pub const RETRY_RANGE: RangeInclusive<u32> = 1..=10;
pub const TIMEOUT_RANGE: RangeInclusive<u64> = 10..=120;

/// Unvalidated run request, as read from an input document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRunRequest {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub usernames: Option<Vec<String>>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default = "default_delay")]
    pub delay_between_messages: u64,

    #[serde(default = "default_hourly_cap")]
    pub max_messages_per_hour: u32,

    #[serde(default = "default_daily_cap")]
    pub max_messages_per_day: u32,

    #[serde(default = "default_headless")]
    pub headless: bool,

    #[serde(default)]
    pub save_screenshots: bool,

    #[serde(default)]
    pub proxy_configuration: Option<ProxyConfiguration>,

    #[serde(default)]
    pub test_mode: bool,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_delay() -> u64 {
    60
}

fn default_hourly_cap() -> u32 {
    10
}

fn default_daily_cap() -> u32 {
    50
}

fn default_headless() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout() -> u64 {
    30
}

impl Default for RawRunRequest {
    fn default() -> Self {
        Self {
            session_id: None,
            usernames: None,
            message: None,
            delay_between_messages: default_delay(),
            max_messages_per_hour: default_hourly_cap(),
            max_messages_per_day: default_daily_cap(),
            headless: default_headless(),
            save_screenshots: false,
            proxy_configuration: None,
            test_mode: false,
            debug_mode: false,
            max_retries: default_max_retries(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl RawRunRequest {
    /// Create a request with the required fields and defaults for the rest
    pub fn new(
        session_id: impl Into<String>,
        usernames: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: Some(session_id.into()),
            usernames: Some(usernames),
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// A validated, immutable run request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    session_id: String,
    usernames: Vec<Username>,
    message: String,
    delay_between_messages: u64,
    max_messages_per_hour: u32,
    max_messages_per_day: u32,
    headless: bool,
    save_screenshots: bool,
    proxy_configuration: Option<ProxyConfiguration>,
    test_mode: bool,
    debug_mode: bool,
    max_retries: u32,
    timeout_seconds: u64,
}

impl RunRequest {
    /// Validate and normalize a raw request
    pub fn validate(raw: RawRunRequest) -> Result<Self> {
        let mut violations = Vec::new();

        let session_id = match raw.session_id.as_deref().map(str::trim) {
            None | Some("") => {
                violations.push("sessionId is required".to_string());
                String::new()
            }
            Some(s) if s.chars().count() < MIN_SESSION_ID_LEN => {
                violations.push(format!(
                    "sessionId appears to be invalid (shorter than {} characters)",
                    MIN_SESSION_ID_LEN
                ));
                String::new()
            }
            Some(s) => s.to_string(),
        };

        let usernames = match raw.usernames.as_deref() {
            None | Some([]) => {
                violations.push("At least one username is required".to_string());
                Vec::new()
            }
            Some(list) => {
                let unique = normalize_usernames(list);
                if unique.is_empty() {
                    violations.push("No valid usernames provided".to_string());
                }
                unique
            }
        };

        let message = match raw.message.as_deref() {
            None => {
                violations.push("message is required".to_string());
                String::new()
            }
            Some(m) if m.trim().is_empty() => {
                violations.push("message cannot be empty".to_string());
                String::new()
            }
            Some(m) if m.chars().count() > MAX_MESSAGE_CHARS => {
                violations.push(format!(
                    "message cannot exceed {} characters",
                    MAX_MESSAGE_CHARS
                ));
                String::new()
            }
            Some(m) => m.trim().to_string(),
        };

        check_range(
            &mut violations,
            "delayBetweenMessages",
            raw.delay_between_messages,
            DELAY_RANGE,
        );
        check_range(
            &mut violations,
            "maxMessagesPerHour",
            raw.max_messages_per_hour,
            HOURLY_CAP_RANGE,
        );
        check_range(
            &mut violations,
            "maxMessagesPerDay",
            raw.max_messages_per_day,
            DAILY_CAP_RANGE,
        );
        check_range(&mut violations, "maxRetries", raw.max_retries, RETRY_RANGE);
        check_range(
            &mut violations,
            "timeoutSeconds",
            raw.timeout_seconds,
            TIMEOUT_RANGE,
        );

        if !violations.is_empty() {
            return Err(Error::Validation(violations.join("; ")));
        }

        Ok(Self {
            session_id,
            usernames,
            message,
            delay_between_messages: raw.delay_between_messages,
            max_messages_per_hour: raw.max_messages_per_hour,
            max_messages_per_day: raw.max_messages_per_day,
            headless: raw.headless,
            save_screenshots: raw.save_screenshots,
            proxy_configuration: raw.proxy_configuration,
            test_mode: raw.test_mode,
            debug_mode: raw.debug_mode,
            max_retries: raw.max_retries,
            timeout_seconds: raw.timeout_seconds,
        })
    }

    /// Parse and validate a JSON input document
    pub fn from_json(input: &str) -> Result<Self> {
        let raw: RawRunRequest = serde_json::from_str(input)
            .map_err(|e| Error::Validation(format!("Malformed input document: {}", e)))?;
        Self::validate(raw)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Recipients, deduplicated, in input order
    pub fn usernames(&self) -> &[Username] {
        &self.usernames
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Delay between recipients, in seconds
    pub fn delay_between_messages(&self) -> u64 {
        self.delay_between_messages
    }

    pub fn max_messages_per_hour(&self) -> u32 {
        self.max_messages_per_hour
    }

    pub fn max_messages_per_day(&self) -> u32 {
        self.max_messages_per_day
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn save_screenshots(&self) -> bool {
        self.save_screenshots
    }

    pub fn proxy_configuration(&self) -> Option<&ProxyConfiguration> {
        self.proxy_configuration.as_ref()
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Send attempts per recipient
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Per-operation timeout handed to collaborators, in seconds
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }
}

/// Trim, strip `@`, drop empties and duplicates, keep first-seen order
fn normalize_usernames(input: &[String]) -> Vec<Username> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(input.len());

    for entry in input {
        let username: String = entry.trim().chars().filter(|c| *c != '@').collect();
        let username = username.trim();
        if username.is_empty() {
            continue;
        }
        if seen.insert(username.to_string()) {
            unique.push(username.to_string());
        }
    }

    unique
}

fn check_range<T>(violations: &mut Vec<String>, field: &str, value: T, range: RangeInclusive<T>)
where
    T: PartialOrd + std::fmt::Display,
{
    if !range.contains(&value) {
        violations.push(format!(
            "{} must be between {} and {} (got {})",
            field,
            range.start(),
            range.end(),
            value
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(usernames: &[&str], message: &str) -> RawRunRequest {
        RawRunRequest::new(
            "sessionid-0123456789",
            usernames.iter().map(|s| s.to_string()).collect(),
            message,
        )
    }

    #[test]
    fn test_usernames_deduplicated_in_order() {
        let request = RunRequest::validate(raw(&["alice", "bob", "alice"], "hi")).unwrap();
        assert_eq!(request.usernames(), ["alice", "bob"]);
    }

    #[test]
    fn test_usernames_normalized() {
        let request =
            RunRequest::validate(raw(&["@Alice", "  bob ", "", "   ", "@", "Alice"], "hi"))
                .unwrap();
        // Case is preserved, so "Alice" and "alice" would be distinct
        assert_eq!(request.usernames(), ["Alice", "bob"]);
    }

    #[test]
    fn test_all_usernames_empty() {
        let err = RunRequest::validate(raw(&["", "@", "  "], "hi")).unwrap_err();
        assert!(err.to_string().contains("No valid usernames"));
    }

    #[test]
    fn test_message_trimmed() {
        let request = RunRequest::validate(raw(&["alice"], "  hello there \n")).unwrap();
        assert_eq!(request.message(), "hello there");
    }

    #[test]
    fn test_message_too_long() {
        let message = "x".repeat(1001);
        let err = RunRequest::validate(raw(&["alice"], &message)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("1000 characters"));
    }

    #[test]
    fn test_message_at_limit() {
        let message = "x".repeat(1000);
        let request = RunRequest::validate(raw(&["alice"], &message)).unwrap();
        assert_eq!(request.message().chars().count(), 1000);
    }

    #[test]
    fn test_message_blank() {
        let err = RunRequest::validate(raw(&["alice"], "   ")).unwrap_err();
        assert!(err.to_string().contains("message cannot be empty"));
    }

    #[test]
    fn test_session_id_too_short() {
        let mut input = raw(&["alice"], "hi");
        input.session_id = Some("  short  ".to_string());
        let err = RunRequest::validate(input).unwrap_err();
        assert!(err.to_string().contains("sessionId"));
    }

    #[test]
    fn test_session_id_trimmed() {
        let mut input = raw(&["alice"], "hi");
        input.session_id = Some("  sessionid-0123456789 ".to_string());
        let request = RunRequest::validate(input).unwrap();
        assert_eq!(request.session_id(), "sessionid-0123456789");
    }

    #[test]
    fn test_bounds_collected() {
        let mut input = raw(&["alice"], "hi");
        input.delay_between_messages = 5;
        input.max_messages_per_hour = 51;
        input.max_messages_per_day = 0;
        input.max_retries = 11;
        input.timeout_seconds = 121;

        let message = RunRequest::validate(input).unwrap_err().to_string();
        assert!(message.contains("delayBetweenMessages"));
        assert!(message.contains("maxMessagesPerHour"));
        assert!(message.contains("maxMessagesPerDay"));
        assert!(message.contains("maxRetries"));
        assert!(message.contains("timeoutSeconds"));
    }

    #[test]
    fn test_from_json_defaults() {
        let request = RunRequest::from_json(
            r#"{
                "sessionId": "sessionid-0123456789",
                "usernames": ["alice", "@bob"],
                "message": "Hello!"
            }"#,
        )
        .unwrap();

        assert_eq!(request.usernames(), ["alice", "bob"]);
        assert_eq!(request.delay_between_messages(), 60);
        assert_eq!(request.max_messages_per_hour(), 10);
        assert_eq!(request.max_messages_per_day(), 50);
        assert_eq!(request.max_retries(), 3);
        assert_eq!(request.timeout_seconds(), 30);
        assert!(request.headless());
        assert!(!request.test_mode());
    }

    #[test]
    fn test_from_json_with_proxy() {
        let request = RunRequest::from_json(
            r#"{
                "sessionId": "sessionid-0123456789",
                "usernames": ["alice"],
                "message": "Hello!",
                "testMode": true,
                "proxyConfiguration": {"proxyUrls": ["http://proxy.example.com:8080"]}
            }"#,
        )
        .unwrap();

        assert!(request.test_mode());
        let proxy = request.proxy_configuration().unwrap();
        assert_eq!(
            proxy.proxy_urls.as_deref(),
            Some(&["http://proxy.example.com:8080".to_string()][..])
        );
    }

    #[test]
    fn test_from_json_malformed() {
        let err = RunRequest::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_missing_required_fields() {
        let message = RunRequest::from_json("{}").unwrap_err().to_string();
        assert!(message.contains("sessionId is required"));
        assert!(message.contains("At least one username is required"));
        assert!(message.contains("message is required"));
    }
}
