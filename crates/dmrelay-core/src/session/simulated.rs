//! Simulated collaborators
//!
//! Deterministic stand-ins for the browser automation, driven by
//! `[simulation]` configuration.

use super::{Authenticator, BrowserSession, MessageSender, SendError};
use async_trait::async_trait;
use dmrelay_common::config::SimulationConfig;
use dmrelay_common::Result;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Authenticator accepting every credential not listed in `reject_sessions`
pub struct SimulatedAuthenticator {
    rejected: HashSet<String>,
}

impl SimulatedAuthenticator {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            rejected: config.reject_sessions.iter().cloned().collect(),
        }
    }
}

#[async_trait]
impl Authenticator for SimulatedAuthenticator {
    async fn authenticate(&self, session: &BrowserSession, credential: &str) -> Result<bool> {
        let accepted = !self.rejected.contains(credential);
        debug!(session_id = %session.id(), accepted, "Simulated authentication");
        Ok(accepted)
    }

    async fn validate(&self, _session: &BrowserSession) -> Result<bool> {
        Ok(true)
    }
}

/// Sender with per-recipient failure injection
pub struct SimulatedSender {
    failing: HashSet<String>,
    missing: HashSet<String>,
    blocked: HashSet<String>,
    expire_after_sends: Option<u32>,
    sent: AtomicU32,
}

impl SimulatedSender {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            failing: config.fail_usernames.iter().cloned().collect(),
            missing: config.missing_usernames.iter().cloned().collect(),
            blocked: config.blocked_usernames.iter().cloned().collect(),
            expire_after_sends: config.expire_after_sends,
            sent: AtomicU32::new(0),
        }
    }

    /// Messages delivered so far
    pub fn sent_count(&self) -> u32 {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for SimulatedSender {
    async fn send(
        &self,
        session: &BrowserSession,
        recipient: &str,
        _body: &str,
    ) -> std::result::Result<bool, SendError> {
        if let Some(limit) = self.expire_after_sends {
            if self.sent_count() >= limit {
                return Err(SendError::SessionExpired(format!(
                    "session {} expired",
                    session.id()
                )));
            }
        }

        if self.missing.contains(recipient) {
            return Err(SendError::UserNotFound(recipient.to_string()));
        }
        if self.blocked.contains(recipient) {
            return Err(SendError::Blocked(recipient.to_string()));
        }
        if self.failing.contains(recipient) {
            return Err(SendError::Transient(
                "Simulated delivery failure".to_string(),
            ));
        }

        self.sent.fetch_add(1, Ordering::SeqCst);
        debug!(session_id = %session.id(), recipient, "Simulated message delivered");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;
    use std::time::Duration;

    fn session() -> BrowserSession {
        BrowserSession::new(SessionOptions {
            headless: true,
            proxy: None,
            debug_artifacts: false,
            timeout: Duration::from_secs(30),
        })
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            fail_usernames: vec!["flaky".into()],
            missing_usernames: vec!["ghost".into()],
            blocked_usernames: vec!["grumpy".into()],
            reject_sessions: vec!["expired_session".into()],
            expire_after_sends: None,
        }
    }

    #[tokio::test]
    async fn test_authenticator() {
        let auth = SimulatedAuthenticator::new(&config());
        let session = session();

        assert!(auth.authenticate(&session, "valid_session_1").await.unwrap());
        assert!(!auth.authenticate(&session, "expired_session").await.unwrap());
        assert!(auth.validate(&session).await.unwrap());
    }

    #[tokio::test]
    async fn test_sender_failure_injection() {
        let sender = SimulatedSender::new(&config());
        let session = session();

        assert_eq!(sender.send(&session, "alice", "hi").await, Ok(true));
        assert_eq!(
            sender.send(&session, "ghost", "hi").await,
            Err(SendError::UserNotFound("ghost".into()))
        );
        assert_eq!(
            sender.send(&session, "grumpy", "hi").await,
            Err(SendError::Blocked("grumpy".into()))
        );
        assert!(sender
            .send(&session, "flaky", "hi")
            .await
            .unwrap_err()
            .is_retryable());
        assert_eq!(sender.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_sender_session_expiry() {
        let mut cfg = config();
        cfg.expire_after_sends = Some(2);
        let sender = SimulatedSender::new(&cfg);
        let session = session();

        assert_eq!(sender.send(&session, "a", "hi").await, Ok(true));
        assert_eq!(sender.send(&session, "b", "hi").await, Ok(true));
        assert!(matches!(
            sender.send(&session, "c", "hi").await,
            Err(SendError::SessionExpired(_))
        ));
    }
}
