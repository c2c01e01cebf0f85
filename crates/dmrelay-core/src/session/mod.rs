//! Session Module - Collaborators that create sessions, authenticate and send
//!
//! The orchestrator only sees the traits defined here. Concrete backends are
//! picked from configuration by [`Collaborators::from_config`].

mod local;
mod proxy;
mod relay;
mod simulated;

pub use local::LocalSessionProvider;
pub use proxy::{parse_proxy_url, StaticProxyResolver};
pub use relay::HttpRelay;
pub use simulated::{SimulatedAuthenticator, SimulatedSender};

use async_trait::async_trait;
use chrono::Utc;
use dmrelay_common::config::{Backend, Config};
use dmrelay_common::types::{MessageStatus, ProxyEndpoint, Timestamp};
use dmrelay_common::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Options for creating a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    pub proxy: Option<ProxyEndpoint>,
    /// Keep screenshots and similar debug artifacts
    pub debug_artifacts: bool,
    /// Per-operation timeout for collaborators
    pub timeout: Duration,
}

/// Handle to a browser session, exclusively owned by one run
#[derive(Debug)]
pub struct BrowserSession {
    id: Uuid,
    options: SessionOptions,
    created_at: Timestamp,
    artifacts_dir: Option<PathBuf>,
}

impl BrowserSession {
    /// Create a new session handle
    pub fn new(options: SessionOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            options,
            created_at: Utc::now(),
            artifacts_dir: None,
        }
    }

    /// Attach a directory for debug artifacts
    pub fn with_artifacts_dir(mut self, dir: PathBuf) -> Self {
        self.artifacts_dir = Some(dir);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn artifacts_dir(&self) -> Option<&PathBuf> {
        self.artifacts_dir.as_ref()
    }
}

/// Failure of a single send attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("{0}")]
    Transient(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Blocked by recipient: {0}")]
    Blocked(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),
}

impl SendError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Transient(_))
    }

    /// Outcome status for a recipient whose attempts ended with this error
    pub fn status(&self) -> MessageStatus {
        match self {
            SendError::Transient(_) => MessageStatus::Failed,
            SendError::UserNotFound(_) => MessageStatus::UserNotFound,
            SendError::Blocked(_) => MessageStatus::Blocked,
            SendError::SessionExpired(_) => MessageStatus::AuthenticationError,
        }
    }
}

/// Creates and releases browser sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Create a session
    async fn create(&self, options: SessionOptions) -> Result<BrowserSession>;

    /// Release a session; callers log failures and move on
    async fn release(&self, session: BrowserSession) -> Result<()>;
}

/// Establishes and checks an authenticated session
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Attach the credential to the session
    async fn authenticate(&self, session: &BrowserSession, credential: &str) -> Result<bool>;

    /// Check that the session is usable
    async fn validate(&self, session: &BrowserSession) -> Result<bool>;
}

/// Performs one send attempt for one recipient
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(
        &self,
        session: &BrowserSession,
        recipient: &str,
        body: &str,
    ) -> std::result::Result<bool, SendError>;
}

/// Resolves the proxy a session should use
#[async_trait]
pub trait ProxyResolver: Send + Sync {
    async fn resolve(&self) -> Result<Option<ProxyEndpoint>>;
}

/// The collaborator set driving one run
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionProvider>,
    pub authenticator: Arc<dyn Authenticator>,
    pub sender: Arc<dyn MessageSender>,
}

impl Collaborators {
    /// Build the collaborators selected by the configured backend
    pub fn from_config(config: &Config) -> Result<Self> {
        let sessions = Arc::new(LocalSessionProvider::new(
            config.browser.artifacts_dir.clone(),
        ));

        match config.browser.backend {
            Backend::Simulated => Ok(Self {
                sessions,
                authenticator: Arc::new(SimulatedAuthenticator::new(&config.simulation)),
                sender: Arc::new(SimulatedSender::new(&config.simulation)),
            }),
            Backend::Http => {
                let relay = Arc::new(HttpRelay::new(&config.relay)?);
                Ok(Self {
                    sessions,
                    authenticator: relay.clone(),
                    sender: relay,
                })
            }
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_classification() {
        assert!(SendError::Transient("timeout".into()).is_retryable());
        assert!(!SendError::Blocked("bob".into()).is_retryable());
        assert_eq!(
            SendError::UserNotFound("ghost".into()).status(),
            MessageStatus::UserNotFound
        );
        assert_eq!(
            SendError::SessionExpired("401".into()).status(),
            MessageStatus::AuthenticationError
        );
        assert_eq!(
            SendError::Transient("timeout".into()).to_string(),
            "timeout"
        );
    }

    #[test]
    fn test_collaborators_from_config() {
        let config = Config::default();
        assert!(Collaborators::from_config(&config).is_ok());

        let mut config = Config::default();
        config.browser.backend = Backend::Http;
        config.relay.url = "http://relay.example.com".to_string();
        assert!(Collaborators::from_config(&config).is_ok());

        config.relay.url = "not a url".to_string();
        assert!(Collaborators::from_config(&config).is_err());
    }
}
