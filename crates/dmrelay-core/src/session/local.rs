//! Local session provider

use super::{BrowserSession, SessionOptions, SessionProvider};
use async_trait::async_trait;
use dmrelay_common::{Error, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Allocates session handles in-process
pub struct LocalSessionProvider {
    artifacts_root: PathBuf,
}

impl LocalSessionProvider {
    /// Create a new provider writing debug artifacts under `artifacts_root`
    pub fn new(artifacts_root: PathBuf) -> Self {
        Self { artifacts_root }
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    async fn create(&self, options: SessionOptions) -> Result<BrowserSession> {
        let debug_artifacts = options.debug_artifacts;
        let proxy = options.proxy.as_ref().map(|p| p.to_string());
        let mut session = BrowserSession::new(options);

        if debug_artifacts {
            let dir = self.artifacts_root.join(session.id().to_string());
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                Error::Resource(format!(
                    "Failed to create artifacts directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            session = session.with_artifacts_dir(dir);
        }

        info!(
            session_id = %session.id(),
            headless = session.options().headless,
            proxy = proxy.as_deref().unwrap_or("none"),
            "Browser session created"
        );

        Ok(session)
    }

    async fn release(&self, session: BrowserSession) -> Result<()> {
        debug!(session_id = %session.id(), "Browser session released");
        Ok(())
    }
}
