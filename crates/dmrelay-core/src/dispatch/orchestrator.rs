//! Dispatch Orchestrator - Drives one run from session setup to report
//!
//! A run walks `Created → BrowserReady → Authenticated → Processing →
//! Finalized`, or ends in `Aborted` from any earlier state. Recipients are
//! processed strictly in order. Only pauses (inter-message delay, retry
//! backoff, simulated test-mode work) observe cancellation; an in-flight
//! collaborator call is left to its own timeout.

use super::progress::{processing_progress, LogProgress, ProgressObserver};
use super::rate_limiter::RateLimiter;
use super::report::{RecipientOutcome, RunReport};
use crate::session::{
    BrowserSession, Collaborators, ProxyResolver, SessionOptions, StaticProxyResolver,
};
use chrono::Utc;
use dmrelay_common::config::DispatchConfig;
use dmrelay_common::types::MessageStatus;
use dmrelay_common::{Error, Result, RunRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const SKIPPED_RATE_LIMIT: &str = "Skipped: rate limit reached earlier in this run";
const SKIPPED_SESSION: &str = "Skipped: session is no longer valid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Created,
    BrowserReady,
    Authenticated,
    Processing,
    Finalized,
    Aborted,
}

/// Executes one run request against a set of collaborators
pub struct Orchestrator {
    request: RunRequest,
    collaborators: Collaborators,
    proxy_resolver: Arc<dyn ProxyResolver>,
    progress: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
    backoff_base: Duration,
    test_mode_delay: Duration,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(request: RunRequest, config: &DispatchConfig, collaborators: Collaborators) -> Self {
        let proxy_config = request.proxy_configuration().cloned().unwrap_or_default();

        Self {
            proxy_resolver: Arc::new(StaticProxyResolver::new(&proxy_config)),
            request,
            collaborators,
            progress: Arc::new(LogProgress),
            cancel: CancellationToken::new(),
            backoff_base: Duration::from_secs(config.backoff_base_secs),
            test_mode_delay: Duration::from_millis(config.test_mode_delay_ms),
        }
    }

    /// Report progress to `observer` instead of the log
    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = observer;
        self
    }

    /// Override the proxy resolver derived from the request
    pub fn with_proxy_resolver(mut self, resolver: Arc<dyn ProxyResolver>) -> Self {
        self.proxy_resolver = resolver;
        self
    }

    /// Observe an external cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the run
    ///
    /// Never fails: run-level problems end up in the report's `error`.
    pub async fn run(self) -> RunReport {
        let mut report = RunReport::new(Utc::now());
        let mut limiter = RateLimiter::from_request(&self.request);
        let mut state = RunState::Created;

        info!(
            recipients = self.request.usernames().len(),
            test_mode = self.request.test_mode(),
            max_retries = self.request.max_retries(),
            "Starting DM run"
        );
        self.progress.on_progress(10);

        match self.open_session().await {
            Ok(session) => {
                self.advance(&mut state, RunState::BrowserReady);
                self.progress.on_progress(20);

                match self
                    .drive(&session, &mut limiter, &mut report, &mut state)
                    .await
                {
                    Ok(()) => self.progress.on_progress(90),
                    Err(e) => self.abort(&mut state, &mut report, &e),
                }

                self.release(session, &mut report).await;
            }
            Err(e) => self.abort(&mut state, &mut report, &e),
        }

        report.rate_limit_hits = limiter.rate_limit_hits();
        report.messages_remaining_today = Some(limiter.remaining_daily_quota());
        report.finalize(Utc::now());
        if state != RunState::Aborted {
            self.advance(&mut state, RunState::Finalized);
        }
        self.progress.on_progress(100);

        info!(
            success = report.success,
            attempted = report.total_attempted,
            succeeded = report.successful_sends,
            failed = report.failed_sends,
            skipped = report.skipped_sends,
            runtime_seconds = report.runtime_seconds,
            "DM run finished"
        );

        report
    }

    async fn open_session(&self) -> Result<BrowserSession> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        info!("Initializing browser session");
        let proxy = self.proxy_resolver.resolve().await.map_err(into_resource)?;
        let options = SessionOptions {
            headless: self.request.headless(),
            proxy,
            debug_artifacts: self.request.save_screenshots(),
            timeout: Duration::from_secs(self.request.timeout_seconds()),
        };

        self.collaborators
            .sessions
            .create(options)
            .await
            .map_err(into_resource)
    }

    async fn drive(
        &self,
        session: &BrowserSession,
        limiter: &mut RateLimiter,
        report: &mut RunReport,
        state: &mut RunState,
    ) -> Result<()> {
        self.authenticate(session).await?;
        report.session_valid = true;
        self.advance(state, RunState::Authenticated);
        self.progress.on_progress(40);

        self.advance(state, RunState::Processing);
        self.process_recipients(session, limiter, report).await
    }

    async fn authenticate(&self, session: &BrowserSession) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        info!(session_id = %session.id(), "Authenticating");
        let authenticator = &self.collaborators.authenticator;

        let accepted = authenticator
            .authenticate(session, self.request.session_id())
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Authentication error");
                false
            });
        if !accepted {
            return Err(authentication_failed());
        }

        let valid = authenticator.validate(session).await.unwrap_or_else(|e| {
            error!(error = %e, "Session validation error");
            false
        });
        if !valid {
            return Err(authentication_failed());
        }

        info!("Authentication successful");
        Ok(())
    }

    async fn process_recipients(
        &self,
        session: &BrowserSession,
        limiter: &mut RateLimiter,
        report: &mut RunReport,
    ) -> Result<()> {
        let recipients = self.request.usernames();
        let total = recipients.len();
        let mut stop_reason: Option<&'static str> = None;

        for (index, username) in recipients.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if let Some(reason) = stop_reason {
                debug!(recipient = %username, reason, "Recipient skipped");
                report.add_result(RecipientOutcome::not_sent(
                    MessageStatus::Skipped,
                    username.as_str(),
                    self.request.message(),
                    reason,
                    0,
                    Duration::ZERO,
                ));
                continue;
            }

            self.progress.on_progress(processing_progress(index, total));
            let outcome = self
                .process_recipient(session, username, index + 1, total, limiter)
                .await?;

            match outcome.status {
                MessageStatus::RateLimited => {
                    warn!("Stopping message processing: rate limit reached");
                    stop_reason = Some(SKIPPED_RATE_LIMIT);
                }
                MessageStatus::AuthenticationError => {
                    error!("Stopping message processing: session is no longer valid");
                    report.session_valid = false;
                    stop_reason = Some(SKIPPED_SESSION);
                }
                _ => {}
            }
            report.add_result(outcome);

            if index + 1 < total && stop_reason.is_none() {
                let delay = limiter.next_delay();
                info!("Waiting {} seconds before next message", delay.as_secs());
                self.pause(delay).await?;
            }
        }

        Ok(())
    }

    async fn process_recipient(
        &self,
        session: &BrowserSession,
        username: &str,
        position: usize,
        total: usize,
        limiter: &mut RateLimiter,
    ) -> Result<RecipientOutcome> {
        let started = Instant::now();
        let message = self.request.message();
        info!(recipient = username, "({}/{}) Processing recipient", position, total);

        if !limiter.can_send() {
            limiter.record_rejection();
            warn!(recipient = username, "Rate limit exceeded");
            return Ok(RecipientOutcome::not_sent(
                MessageStatus::RateLimited,
                username,
                message,
                "Rate limit exceeded",
                0,
                started.elapsed(),
            ));
        }

        if self.request.test_mode() {
            info!(recipient = username, "Test mode: simulating message send");
            self.pause(self.test_mode_delay).await?;
            return Ok(RecipientOutcome::sent(username, message, 0, started.elapsed()));
        }

        let max_attempts = self.request.max_retries();
        let mut last_error = String::from("Message sending failed");

        for attempt in 0..max_attempts {
            match self.collaborators.sender.send(session, username, message).await {
                Ok(true) => {
                    limiter.record_sent();
                    info!(recipient = username, retry_count = attempt, "Message sent");
                    return Ok(RecipientOutcome::sent(
                        username,
                        message,
                        attempt,
                        started.elapsed(),
                    ));
                }
                Ok(false) => last_error = String::from("Message sending failed"),
                Err(e) if e.is_retryable() => last_error = e.to_string(),
                Err(e) => {
                    warn!(recipient = username, error = %e, "Message not deliverable");
                    return Ok(RecipientOutcome::not_sent(
                        e.status(),
                        username,
                        message,
                        e.to_string(),
                        attempt,
                        started.elapsed(),
                    ));
                }
            }

            warn!(
                recipient = username,
                attempt = attempt + 1,
                error = %last_error,
                "Send attempt failed"
            );
            if attempt + 1 < max_attempts {
                self.pause(calculate_backoff(self.backoff_base, attempt + 1))
                    .await?;
            }
        }

        error!(
            recipient = username,
            attempts = max_attempts,
            "Failed to send message after all attempts"
        );
        Ok(RecipientOutcome::not_sent(
            MessageStatus::Failed,
            username,
            message,
            last_error,
            max_attempts.saturating_sub(1),
            started.elapsed(),
        ))
    }

    async fn release(&self, session: BrowserSession, report: &mut RunReport) {
        let id = session.id();
        if let Err(e) = self.collaborators.sessions.release(session).await {
            warn!(session_id = %id, error = %e, "Failed to release browser session");
            report.warn(format!("Failed to release browser session: {}", e));
        }
    }

    /// Sleep unless the run is cancelled first
    async fn pause(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn abort(&self, state: &mut RunState, report: &mut RunReport, cause: &Error) {
        let message = match cause {
            Error::Authentication(msg) => msg.clone(),
            Error::Resource(msg) => format!("Failed to initialize browser: {}", msg),
            other => other.to_string(),
        };
        error!(code = cause.code(), "Run aborted: {}", message);
        report.fail(message);
        self.advance(state, RunState::Aborted);
    }

    fn advance(&self, state: &mut RunState, next: RunState) {
        debug!("Run state {:?} -> {:?}", state, next);
        *state = next;
    }
}

/// Backoff before retry number `attempt` (1-based): linear in the attempt
fn calculate_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

fn authentication_failed() -> Error {
    Error::Authentication("Authentication failed".to_string())
}

fn into_resource(error: Error) -> Error {
    match error {
        Error::Resource(_) | Error::Cancelled => error,
        other => Error::Resource(other.to_string()),
    }
}
