//! Run Report - Per-recipient outcomes and run statistics

use chrono::Utc;
use dmrelay_common::types::{MessageStatus, Timestamp, Username};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Terminal result for one recipient within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub username: Username,
    pub message: String,
    pub status: MessageStatus,
    pub success: bool,
    pub timestamp: Timestamp,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub processing_time_ms: u64,
}

impl RecipientOutcome {
    /// A delivered message
    pub fn sent(
        username: impl Into<Username>,
        message: impl Into<String>,
        retry_count: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
            status: MessageStatus::Success,
            success: true,
            timestamp: Utc::now(),
            error_message: None,
            retry_count,
            processing_time_ms: elapsed.as_millis() as u64,
        }
    }

    /// An undelivered message with the given status
    pub fn not_sent(
        status: MessageStatus,
        username: impl Into<Username>,
        message: impl Into<String>,
        error: impl Into<String>,
        retry_count: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
            status,
            success: false,
            timestamp: Utc::now(),
            error_message: Some(error.into()),
            retry_count,
            processing_time_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Results of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub success: bool,
    pub total_attempted: u32,
    pub successful_sends: u32,
    pub failed_sends: u32,
    pub skipped_sends: u32,

    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub runtime_seconds: f64,

    /// Outcomes in processing order
    pub results: Vec<RecipientOutcome>,

    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,

    pub average_processing_time_ms: f64,
    pub rate_limit_hits: u32,
    pub session_valid: bool,
    pub messages_remaining_today: Option<u32>,
}

impl RunReport {
    /// Create an empty report for a run starting at `start_time`
    pub fn new(start_time: Timestamp) -> Self {
        Self {
            success: false,
            total_attempted: 0,
            successful_sends: 0,
            failed_sends: 0,
            skipped_sends: 0,
            start_time,
            end_time: start_time,
            runtime_seconds: 0.0,
            results: Vec::new(),
            error: None,
            warnings: Vec::new(),
            average_processing_time_ms: 0.0,
            rate_limit_hits: 0,
            session_valid: false,
            messages_remaining_today: None,
        }
    }

    /// Append an outcome and update the running statistics
    ///
    /// Skipped recipients were never attempted and only count as skipped.
    pub fn add_result(&mut self, outcome: RecipientOutcome) {
        if outcome.status.is_attempted() {
            self.total_attempted += 1;
            if outcome.success {
                self.successful_sends += 1;
            } else {
                self.failed_sends += 1;
            }
        } else {
            self.skipped_sends += 1;
        }

        self.results.push(outcome);
        self.average_processing_time_ms = self.mean_processing_time();
    }

    /// Record a run-level error
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Record a non-fatal warning
    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Close the report at `end_time`
    ///
    /// A run succeeds when something was attempted, nothing failed and no
    /// run-level error was recorded.
    pub fn finalize(&mut self, end_time: Timestamp) {
        self.end_time = end_time;
        self.runtime_seconds = (end_time - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        self.success = self.failed_sends == 0 && self.total_attempted > 0 && self.error.is_none();
        self.average_processing_time_ms = self.mean_processing_time();
    }

    /// Outcome recorded for a recipient, if any
    pub fn outcome_for(&self, username: &str) -> Option<&RecipientOutcome> {
        self.results.iter().find(|r| r.username == username)
    }

    /// Number of outcomes with the given status
    pub fn count_status(&self, status: MessageStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Quick overview of the run
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            success: self.success,
            total_attempted: self.total_attempted,
            successful_sends: self.successful_sends,
            failed_sends: self.failed_sends,
            skipped_sends: self.skipped_sends,
            runtime_seconds: self.runtime_seconds,
            average_processing_time_ms: self.average_processing_time_ms,
            session_valid: self.session_valid,
        }
    }

    fn mean_processing_time(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let total: u64 = self.results.iter().map(|r| r.processing_time_ms).sum();
        total as f64 / self.results.len() as f64
    }
}

/// Summary statistics of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success: bool,
    pub total_attempted: u32,
    pub successful_sends: u32,
    pub failed_sends: u32,
    pub skipped_sends: u32,
    pub runtime_seconds: f64,
    pub average_processing_time_ms: f64,
    pub session_valid: bool,
}
