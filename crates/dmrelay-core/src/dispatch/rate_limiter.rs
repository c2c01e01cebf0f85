//! Rate Limiter - Controls the sending rate of a single run

use chrono::{DateTime, Duration, Utc};
use dmrelay_common::RunRequest;
use std::collections::VecDeque;
use std::time::Duration as StdDuration;
use tracing::debug;

/// Sliding-window rate limiter with hourly and daily caps
///
/// Owned by exactly one run. Only confirmed sends are recorded, so failed
/// attempts never count against a cap.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_per_hour: u32,
    max_per_day: u32,
    delay_between: StdDuration,
    /// Send timestamps, oldest first
    sent_times: VecDeque<DateTime<Utc>>,
    rate_limit_hits: u32,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(max_per_hour: u32, max_per_day: u32, delay_between: StdDuration) -> Self {
        Self {
            max_per_hour,
            max_per_day,
            delay_between,
            sent_times: VecDeque::new(),
            rate_limit_hits: 0,
        }
    }

    /// Create a rate limiter from the caps of a run request
    pub fn from_request(request: &RunRequest) -> Self {
        Self::new(
            request.max_messages_per_hour(),
            request.max_messages_per_day(),
            StdDuration::from_secs(request.delay_between_messages()),
        )
    }

    /// Check if sending is allowed right now
    pub fn can_send(&mut self) -> bool {
        self.can_send_at(Utc::now())
    }

    /// Check if sending is allowed at `now`
    pub fn can_send_at(&mut self, now: DateTime<Utc>) -> bool {
        self.prune(now);

        let day_count = self.sent_times.len() as u32;
        if day_count >= self.max_per_day {
            debug!("Rate limit hit (day): {} >= {}", day_count, self.max_per_day);
            return false;
        }

        let hour_count = self.count_within(now, Duration::hours(1));
        if hour_count >= self.max_per_hour {
            debug!("Rate limit hit (hour): {} >= {}", hour_count, self.max_per_hour);
            return false;
        }

        true
    }

    /// Record a confirmed send
    pub fn record_sent(&mut self) {
        self.record_sent_at(Utc::now());
    }

    /// Record a confirmed send at `at`
    pub fn record_sent_at(&mut self, at: DateTime<Utc>) {
        self.sent_times.push_back(at);
    }

    /// Record that a recipient was turned away by a cap
    pub fn record_rejection(&mut self) {
        self.rate_limit_hits += 1;
    }

    /// Number of rejections so far
    pub fn rate_limit_hits(&self) -> u32 {
        self.rate_limit_hits
    }

    /// Delay to wait before the next recipient
    pub fn next_delay(&self) -> StdDuration {
        self.delay_between
    }

    /// Remaining sends allowed in the trailing 24 hours
    pub fn remaining_daily_quota(&self) -> u32 {
        self.remaining_at(Utc::now()).per_day
    }

    /// Get remaining quota
    pub fn remaining(&self) -> RemainingQuota {
        self.remaining_at(Utc::now())
    }

    /// Get remaining quota at `now`
    pub fn remaining_at(&self, now: DateTime<Utc>) -> RemainingQuota {
        let hour_count = self.count_within(now, Duration::hours(1));
        let day_count = self.count_within(now, Duration::days(1));

        RemainingQuota {
            per_hour: self.max_per_hour.saturating_sub(hour_count),
            per_day: self.max_per_day.saturating_sub(day_count),
        }
    }

    /// Drop timestamps that fell out of the daily window
    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(oldest) = self.sent_times.front() {
            if now - *oldest >= Duration::days(1) {
                self.sent_times.pop_front();
            } else {
                break;
            }
        }
    }

    fn count_within(&self, now: DateTime<Utc>, window: Duration) -> u32 {
        self.sent_times
            .iter()
            .filter(|t| now - **t < window)
            .count() as u32
    }
}

/// Remaining quota for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingQuota {
    pub per_hour: u32,
    pub per_day: u32,
}

impl RemainingQuota {
    /// Get the minimum remaining across all windows
    pub fn min(&self) -> u32 {
        self.per_hour.min(self.per_day)
    }
}
