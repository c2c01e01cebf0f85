//! Dispatch Module - Sequential DM runs with rate limiting and retries

mod orchestrator;
mod progress;
mod rate_limiter;
mod report;

pub use orchestrator::Orchestrator;
pub use progress::{LogProgress, ProgressObserver};
pub use rate_limiter::{RateLimiter, RemainingQuota};
pub use report::{RecipientOutcome, RunReport, RunSummary};
