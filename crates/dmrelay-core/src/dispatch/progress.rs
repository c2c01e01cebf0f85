//! Progress reporting

use tracing::info;

/// Receives advisory completion percentages during a run
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: u8);
}

impl<F> ProgressObserver for F
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

/// Logs progress milestones
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, percent: u8) {
        info!(percent, "Run progress");
    }
}

/// Percentage shown before processing recipient `index` of `total`
pub(crate) fn processing_progress(index: usize, total: usize) -> u8 {
    const BASE: usize = 40;
    const RANGE: usize = 50;

    if total == 0 {
        return BASE as u8;
    }
    (BASE + index * RANGE / total) as u8
}
