use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;
use tokio::time::{timeout_at, Instant};

/// Wall-clock budget fixed once at process start and shared by every
/// database round trip and the generation call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Longest budget honoured; longer ones are clamped.
    pub const MAX_BUDGET: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(budget.min(Self::MAX_BUDGET))
            .unwrap_or(now);
        Self { at }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_elapsed(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Runs `fut` until it completes or the deadline passes, whichever is first.
    /// On expiry the future is dropped.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        timeout_at(self.at, fut).await
    }
}
