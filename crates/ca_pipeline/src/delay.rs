use std::time::Duration;

use async_trait::async_trait;

/// Inter-call pacing between network requests. Injected so the strategy is
/// swappable and tests run without real timers.
#[async_trait]
pub trait DelayPolicy: Send + Sync {
    async fn pause(&self);
}

/// Fixed pause between calls. The default trades latency for staying under
/// the provider's rate/overload limits.
#[derive(Debug, Clone)]
pub struct FixedDelay(Duration);

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self(delay)
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self(Duration::from_secs(2))
    }
}

#[async_trait]
impl DelayPolicy for FixedDelay {
    async fn pause(&self) {
        tokio::time::sleep(self.0).await;
    }
}

/// No pacing at all; for tests and offline backends.
#[derive(Debug, Clone, Default)]
pub struct NoDelay;

#[async_trait]
impl DelayPolicy for NoDelay {
    async fn pause(&self) {}
}
