//! Delegate strategies: how a call is dispatched over a candidate list.
//!
//! Routing decides *which* candidates a call sees; the strategy decides how
//! failures among them are handled.

mod failback;
mod failfast;
mod failover;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use local_intercept_sdk::{Invocation, Invoker, RpcError, RpcResult, ServiceUrl};

pub use failback::FailbackStrategy;
pub use failfast::FailfastStrategy;
pub use failover::FailoverStrategy;

use crate::config::LocalInterceptConfig;
use crate::domain::cluster_name::StrategyKind;

/// Dispatch of one invocation over a candidate list.
#[async_trait]
pub trait DelegateStrategy: Send + Sync {
    /// Invoke `invocation` on one or more of `candidates`.
    ///
    /// `url` is the consumer binding; it supplies the retry budget and the
    /// service name for error reports.
    ///
    /// # Errors
    /// Returns [`RpcError::NoProvider`] for an empty candidate list, otherwise
    /// the strategy-specific failure.
    async fn invoke(
        &self,
        url: &ServiceUrl,
        invocation: &Invocation,
        candidates: &[Arc<dyn Invoker>],
    ) -> Result<RpcResult, RpcError>;
}

/// Background retry settings for [`FailbackStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailbackPolicy {
    pub retry_interval: Duration,
    pub max_retries: u32,
}

impl Default for FailbackPolicy {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

impl FailbackPolicy {
    /// Shortest period the retry loop ticks at.
    pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

    /// Retry period actually used, never zero.
    #[must_use]
    pub fn retry_period(&self) -> Duration {
        self.retry_interval.max(Self::MIN_RETRY_INTERVAL)
    }
}

impl From<&LocalInterceptConfig> for FailbackPolicy {
    fn from(cfg: &LocalInterceptConfig) -> Self {
        Self {
            retry_interval: cfg.failback_retry_interval,
            max_retries: cfg.failback_max_retries,
        }
    }
}

/// The resolved strategy of one routing invoker.
pub enum ClusterStrategy {
    Failover(FailoverStrategy),
    Failfast(FailfastStrategy),
    Failback(FailbackStrategy),
}

impl ClusterStrategy {
    #[must_use]
    pub fn new(kind: StrategyKind, failback: FailbackPolicy) -> Self {
        match kind {
            StrategyKind::Failover => Self::Failover(FailoverStrategy::default()),
            StrategyKind::Failfast => Self::Failfast(FailfastStrategy::default()),
            StrategyKind::Failback => Self::Failback(FailbackStrategy::new(failback)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Failover(_) => StrategyKind::Failover,
            Self::Failfast(_) => StrategyKind::Failfast,
            Self::Failback(_) => StrategyKind::Failback,
        }
    }
}

#[async_trait]
impl DelegateStrategy for ClusterStrategy {
    async fn invoke(
        &self,
        url: &ServiceUrl,
        invocation: &Invocation,
        candidates: &[Arc<dyn Invoker>],
    ) -> Result<RpcResult, RpcError> {
        match self {
            Self::Failover(s) => s.invoke(url, invocation, candidates).await,
            Self::Failfast(s) => s.invoke(url, invocation, candidates).await,
            Self::Failback(s) => s.invoke(url, invocation, candidates).await,
        }
    }
}

/// Round-robin candidate picker.
///
/// Prefers candidates that are available and not in `tried`, then any
/// untried one, then whichever the rotation points at.
#[derive(Debug, Default)]
pub(crate) struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    #[must_use]
    pub(crate) fn pick(&self, candidates: &[Arc<dyn Invoker>], tried: &[usize]) -> Option<usize> {
        let len = candidates.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        let rotation = || (0..len).map(|offset| (start + offset) % len);

        rotation()
            .find(|i| !tried.contains(i) && candidates[*i].is_available())
            .or_else(|| rotation().find(|i| !tried.contains(i)))
            .or(Some(start))
    }
}
