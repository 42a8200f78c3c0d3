use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use local_intercept_sdk::{Invocation, Invoker, RpcError, RpcResult, ServiceUrl};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DelegateStrategy, FailbackPolicy, RoundRobin};

struct FailedCall {
    invocation: Invocation,
    candidates: Vec<Arc<dyn Invoker>>,
    retries: u32,
}

type RetryQueue = Arc<Mutex<Vec<FailedCall>>>;

/// One attempt; failures are queued for background retry and the caller
/// receives an empty result.
///
/// The retry task starts with the first failure and stops when the strategy
/// is dropped.
pub struct FailbackStrategy {
    policy: FailbackPolicy,
    picker: RoundRobin,
    queue: RetryQueue,
    retry_started: AtomicBool,
    cancel: CancellationToken,
}

impl FailbackStrategy {
    #[must_use]
    pub fn new(policy: FailbackPolicy) -> Self {
        Self {
            policy,
            picker: RoundRobin::default(),
            queue: Arc::new(Mutex::new(Vec::new())),
            retry_started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Calls waiting for a background retry.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    fn enqueue(&self, call: FailedCall) {
        self.queue.lock().push(call);
        if self
            .retry_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tokio::spawn(run_retry_loop(
                Arc::clone(&self.queue),
                self.policy,
                self.cancel.clone(),
            ));
        }
    }
}

impl Drop for FailbackStrategy {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl DelegateStrategy for FailbackStrategy {
    async fn invoke(
        &self,
        url: &ServiceUrl,
        invocation: &Invocation,
        candidates: &[Arc<dyn Invoker>],
    ) -> Result<RpcResult, RpcError> {
        let index = self
            .picker
            .pick(candidates, &[])
            .ok_or_else(|| RpcError::no_provider(url.service_interface()))?;

        match candidates[index].invoke(invocation).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_business() => Err(e),
            Err(e) => {
                warn!(
                    method = %invocation.method_name,
                    endpoint = %candidates[index].url().endpoint(),
                    error = %e,
                    "call failed, queued for background retry"
                );
                self.enqueue(FailedCall {
                    invocation: invocation.clone(),
                    candidates: candidates.to_vec(),
                    retries: 0,
                });
                Ok(RpcResult::empty())
            }
        }
    }
}

async fn run_retry_loop(queue: RetryQueue, policy: FailbackPolicy, cancel: CancellationToken) {
    let picker = RoundRobin::default();
    let period = policy.retry_period();
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("failback retry task shutting down");
                break;
            }
            _ = interval.tick() => {
                let batch = std::mem::take(&mut *queue.lock());
                let mut still_failing = Vec::new();
                for mut call in batch {
                    let Some(index) = picker.pick(&call.candidates, &[]) else {
                        continue;
                    };
                    call.retries += 1;
                    match call.candidates[index].invoke(&call.invocation).await {
                        Ok(_) => info!(
                            method = %call.invocation.method_name,
                            retries = call.retries,
                            "failback retry succeeded"
                        ),
                        Err(e) if call.retries >= policy.max_retries || e.is_business() => warn!(
                            method = %call.invocation.method_name,
                            retries = call.retries,
                            error = %e,
                            "failback retry gave up"
                        ),
                        Err(e) => {
                            debug!(method = %call.invocation.method_name, error = %e, "failback retry failed");
                            still_failing.push(call);
                        }
                    }
                }
                queue.lock().extend(still_failing);
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use super::*;

    struct Flaky {
        url: ServiceUrl,
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl Invoker for Flaky {
        fn url(&self) -> &ServiceUrl {
            &self.url
        }

        async fn invoke(&self, _invocation: &Invocation) -> Result<RpcResult, RpcError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(RpcError::remote("connection reset"))
            } else {
                Ok(RpcResult::new(serde_json::json!("ok")))
            }
        }
    }

    fn flaky(failures: u32) -> Arc<Flaky> {
        Arc::new(Flaky {
            url: ServiceUrl::new("dubbo", "10.0.0.5", 20880, "svc"),
            calls: AtomicU32::new(0),
            failures,
        })
    }

    fn policy() -> FailbackPolicy {
        FailbackPolicy {
            retry_interval: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_swallowed_and_retried_later() {
        let invoker = flaky(1);
        let list: Vec<Arc<dyn Invoker>> = vec![invoker.clone()];
        let strategy = FailbackStrategy::new(policy());

        let result = strategy
            .invoke(&ServiceUrl::new("consumer", "h", 0, "svc"), &Invocation::new("m"), &list)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(strategy.pending(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);
        assert_eq!(strategy.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let invoker = flaky(u32::MAX);
        let list: Vec<Arc<dyn Invoker>> = vec![invoker.clone()];
        let strategy = FailbackStrategy::new(policy());

        strategy
            .invoke(&ServiceUrl::new("consumer", "h", 0, "svc"), &Invocation::new("m"), &list)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(invoker.calls.load(Ordering::SeqCst), 4);
        assert_eq!(strategy.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_interval_still_retries() {
        let invoker = flaky(1);
        let list: Vec<Arc<dyn Invoker>> = vec![invoker.clone()];
        let strategy = FailbackStrategy::new(FailbackPolicy {
            retry_interval: Duration::ZERO,
            max_retries: 3,
        });

        let result = strategy
            .invoke(&ServiceUrl::new("consumer", "h", 0, "svc"), &Invocation::new("m"), &list)
            .await
            .unwrap();
        assert!(result.is_empty());

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);
        assert_eq!(strategy.pending(), 0);
    }

    #[tokio::test]
    async fn business_error_is_returned() {
        struct Rejecting(ServiceUrl);

        #[async_trait]
        impl Invoker for Rejecting {
            fn url(&self) -> &ServiceUrl {
                &self.0
            }

            async fn invoke(&self, _invocation: &Invocation) -> Result<RpcResult, RpcError> {
                Err(RpcError::business("invalid order"))
            }
        }

        let list: Vec<Arc<dyn Invoker>> =
            vec![Arc::new(Rejecting(ServiceUrl::new("dubbo", "h", 1, "svc")))];
        let strategy = FailbackStrategy::new(policy());

        let err = strategy
            .invoke(&ServiceUrl::new("consumer", "h", 0, "svc"), &Invocation::new("m"), &list)
            .await
            .unwrap_err();
        assert!(err.is_business());
        assert_eq!(strategy.pending(), 0);
    }
}
