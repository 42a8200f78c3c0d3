use std::sync::Arc;

use async_trait::async_trait;
use local_intercept_sdk::{Invocation, Invoker, RpcError, RpcResult, ServiceUrl};

use super::{DelegateStrategy, RoundRobin};

/// One attempt on one candidate.
#[derive(Debug, Default)]
pub struct FailfastStrategy {
    picker: RoundRobin,
}

#[async_trait]
impl DelegateStrategy for FailfastStrategy {
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
        let invoker = &candidates[index];

        invoker.invoke(invocation).await.map_err(|e| {
            let endpoint = invoker.url().endpoint();
            tracing::debug!(method = %invocation.method_name, endpoint = %endpoint, error = %e, "failfast call failed");
            RpcError::invoke(invocation.method_name.as_str(), endpoint, e)
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use local_intercept_sdk::Endpoint;

    use super::*;

    struct Refusing {
        url: ServiceUrl,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Invoker for Refusing {
        fn url(&self) -> &ServiceUrl {
            &self.url
        }

        async fn invoke(&self, _invocation: &Invocation) -> Result<RpcResult, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RpcError::remote("connection refused"))
        }
    }

    #[tokio::test]
    async fn single_attempt_wrapped_with_endpoint() {
        let invoker = Arc::new(Refusing {
            url: ServiceUrl::new("dubbo", "192.168.1.20", 20880, "svc"),
            calls: AtomicU32::new(0),
        });
        let list: Vec<Arc<dyn Invoker>> = vec![invoker.clone(), invoker.clone()];

        let err = FailfastStrategy::default()
            .invoke(&ServiceUrl::new("consumer", "h", 0, "svc"), &Invocation::new("m"), &list)
            .await
            .unwrap_err();

        assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            err,
            RpcError::invoke(
                "m",
                Endpoint::new("192.168.1.20", 20880),
                RpcError::remote("connection refused")
            )
        );
        assert!(err.is_local_dispatch_failure("192.168.1.20"));
    }
}
