use std::sync::Arc;

use async_trait::async_trait;
use local_intercept_sdk::{Endpoint, Invocation, Invoker, RpcError, RpcResult, ServiceUrl};
use tracing::Instrument;

use super::{DelegateStrategy, RoundRobin};

/// Retries failed calls on other candidates, `retries + 1` attempts in total.
#[derive(Debug, Default)]
pub struct FailoverStrategy {
    picker: RoundRobin,
}

#[async_trait]
impl DelegateStrategy for FailoverStrategy {
    async fn invoke(
        &self,
        url: &ServiceUrl,
        invocation: &Invocation,
        candidates: &[Arc<dyn Invoker>],
    ) -> Result<RpcResult, RpcError> {
        let method = invocation.method_name.as_str();
        let max_attempts = url.retries().saturating_add(1);
        let mut tried = Vec::new();
        let mut endpoints: Vec<Endpoint> = Vec::new();
        let mut last = RpcError::no_provider(url.service_interface());

        for attempt in 1..=max_attempts {
            let Some(index) = self.picker.pick(candidates, &tried) else {
                return Err(RpcError::no_provider(url.service_interface()));
            };
            let invoker = &candidates[index];
            let endpoint = invoker.url().endpoint();

            let span = tracing::debug_span!("failover_call", method, attempt, endpoint = %endpoint);
            match invoker.invoke(invocation).instrument(span).await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(method, attempt, endpoint = %endpoint, "call succeeded after failover");
                    }
                    return Ok(result);
                }
                Err(e) if e.is_business() => return Err(e),
                Err(e) => {
                    tracing::warn!(method, attempt, endpoint = %endpoint, error = %e, "call failed");
                    tried.push(index);
                    if !endpoints.contains(&endpoint) {
                        endpoints.push(endpoint.clone());
                    }
                    last = RpcError::invoke(method, endpoint, e);
                }
            }
        }

        Err(RpcError::Exhausted {
            method: method.to_owned(),
            attempts: max_attempts,
            endpoints,
            last: Box::new(last),
        })
    }
}
