//! Invokers bound to the local endpoint, one per service key.

use std::sync::Arc;

use dashmap::DashMap;
use local_intercept_sdk::{Invoker, ProtocolFactory, RpcError, ServiceUrl};
use tracing::{debug, info};

/// Lazily built local invokers keyed by `interface[-group]`.
pub struct LocalInvokerCache {
    local_host: String,
    invokers: DashMap<String, Arc<dyn Invoker>>,
}

impl LocalInvokerCache {
    #[must_use]
    pub fn new(local_host: impl Into<String>) -> Self {
        Self {
            local_host: local_host.into(),
            invokers: DashMap::new(),
        }
    }

    #[must_use]
    pub fn local_host(&self) -> &str {
        &self.local_host
    }

    /// Cached invoker for `service_key`, building one on first use.
    ///
    /// A new invoker is bound to the local host on the port of `remote`.
    /// Concurrent callers for the same key observe a single construction.
    ///
    /// # Errors
    /// Propagates the factory's error; nothing is cached in that case.
    pub fn get_or_create(
        &self,
        service_key: &str,
        remote: &ServiceUrl,
        factory: &dyn ProtocolFactory,
    ) -> Result<Arc<dyn Invoker>, RpcError> {
        if let Some(cached) = self.invokers.get(service_key) {
            return Ok(Arc::clone(cached.value()));
        }

        let entry = self
            .invokers
            .entry(service_key.to_owned())
            .or_try_insert_with(|| {
                let url = remote.with_host(self.local_host.as_str());
                let invoker = factory.refer(remote.service_interface(), &url)?;
                info!(service_key, url = %url, "created local invoker");
                Ok::<_, RpcError>(invoker)
            })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Forget the invoker for `service_key`. Idempotent.
    #[must_use]
    pub fn remove(&self, service_key: &str) -> bool {
        let removed = self.invokers.remove(service_key).is_some();
        if removed {
            debug!(service_key, "dropped local invoker");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }
}
