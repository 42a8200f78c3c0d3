//! Cluster provider handed to the host framework.

use std::sync::Arc;

use local_intercept_sdk::{ClusterProvider, Directory, Invoker, ProtocolFactory, RpcError};

use crate::config::LocalInterceptConfig;
use crate::domain::cluster_name::INTERCEPT_PREFIX;
use crate::domain::error::StoreError;
use crate::domain::invoker_cache::LocalInvokerCache;
use crate::domain::routing::RoutingInvoker;
use crate::domain::store::AnnouncementStore;
use crate::domain::strategy::FailbackPolicy;
use crate::local_host;

/// Joins intercepted bindings into [`RoutingInvoker`]s.
///
/// All bindings share one announcement store and one local invoker cache.
pub struct InterceptCluster {
    store: Arc<AnnouncementStore>,
    invokers: Arc<LocalInvokerCache>,
    protocol: Arc<dyn ProtocolFactory>,
    failback: FailbackPolicy,
}

impl InterceptCluster {
    /// Build a cluster from validated configuration.
    ///
    /// # Errors
    /// Returns an error if `cfg` fails [`LocalInterceptConfig::validate`].
    pub fn new(cfg: &LocalInterceptConfig, protocol: Arc<dyn ProtocolFactory>) -> anyhow::Result<Self> {
        cfg.validate()?;
        let local_host = local_host::resolve(cfg.local_host.as_deref());
        tracing::info!(
            local_host = %local_host,
            dir = %cfg.announce_dir.display(),
            "local intercept configured"
        );
        Ok(Self::with_parts(
            Arc::new(AnnouncementStore::from_config(cfg)),
            Arc::new(LocalInvokerCache::new(local_host)),
            protocol,
            FailbackPolicy::from(cfg),
        ))
    }

    #[must_use]
    pub fn with_parts(
        store: Arc<AnnouncementStore>,
        invokers: Arc<LocalInvokerCache>,
        protocol: Arc<dyn ProtocolFactory>,
        failback: FailbackPolicy,
    ) -> Self {
        Self {
            store,
            invokers,
            protocol,
            failback,
        }
    }

    /// Start watching the announcement directory.
    ///
    /// # Errors
    /// Returns [`StoreError::ZeroInterval`] for a zero scan interval and
    /// [`StoreError::NoRuntime`] outside a Tokio runtime.
    pub fn start(&self) -> Result<(), StoreError> {
        self.store.start()
    }

    pub async fn stop(&self) {
        self.store.stop().await;
    }

    #[must_use]
    pub fn store(&self) -> &Arc<AnnouncementStore> {
        &self.store
    }

    #[must_use]
    pub fn invokers(&self) -> &Arc<LocalInvokerCache> {
        &self.invokers
    }

    /// Build the routing invoker for one binding.
    ///
    /// # Errors
    /// Returns [`RpcError::UnsupportedCluster`] for an unknown strategy name.
    pub fn bind(&self, directory: Arc<dyn Directory>) -> Result<RoutingInvoker, RpcError> {
        RoutingInvoker::new(
            directory,
            Arc::clone(&self.store),
            Arc::clone(&self.invokers),
            Arc::clone(&self.protocol),
            self.failback,
        )
        .inspect_err(|e| tracing::error!(error = %e, "rejected intercepted binding"))
    }
}

impl ClusterProvider for InterceptCluster {
    fn prefix(&self) -> &str {
        INTERCEPT_PREFIX
    }

    fn join(&self, directory: Arc<dyn Directory>) -> Result<Arc<dyn Invoker>, RpcError> {
        Ok(Arc::new(self.bind(directory)?))
    }
}
