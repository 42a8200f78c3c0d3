//! Per-invocation routing between a local provider and the remote candidates.
//!
//! Every call lists the remote candidates first. When an announcement covers
//! the service, the call is narrowed to a single invoker bound to this
//! machine. If that dispatch fails because the local endpoint is unreachable,
//! the announcement and the cached invoker are purged and the call is retried
//! once against the remote candidates.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use local_intercept_sdk::{
    CLUSTER_KEY, Directory, Invocation, Invoker, ProtocolFactory, RpcError, RpcResult, ServiceUrl,
};
use tracing::{Instrument, debug, info, warn};

use crate::domain::cluster_name::ClusterName;
use crate::domain::invoker_cache::LocalInvokerCache;
use crate::domain::store::AnnouncementStore;
use crate::domain::strategy::{ClusterStrategy, DelegateStrategy, FailbackPolicy};

/// Key a service is announced and cached under: `interface[-group]`.
#[must_use]
pub fn service_key(url: &ServiceUrl) -> String {
    match url.group() {
        Some(group) => format!("{}-{group}", url.service_interface()),
        None => url.service_interface().to_owned(),
    }
}

/// The announcement that redirected a call, kept so a failure can purge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLookup {
    pub service_key: String,
    pub file: String,
}

/// State scoped to a single call.
#[derive(Default)]
pub struct InvocationContext {
    pending: Option<PendingLookup>,
    remote: Vec<Arc<dyn Invoker>>,
}

impl InvocationContext {
    #[must_use]
    pub fn pending(&self) -> Option<&PendingLookup> {
        self.pending.as_ref()
    }

    /// Remote candidates the directory returned for this call.
    #[must_use]
    pub fn remote(&self) -> &[Arc<dyn Invoker>] {
        &self.remote
    }
}

/// Cluster invoker for one intercepted binding.
pub struct RoutingInvoker {
    directory: Arc<dyn Directory>,
    store: Arc<AnnouncementStore>,
    invokers: Arc<LocalInvokerCache>,
    protocol: Arc<dyn ProtocolFactory>,
    cluster: ClusterName,
    failback: FailbackPolicy,
    strategy: OnceLock<ClusterStrategy>,
}

impl RoutingInvoker {
    /// Bind a routing invoker to `directory`.
    ///
    /// # Errors
    /// Returns [`RpcError::UnsupportedCluster`] when the binding's `cluster`
    /// parameter names an unknown strategy.
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<AnnouncementStore>,
        invokers: Arc<LocalInvokerCache>,
        protocol: Arc<dyn ProtocolFactory>,
        failback: FailbackPolicy,
    ) -> Result<Self, RpcError> {
        let cluster = ClusterName::parse(directory.url().param(CLUSTER_KEY))?;
        debug!(
            url = %directory.url(),
            strategy = %cluster.kind(),
            "bound intercepting invoker"
        );
        Ok(Self {
            directory,
            store,
            invokers,
            protocol,
            cluster,
            failback,
            strategy: OnceLock::new(),
        })
    }

    #[must_use]
    pub fn cluster(&self) -> &ClusterName {
        &self.cluster
    }

    fn strategy(&self) -> &ClusterStrategy {
        self.strategy
            .get_or_init(|| ClusterStrategy::new(self.cluster.kind(), self.failback))
    }

    /// Candidates for `invocation`: a single local invoker when an
    /// announcement covers the service, otherwise the remote list unchanged.
    ///
    /// Records the remote list and any matched announcement in `ctx`.
    ///
    /// # Errors
    /// Propagates directory failures and failures to build the local invoker.
    pub fn list(
        &self,
        invocation: &Invocation,
        ctx: &mut InvocationContext,
    ) -> Result<Vec<Arc<dyn Invoker>>, RpcError> {
        let remote = self.directory.list(invocation)?;
        ctx.remote.clone_from(&remote);
        ctx.pending = None;

        if self.store.is_empty() {
            return Ok(remote);
        }
        let Some(first) = remote.first() else {
            return Ok(remote);
        };

        let key = service_key(first.url());
        let Some(file) = self.store.lookup_match(&key) else {
            return Ok(remote);
        };

        let local = self
            .invokers
            .get_or_create(&key, first.url(), self.protocol.as_ref())?;
        debug!(service_key = %key, file = %file, endpoint = %local.url().endpoint(), "routing call to local provider");
        ctx.pending = Some(PendingLookup {
            service_key: key,
            file,
        });
        Ok(vec![local])
    }

    /// Dispatch `invocation`, recovering once from an unreachable local provider.
    ///
    /// # Errors
    /// Returns the delegate strategy's error. After a local-dispatch failure
    /// this is the error of the remote retry.
    pub async fn invoke_with(
        &self,
        invocation: &Invocation,
        ctx: &mut InvocationContext,
    ) -> Result<RpcResult, RpcError> {
        let candidates = self.list(invocation, ctx)?;
        let url = self.directory.url();

        let outcome = match self.strategy().invoke(url, invocation, &candidates).await {
            Err(e) if e.is_local_dispatch_failure(self.invokers.local_host()) => {
                warn!(
                    method = %invocation.method_name,
                    error = %e,
                    "local provider unreachable, retrying on remote providers"
                );
                if let Some(pending) = ctx.pending.take() {
                    let announcement = self.store.purge(&pending.file);
                    let invoker = self.invokers.remove(&pending.service_key);
                    info!(
                        service_key = %pending.service_key,
                        file = %pending.file,
                        announcement,
                        invoker,
                        "purged local route"
                    );
                }
                self.strategy().invoke(url, invocation, &ctx.remote).await
            }
            other => other,
        };

        ctx.pending = None;
        outcome
    }
}

#[async_trait]
impl Invoker for RoutingInvoker {
    fn url(&self) -> &ServiceUrl {
        self.directory.url()
    }

    async fn invoke(&self, invocation: &Invocation) -> Result<RpcResult, RpcError> {
        let span = tracing::debug_span!(
            "intercept_invoke",
            method = %invocation.method_name,
            cluster = %self.cluster
        );
        let mut ctx = InvocationContext::default();
        self.invoke_with(invocation, &mut ctx).instrument(span).await
    }
}
