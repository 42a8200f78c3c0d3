//! Contract traits between the interception engine and its host framework.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RpcError;
use crate::models::{Invocation, RpcResult, ServiceUrl};

/// A bound, callable handle to one service endpoint (or to a cluster of them).
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Endpoint this invoker is bound to.
    fn url(&self) -> &ServiceUrl;

    /// Whether the invoker currently accepts calls.
    fn is_available(&self) -> bool {
        true
    }

    /// Execute `invocation` against the bound endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] describing the transport or provider failure.
    async fn invoke(&self, invocation: &Invocation) -> Result<RpcResult, RpcError>;
}

/// Service-discovery view supplying remote candidates for a binding.
pub trait Directory: Send + Sync {
    /// Consumer-side URL of the binding, carrying the `cluster` parameter.
    fn url(&self) -> &ServiceUrl;

    /// Current remote candidates for `invocation`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the registry view cannot be produced.
    fn list(&self, invocation: &Invocation) -> Result<Vec<Arc<dyn Invoker>>, RpcError>;
}

/// Builds invokers bound to a given endpoint.
pub trait ProtocolFactory: Send + Sync {
    /// Create a new invoker for `interface` bound to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Refer`] when the endpoint cannot be referred.
    fn refer(&self, interface: &str, url: &ServiceUrl) -> Result<Arc<dyn Invoker>, RpcError>;
}

/// Pluggable cluster policy the host framework hands bindings to.
pub trait ClusterProvider: Send + Sync {
    /// Cluster-name prefix this provider answers for.
    fn prefix(&self) -> &str;

    /// Whether a binding requesting `cluster` should be joined by this provider.
    fn handles(&self, cluster: &str) -> bool {
        cluster.starts_with(self.prefix())
    }

    /// Wrap `directory` into a single invoker applying this cluster's policy.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::UnsupportedCluster`] when the binding's cluster
    /// name cannot be resolved.
    fn join(&self, directory: Arc<dyn Directory>) -> Result<Arc<dyn Invoker>, RpcError>;
}
