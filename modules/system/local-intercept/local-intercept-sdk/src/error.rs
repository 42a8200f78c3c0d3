//! RPC error types.
//!
//! Transport-agnostic error definitions shared by invokers, delegate
//! strategies and the routing layer.

use thiserror::Error;

use crate::models::Endpoint;

/// Leading phrase of legacy transport messages reporting a failed dispatch.
///
/// Only consulted for opaque [`RpcError::Remote`] messages; structured
/// variants carry their endpoints.
pub const LOCAL_DISPATCH_MARKER: &str = "local-dispatch";

/// Error type for invocation and binding operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The binding requested a cluster strategy this engine does not know.
    #[error("unsupported cluster strategy `{name}` in cluster `{cluster}`")]
    UnsupportedCluster { cluster: String, name: String },

    /// No candidate provider was available for the call.
    #[error("no provider available for `{service}`")]
    NoProvider { service: String },

    /// A single attempt against one endpoint failed.
    #[error("failed to invoke `{method}` on {endpoint}: {source}")]
    Invoke {
        method: String,
        endpoint: Endpoint,
        #[source]
        source: Box<RpcError>,
    },

    /// Every allowed attempt failed.
    #[error("failed to invoke `{method}` after {attempts} attempts on [{}]: {last}", join_endpoints(.endpoints))]
    Exhausted {
        method: String,
        attempts: u32,
        endpoints: Vec<Endpoint>,
        last: Box<RpcError>,
    },

    /// The provider raised an application-level error; never retried.
    #[error("business error: {message}")]
    Business { message: String },

    /// An invoker could not be built for an endpoint.
    #[error("failed to refer `{interface}` at {endpoint}: {message}")]
    Refer {
        interface: String,
        endpoint: Endpoint,
        message: String,
    },

    /// Opaque transport or provider failure text.
    #[error("{message}")]
    Remote { message: String },
}

fn join_endpoints(endpoints: &[Endpoint]) -> String {
    endpoints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RpcError {
    #[must_use]
    pub fn unsupported_cluster(cluster: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnsupportedCluster {
            cluster: cluster.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn no_provider(service: impl Into<String>) -> Self {
        Self::NoProvider {
            service: service.into(),
        }
    }

    /// Wrap `source` as the failure of one attempt on `endpoint`.
    ///
    /// Business errors and errors already tied to an endpoint pass through.
    #[must_use]
    pub fn invoke(method: impl Into<String>, endpoint: Endpoint, source: RpcError) -> Self {
        match source {
            Self::Business { .. } | Self::Invoke { .. } => source,
            other => Self::Invoke {
                method: method.into(),
                endpoint,
                source: Box::new(other),
            },
        }
    }

    #[must_use]
    pub fn business(message: impl Into<String>) -> Self {
        Self::Business {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn refer(interface: impl Into<String>, endpoint: Endpoint, message: impl Into<String>) -> Self {
        Self::Refer {
            interface: interface.into(),
            endpoint,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_business(&self) -> bool {
        matches!(self, Self::Business { .. })
    }

    #[must_use]
    pub fn is_unsupported_cluster(&self) -> bool {
        matches!(self, Self::UnsupportedCluster { .. })
    }

    /// Whether this failure happened while dispatching to `local_host`.
    ///
    /// Structured variants compare endpoint hosts exactly. Opaque messages
    /// match when they start with [`LOCAL_DISPATCH_MARKER`] and mention the
    /// host anywhere in the text.
    #[must_use]
    pub fn is_local_dispatch_failure(&self, local_host: &str) -> bool {
        match self {
            Self::Invoke {
                endpoint, source, ..
            } => endpoint.host == local_host || source.is_local_dispatch_failure(local_host),
            Self::Exhausted {
                endpoints, last, ..
            } => {
                endpoints.iter().any(|e| e.host == local_host)
                    || last.is_local_dispatch_failure(local_host)
            }
            Self::Remote { message } => {
                message.starts_with(LOCAL_DISPATCH_MARKER) && message.contains(local_host)
            }
            Self::UnsupportedCluster { .. }
            | Self::NoProvider { .. }
            | Self::Business { .. }
            | Self::Refer { .. } => false,
        }
    }
}
