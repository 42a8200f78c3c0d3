//! Local Intercept Module Implementation
//!
//! Redirects RPC calls to a provider running on this machine while it
//! announces itself through a file in the announcement directory. Other
//! consumers keep using the shared registry. The public contract is defined
//! in `local-intercept-sdk` and re-exported here.
//!
//! ## Architecture
//!
//! - **Announcement store**: periodic directory scan into a concurrent cache
//! - **Local invoker cache**: one invoker per service key, bound to the local host
//! - **Routing invoker**: local-or-remote selection per call, with one remote
//!   retry after an unreachable local provider
//! - **`ClusterProvider`**: the host passes `intercept-*` bindings to
//!   [`InterceptCluster::join`](local_intercept_sdk::ClusterProvider::join)

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

// === PUBLIC API (from SDK) ===
pub use local_intercept_sdk::{
    ClusterProvider, Directory, Endpoint, Invocation, Invoker, ProtocolFactory, RpcError,
    RpcResult, ServiceUrl,
};

// === CLUSTER PROVIDER ===
pub mod cluster;
pub use cluster::InterceptCluster;

// === CONFIGURATION ===
pub mod config;
pub use config::LocalInterceptConfig;

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod domain;
pub mod local_host;

pub use domain::cluster_name::{ClusterName, INTERCEPT_PREFIX, StrategyKind};
pub use domain::error::StoreError;
pub use domain::invoker_cache::LocalInvokerCache;
pub use domain::routing::{InvocationContext, PendingLookup, RoutingInvoker, service_key};
pub use domain::store::{AnnouncementStore, ScanReport};
pub use domain::strategy::{ClusterStrategy, DelegateStrategy, FailbackPolicy};
