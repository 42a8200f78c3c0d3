//! Local Intercept SDK
//!
//! This crate provides the public contract for the `local-intercept` module:
//! - `Invoker`, `Directory` and `ProtocolFactory` traits the host framework implements
//! - `ClusterProvider` trait the module implements for the host framework
//! - `ServiceUrl`, `Endpoint`, `Invocation` and `RpcResult` models
//! - `RpcError` for error handling
//!
//! ## Usage
//!
//! The host hands bindings whose cluster name carries the `intercept` prefix
//! to the provider it was given:
//! ```ignore
//! use local_intercept_sdk::ClusterProvider;
//!
//! if provider.handles(cluster_name) {
//!     let invoker = provider.join(directory)?;
//!     let result = invoker.invoke(&invocation).await?;
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod api;
pub mod error;
pub mod models;

pub use api::{ClusterProvider, Directory, Invoker, ProtocolFactory};
pub use error::{LOCAL_DISPATCH_MARKER, RpcError};
pub use models::{
    CLUSTER_KEY, DEFAULT_RETRIES, Endpoint, GROUP_KEY, INTERFACE_KEY, Invocation, RETRIES_KEY,
    RpcResult, ServiceUrl,
};
