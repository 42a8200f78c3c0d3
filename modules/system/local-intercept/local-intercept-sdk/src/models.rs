//! Endpoint and invocation models shared between the engine and its host.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// URL parameter naming the service interface.
pub const INTERFACE_KEY: &str = "interface";

/// URL parameter naming the service group.
pub const GROUP_KEY: &str = "group";

/// URL parameter naming the cluster policy a binding requested.
pub const CLUSTER_KEY: &str = "cluster";

/// URL parameter holding the failover retry count.
pub const RETRIES_KEY: &str = "retries";

/// Retry count used when a binding does not set `retries`.
pub const DEFAULT_RETRIES: u32 = 2;

/// A `host:port` pair identifying one provider endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Endpoint descriptor for a consumer binding or a provider.
///
/// Parameters are kept ordered so the rendered form is stable in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrl {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    params: BTreeMap<String, String>,
}

impl ServiceUrl {
    #[must_use]
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    /// Set a parameter, replacing any previous value.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Copy of this URL pointing at another host.
    #[must_use]
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..self.clone()
        }
    }

    /// Copy of this URL pointing at another port.
    #[must_use]
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Service interface name: the `interface` parameter, else the path.
    #[must_use]
    pub fn service_interface(&self) -> &str {
        self.param(INTERFACE_KEY)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.path.trim_start_matches('/'))
    }

    /// Service group, `None` when absent or blank.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.param(GROUP_KEY).filter(|g| !g.trim().is_empty())
    }

    /// Failover retry count; malformed values fall back to the default.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.param(RETRIES_KEY)
            .and_then(|r| r.trim().parse().ok())
            .unwrap_or(DEFAULT_RETRIES)
    }

    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}",
            self.protocol,
            self.host,
            self.port,
            self.path.trim_start_matches('/')
        )?;
        let mut sep = '?';
        for (k, v) in &self.params {
            write!(f, "{sep}{k}={v}")?;
            sep = '&';
        }
        Ok(())
    }
}

/// A single call to be dispatched to some provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub method_name: String,
    pub arguments: Vec<serde_json::Value>,
    pub attachments: HashMap<String, String>,
}

impl Invocation {
    #[must_use]
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_argument(mut self, arg: serde_json::Value) -> Self {
        self.arguments.push(arg);
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcResult {
    pub value: serde_json::Value,
    pub attachments: HashMap<String, String>,
}

impl RpcResult {
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            attachments: HashMap::new(),
        }
    }

    /// Result carrying no value; what failback returns for a deferred call.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_null()
    }
}
