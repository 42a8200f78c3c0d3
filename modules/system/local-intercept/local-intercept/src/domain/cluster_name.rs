//! Intercepting cluster names and the delegate strategy they select.

use std::fmt;

use local_intercept_sdk::RpcError;

/// Prefix marking a cluster name as handled by the interceptor.
pub const INTERCEPT_PREFIX: &str = "intercept";

/// Label the binding glue historically produced for an unset cluster.
const UNSET_LABEL: &str = "null";

/// Failure-handling policy applied to whatever candidates routing produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    #[default]
    Failover,
    Failfast,
    Failback,
}

impl StrategyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Failover => "failover",
            Self::Failfast => "failfast",
            Self::Failback => "failback",
        }
    }

    /// Strategy for a bare name; empty and `null` mean the default.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "" | UNSET_LABEL | "failover" => Some(Self::Failover),
            "failfast" => Some(Self::Failfast),
            "failback" => Some(Self::Failback),
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binding's cluster name, resolved once at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterName {
    raw: String,
    kind: StrategyKind,
}

impl ClusterName {
    /// Resolve the `cluster` parameter of a binding.
    ///
    /// Missing, blank and non-intercepting names resolve to the default
    /// strategy. `intercept`, `intercept-` and `intercept-null` do as well.
    ///
    /// # Errors
    /// Returns [`RpcError::UnsupportedCluster`] for an intercepting name whose
    /// strategy part is unknown or not separated from the prefix by `-`.
    pub fn parse(cluster: Option<&str>) -> Result<Self, RpcError> {
        let raw = cluster.map_or("", str::trim);
        let Some(rest) = raw.strip_prefix(INTERCEPT_PREFIX) else {
            return Ok(Self {
                raw: raw.to_owned(),
                kind: StrategyKind::default(),
            });
        };

        let name = if rest.is_empty() {
            rest
        } else {
            rest.strip_prefix('-')
                .ok_or_else(|| RpcError::unsupported_cluster(raw, rest))?
        };
        let kind =
            StrategyKind::from_name(name).ok_or_else(|| RpcError::unsupported_cluster(raw, name))?;
        Ok(Self {
            raw: raw.to_owned(),
            kind,
        })
    }

    /// Cluster name assigned to a binding that originally requested `original`.
    #[must_use]
    pub fn intercepting(original: Option<&str>) -> String {
        let original = original
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNSET_LABEL);
        format!("{INTERCEPT_PREFIX}-{original}")
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        self.kind
    }
}

impl fmt::Display for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn kind(cluster: Option<&str>) -> StrategyKind {
        ClusterName::parse(cluster).unwrap().kind()
    }

    #[test]
    fn resolves_known_strategies() {
        assert_eq!(kind(Some("intercept-failover")), StrategyKind::Failover);
        assert_eq!(kind(Some("intercept-failfast")), StrategyKind::Failfast);
        assert_eq!(kind(Some("intercept-failback")), StrategyKind::Failback);
    }

    #[test]
    fn unset_forms_fall_back_to_failover() {
        for cluster in [
            None,
            Some(""),
            Some("  "),
            Some("intercept"),
            Some("intercept-"),
            Some("intercept-null"),
            Some("failfast"),
        ] {
            assert_eq!(kind(cluster), StrategyKind::Failover, "{cluster:?}");
        }
    }

    #[test]
    fn unknown_strategy_is_rejected_with_its_name() {
        let err = ClusterName::parse(Some("intercept-bogus")).unwrap_err();
        assert_eq!(err, RpcError::unsupported_cluster("intercept-bogus", "bogus"));
        assert!(err.is_unsupported_cluster());
    }

    #[test]
    fn strategy_requires_dash_separator() {
        let err = ClusterName::parse(Some("interceptfailfast")).unwrap_err();
        assert_eq!(err, RpcError::unsupported_cluster("interceptfailfast", "failfast"));
    }

    #[test]
    fn intercepting_prefixes_the_original_name() {
        assert_eq!(ClusterName::intercepting(Some("failfast")), "intercept-failfast");
        assert_eq!(ClusterName::intercepting(None), "intercept-null");
        assert_eq!(
            kind(Some(&ClusterName::intercepting(Some("failback")))),
            StrategyKind::Failback
        );
    }
}
