//! Address of this machine as providers announce it.

/// Used when no address is configured and detection fails.
pub const LOOPBACK: &str = "127.0.0.1";

/// Resolve the local host: the configured value if non-blank, else the
/// address of the default-route interface, else loopback.
#[must_use]
pub fn resolve(configured: Option<&str>) -> String {
    if let Some(host) = configured.map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_owned();
    }
    detect().unwrap_or_else(|| LOOPBACK.to_owned())
}

fn detect() -> Option<String> {
    match local_ip_address::local_ip() {
        Ok(ip) => {
            let ip = ip.to_string();
            tracing::debug!(ip = %ip, "detected local address");
            Some(ip)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to detect local address, using loopback");
            None
        }
    }
}
