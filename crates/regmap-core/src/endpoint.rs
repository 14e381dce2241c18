//! Endpoint descriptors: the resolved form of a registry host

use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::capability::HostCapabilities;
use crate::tls::{rebase_paths, ClientPair};

/// Path appended to every registry base URL
pub const API_SUFFIX: &str = "/v2";

/// Host that `docker.io` references are actually served from
pub const DOCKER_HUB_HOST: &str = "registry-1.docker.io";

/// Transport scheme of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Https)
    }

    /// Default `skip_verify` for this scheme: `false` over TLS, absent otherwise
    pub fn skip_verify(&self, declared: Option<bool>) -> Option<bool> {
        self.is_tls().then(|| declared.unwrap_or(false))
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP header sent with every request to an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub name: String,
    pub values: Vec<String>,
}

/// A single registry endpoint with its trust settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub scheme: Scheme,
    /// Lower-cased host, with the port when one was given
    pub host: String,
    /// Base path, normally ending in `/v2`
    pub path: String,
    pub capabilities: HostCapabilities,
    /// CA bundles, tried in order
    pub ca_certs: Vec<PathBuf>,
    pub client_pairs: Vec<ClientPair>,
    /// Always `None` for plain http
    pub skip_verify: Option<bool>,
    pub headers: Vec<Header>,
    /// Path was taken verbatim without appending `/v2`
    pub override_path: bool,
}

impl EndpointDescriptor {
    /// Endpoint with full capabilities and no certificates
    pub fn new(scheme: Scheme, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            path: path.into(),
            capabilities: HostCapabilities::all(),
            ca_certs: Vec::new(),
            client_pairs: Vec::new(),
            skip_verify: scheme.skip_verify(None),
            headers: Vec::new(),
            override_path: false,
        }
    }

    /// Endpoint used for a registry host that has no hosts configuration
    ///
    /// - `docker.io` is served from `registry-1.docker.io`
    /// - loopback hosts are contacted over plain http
    /// - everything else uses https with verification on
    pub fn for_registry(host: &str) -> Self {
        let host = host.trim().trim_end_matches('/').to_ascii_lowercase();
        if host == "docker.io" {
            return Self::new(Scheme::Https, DOCKER_HUB_HOST, API_SUFFIX);
        }
        if let Some(ip) = bare_ipv6(&host) {
            let scheme = if ip.is_loopback() { Scheme::Http } else { Scheme::Https };
            return Self::new(scheme, format!("[{}]", ip), API_SUFFIX);
        }
        let scheme = if is_loopback(&host) {
            Scheme::Http
        } else {
            Scheme::Https
        };
        Self::new(scheme, host, API_SUFFIX)
    }

    /// `scheme://host/path`
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }

    pub fn can(&self, capability: HostCapabilities) -> bool {
        self.capabilities.contains(capability)
    }

    /// Join relative certificate paths onto `base`
    pub fn rebase(&mut self, base: &Path) {
        rebase_paths(&mut self.ca_certs, &mut self.client_pairs, base);
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.url(), self.capabilities)
    }
}

fn bare_ipv6(host: &str) -> Option<IpAddr> {
    match host.parse::<IpAddr>() {
        Ok(ip @ IpAddr::V6(_)) => Some(ip),
        _ => None,
    }
}

/// Whether a `host[:port]` names the local machine
fn is_loopback(host: &str) -> bool {
    let name = if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or(rest)
    } else {
        host.rsplit_once(':').map(|(name, _)| name).unwrap_or(host)
    };
    name == "localhost"
        || name
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_verify_rule() {
        assert_eq!(Scheme::Http.skip_verify(Some(true)), None);
        assert_eq!(Scheme::Http.skip_verify(None), None);
        assert_eq!(Scheme::Https.skip_verify(None), Some(false));
        assert_eq!(Scheme::Https.skip_verify(Some(true)), Some(true));
    }

    #[test]
    fn test_for_registry_docker_hub() {
        let ep = EndpointDescriptor::for_registry("docker.io");
        assert_eq!(ep.url(), "https://registry-1.docker.io/v2");
        assert_eq!(ep.skip_verify, Some(false));
        assert_eq!(ep.capabilities, HostCapabilities::all());
    }

    #[test]
    fn test_for_registry_loopback_is_http() {
        for host in ["localhost", "localhost:5000", "127.0.0.1:5000", "[::1]:5000"] {
            let ep = EndpointDescriptor::for_registry(host);
            assert_eq!(ep.scheme, Scheme::Http, "{host}");
            assert_eq!(ep.skip_verify, None, "{host}");
            assert_eq!(ep.host, host);
        }

        let ep = EndpointDescriptor::for_registry("::1");
        assert_eq!(ep.url(), "http://[::1]/v2");
    }

    #[test]
    fn test_for_registry_remote() {
        let ep = EndpointDescriptor::for_registry("Registry.Example.com:5000");
        assert_eq!(ep.url(), "https://registry.example.com:5000/v2");
        assert_eq!(ep.skip_verify, Some(false));
        assert!(ep.can(HostCapabilities::PUSH));
    }

    #[test]
    fn test_display() {
        let mut ep = EndpointDescriptor::new(Scheme::Https, "m.registry", "/us/v2");
        ep.capabilities = HostCapabilities::PULL;
        assert_eq!(ep.to_string(), "https://m.registry/us/v2 [pull]");
    }
}
