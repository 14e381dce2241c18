//! hosts.toml document parsing
//!
//! A hosts document lists the endpoints a registry client may contact for one
//! registry host:
//!
//! ```toml
//! server = "https://registry.example.com"
//!
//! [host."https://mirror.example.com"]
//!   capabilities = ["pull", "resolve"]
//!   ca = "/etc/certs/mirror.pem"
//! ```
//!
//! Host blocks are resolved in the order they are written and the endpoint
//! named by `server`, if any, is appended last.

use serde::Serialize;
use toml::{Table, Value};
use tracing::debug;

use crate::endpoint::EndpointDescriptor;
use crate::error::{HostsError, ROOT_BLOCK};
use crate::host::{resolve_host, HostFields};
use crate::tls::TlsMaterial;

const SERVER: &str = "server";
const HOST: &str = "host";

/// A parsed hosts document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostsDocument {
    /// Registry host the document was loaded for
    pub canonical_host: String,
    /// Host blocks in declaration order, then the `server` default
    pub endpoints: Vec<EndpointDescriptor>,
    /// Top-level `ca` and `client`
    ///
    /// These apply to requests sent to `canonical_host` itself and are not
    /// copied onto the `server` endpoint.
    pub root_tls: TlsMaterial,
}

impl HostsDocument {
    /// Parse a hosts document
    ///
    /// The first invalid field aborts the parse; there are no partial results.
    pub fn parse(canonical_host: &str, bytes: &[u8]) -> Result<Self, HostsError> {
        let root = decode(bytes)?;

        let mut endpoints = Vec::new();
        if let Some(hosts) = root.get(HOST) {
            let hosts = hosts.as_table().ok_or_else(|| {
                HostsError::field_type(ROOT_BLOCK, HOST, "a table of host blocks", hosts)
            })?;
            endpoints.reserve(hosts.len() + 1);
            for (url, block) in hosts {
                let block = block.as_table().ok_or_else(|| {
                    HostsError::field_type(url, HOST, "a table of host fields", block)
                })?;
                endpoints.push(resolve_host(url, block)?);
            }
        }

        let (default, root_tls) = synthesize(&root)?;
        endpoints.extend(default);

        debug!(
            canonical_host,
            endpoints = endpoints.len(),
            "Parsed hosts document"
        );

        Ok(Self {
            canonical_host: canonical_host.to_string(),
            endpoints,
            root_tls,
        })
    }
}

/// Parse a hosts document into its ordered endpoint list
pub fn parse_hosts_document(
    canonical_host: &str,
    bytes: &[u8],
) -> Result<Vec<EndpointDescriptor>, HostsError> {
    HostsDocument::parse(canonical_host, bytes).map(|doc| doc.endpoints)
}

/// Build the endpoint named by the top-level `server` field, if there is one
///
/// The endpoint is resolved like a host block for the same URL, from the
/// top-level `capabilities`, `skip_verify`, `override_path` and `header`
/// fields. Top-level `ca` and `client` are validated but left off the
/// endpoint; see [`HostsDocument::root_tls`].
pub fn synthesize_default(root: &Table) -> Result<Option<EndpointDescriptor>, HostsError> {
    synthesize(root).map(|(default, _)| default)
}

fn synthesize(root: &Table) -> Result<(Option<EndpointDescriptor>, TlsMaterial), HostsError> {
    let server = match root.get(SERVER) {
        None => None,
        Some(Value::String(url)) => Some(url.as_str()),
        Some(other) => {
            return Err(HostsError::field_type(ROOT_BLOCK, SERVER, "a URL string", other));
        }
    };

    let label = server.unwrap_or(ROOT_BLOCK);
    let mut fields = HostFields::read(label, root, &[SERVER, HOST])?;
    let root_tls = std::mem::take(&mut fields.tls);

    let default = match server {
        Some(url) => {
            let endpoint = fields.into_endpoint(url)?;
            debug!(server = url, endpoint = %endpoint.url(), "Resolved default host");
            Some(endpoint)
        }
        None => None,
    };
    Ok((default, root_tls))
}

fn decode(bytes: &[u8]) -> Result<Table, HostsError> {
    let text = std::str::from_utf8(bytes).map_err(|err| HostsError::MalformedDocument {
        message: format!("document is not valid UTF-8: {}", err),
        line: None,
        column: None,
    })?;
    toml::from_str(text).map_err(|err| HostsError::from_toml(&err, text))
}
