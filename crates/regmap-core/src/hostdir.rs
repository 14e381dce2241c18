//! Loading hosts configuration from a per-registry directory tree
//!
//! Layout under a configuration root:
//!
//! ```text
//! <root>/<registry-host>/hosts.toml
//! <root>/_default/hosts.toml
//! ```
//!
//! A directory without `hosts.toml` may instead hold bare certificate files:
//! `*.crt` files are CA bundles and each `*.cert` with a matching `*.key`
//! is a client pair.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::document::HostsDocument;
use crate::endpoint::{EndpointDescriptor, Scheme};
use crate::error::HostsError;
use crate::tls::{ClientPair, TlsMaterial};

/// File name of a hosts document inside a host directory
pub const HOSTS_FILE: &str = "hosts.toml";

/// Directory consulted when a registry host has none of its own
pub const DEFAULT_DIR: &str = "_default";

/// Candidate directory names for a registry host, in lookup order
pub fn host_directories(host: &str) -> Vec<String> {
    let mut dirs = vec![host.to_string()];
    if host.contains(':') {
        dirs.push(host.replace(':', "_"));
    }
    dirs
}

/// Load the hosts configuration for `host` from under `root`
///
/// Returns `None` when neither a directory for the host nor `_default`
/// exists, or when the directory found holds no configuration. A host that
/// would not name a single directory directly under `root` is rejected.
pub fn load_host_dir(root: &Path, host: &str) -> Result<Option<HostsDocument>, HostsError> {
    check_host_name(host)?;
    let candidates = host_directories(host)
        .into_iter()
        .chain(std::iter::once(DEFAULT_DIR.to_string()));

    for name in candidates {
        let dir = root.join(&name);
        if !is_dir(&dir)? {
            continue;
        }
        debug!(host, dir = %dir.display(), "Using host directory");

        let hosts_file = dir.join(HOSTS_FILE);
        return match fs::read(&hosts_file) {
            Ok(bytes) => {
                let mut doc = HostsDocument::parse(host, &bytes)?;
                for endpoint in &mut doc.endpoints {
                    endpoint.rebase(&dir);
                }
                doc.root_tls.rebase(&dir);
                info!(
                    path = %hosts_file.display(),
                    endpoints = doc.endpoints.len(),
                    "Loaded hosts file"
                );
                Ok(Some(doc))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => load_cert_files(&dir, host),
            Err(err) => Err(HostsError::io(hosts_file, err)),
        };
    }

    debug!(host, root = %root.display(), "No host directory found");
    Ok(None)
}

/// Endpoints to try for `host`, falling back to the registry's own address
/// when nothing is configured
pub fn resolve_registry_hosts(
    root: &Path,
    host: &str,
) -> Result<Vec<EndpointDescriptor>, HostsError> {
    let endpoints = load_host_dir(root, host)?
        .map(|doc| doc.endpoints)
        .unwrap_or_default();
    if endpoints.is_empty() {
        let fallback = EndpointDescriptor::for_registry(host);
        debug!(host, endpoint = %fallback.url(), "No hosts configured, using registry default");
        return Ok(vec![fallback]);
    }
    Ok(endpoints)
}

/// A registry host must be a single non-empty path component
fn check_host_name(host: &str) -> Result<(), HostsError> {
    let reason = if host.is_empty() {
        "empty host"
    } else if host.contains(&['/', '\\'][..]) {
        "contains a path separator"
    } else if host.contains("..") || host == "." {
        "contains a relative path component"
    } else {
        return Ok(());
    };
    Err(HostsError::InvalidRegistryHost {
        host: host.to_string(),
        reason,
    })
}

fn is_dir(path: &Path) -> Result<bool, HostsError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_dir()),
        // `:` is not a legal path character on every platform
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::InvalidInput) => Ok(false),
        Err(err) => Err(HostsError::io(path, err)),
    }
}

/// Build a document from the certificate files in `dir`
fn load_cert_files(dir: &Path, host: &str) -> Result<Option<HostsDocument>, HostsError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|err| HostsError::io(dir, err))?
        .map(|entry| entry.map(|e| e.path()).map_err(|err| HostsError::io(dir, err)))
        .collect::<Result<_, _>>()?;
    files.sort();

    let mut tls = TlsMaterial::default();
    for file in &files {
        match file.extension().and_then(|ext| ext.to_str()) {
            Some("crt") => tls.ca_certs.push(file.clone()),
            Some("cert") => {
                let key = file.with_extension("key");
                if files.contains(&key) {
                    tls.client_pairs.push(ClientPair::new(file.clone(), Some(key)));
                } else {
                    warn!(cert = %file.display(), "Client certificate has no matching key, skipping");
                }
            }
            _ => {}
        }
    }

    if tls.is_empty() {
        return Ok(None);
    }

    info!(
        dir = %dir.display(),
        ca = tls.ca_certs.len(),
        client = tls.client_pairs.len(),
        "Loaded certificate files"
    );

    // Certificates attach to the endpoint an unconfigured host would use,
    // upgraded to https so they take effect
    let mut endpoint = EndpointDescriptor::for_registry(host);
    if !endpoint.scheme.is_tls() {
        endpoint.scheme = Scheme::Https;
        endpoint.skip_verify = Scheme::Https.skip_verify(None);
    }
    endpoint.ca_certs = tls.ca_certs;
    endpoint.client_pairs = tls.client_pairs;

    Ok(Some(HostsDocument {
        canonical_host: host.to_string(),
        endpoints: vec![endpoint],
        root_tls: TlsMaterial::default(),
    }))
}
