//! Normalization of the `ca` and `client` certificate fields
//!
//! Both fields accept several TOML shapes. They are reduced here to ordered
//! lists of paths; nothing is read from disk.

use serde::Serialize;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use toml::Value;

use crate::error::HostsError;

/// Certificate and key used for mutual TLS
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ClientPair {
    pub cert: PathBuf,
    /// `None` when the key is embedded in the certificate file
    pub key: Option<PathBuf>,
}

impl ClientPair {
    pub fn new(cert: impl Into<PathBuf>, key: Option<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key,
        }
    }

    /// Pair whose key lives in the certificate file itself
    pub fn embedded(cert: impl Into<PathBuf>) -> Self {
        Self::new(cert, None)
    }

    fn from_strings(cert: &str, key: &str) -> Self {
        let key = (!key.is_empty()).then(|| native_path(key));
        Self::new(native_path(cert), key)
    }
}

/// Trust material declared for a set of requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TlsMaterial {
    pub ca_certs: Vec<PathBuf>,
    pub client_pairs: Vec<ClientPair>,
}

impl TlsMaterial {
    pub fn is_empty(&self) -> bool {
        self.ca_certs.is_empty() && self.client_pairs.is_empty()
    }

    /// Join relative paths onto `base`; absolute paths are kept as they are
    pub fn rebase(&mut self, base: &Path) {
        rebase_paths(&mut self.ca_certs, &mut self.client_pairs, base);
    }
}

pub(crate) fn rebase_paths(ca_certs: &mut [PathBuf], client_pairs: &mut [ClientPair], base: &Path) {
    let rebase = |path: &mut PathBuf| {
        if path.is_relative() {
            *path = base.join(&*path);
        }
    };
    ca_certs.iter_mut().for_each(rebase);
    for pair in client_pairs.iter_mut() {
        rebase(&mut pair.cert);
        if let Some(key) = pair.key.as_mut() {
            rebase(key);
        }
    }
}

/// Translate `/` separators into the platform separator
pub fn native_path(raw: &str) -> PathBuf {
    if MAIN_SEPARATOR == '/' {
        PathBuf::from(raw)
    } else {
        PathBuf::from(raw.replace('/', &MAIN_SEPARATOR.to_string()))
    }
}

/// Normalize a `ca` field: a single path or an array of paths
pub fn normalize_cas(host: &str, value: &Value) -> Result<Vec<PathBuf>, HostsError> {
    const EXPECTED: &str = "a path or an array of paths";

    match value {
        Value::String(path) => Ok(vec![native_path(path)]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(native_path)
                    .ok_or_else(|| HostsError::field_type(host, "ca", EXPECTED, item))
            })
            .collect(),
        other => Err(HostsError::field_type(host, "ca", EXPECTED, other)),
    }
}

/// Normalize a `client` field
///
/// Accepted shapes:
/// - `"cert"`: one pair with an embedded key
/// - `["cert-a", "cert-b"]`: one embedded-key pair per entry
/// - `[["cert", "key"], ...]`: explicit pairs, the key may be `""`
///
/// The array forms may be mixed entry by entry.
pub fn normalize_client_pairs(host: &str, value: &Value) -> Result<Vec<ClientPair>, HostsError> {
    match value {
        Value::String(cert) => Ok(vec![ClientPair::from_strings(cert, "")]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| client_entry(item).ok_or_else(|| {
                HostsError::InvalidClientCertShape {
                    host: host.to_string(),
                    index,
                }
            }))
            .collect(),
        other => Err(HostsError::field_type(
            host,
            "client",
            "a path, an array of paths or an array of [certificate, key] pairs",
            other,
        )),
    }
}

fn client_entry(item: &Value) -> Option<ClientPair> {
    match item {
        Value::String(cert) => Some(ClientPair::from_strings(cert, "")),
        Value::Array(pair) => match pair.as_slice() {
            [Value::String(cert), Value::String(key)] => Some(ClientPair::from_strings(cert, key)),
            _ => None,
        },
        _ => None,
    }
}
