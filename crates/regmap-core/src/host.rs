//! Resolution of `[host."<url>"]` blocks into endpoint descriptors

use toml::{Table, Value};
use tracing::{debug, warn};
use url::Url;

use crate::capability::{parse_capabilities, HostCapabilities};
use crate::endpoint::{EndpointDescriptor, Header, Scheme, API_SUFFIX};
use crate::error::HostsError;
use crate::tls::{normalize_cas, normalize_client_pairs, TlsMaterial};

const CAPABILITIES: &str = "capabilities";
const CA: &str = "ca";
const CLIENT: &str = "client";
const SKIP_VERIFY: &str = "skip_verify";
const OVERRIDE_PATH: &str = "override_path";
const HEADER: &str = "header";

/// Keys understood in a host block
const HOST_FIELDS: [&str; 6] = [CAPABILITIES, CA, CLIENT, SKIP_VERIFY, OVERRIDE_PATH, HEADER];

/// Settings read from one block of fields, before they are bound to a URL
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HostFields {
    pub capabilities: HostCapabilities,
    pub tls: TlsMaterial,
    pub skip_verify: Option<bool>,
    pub override_path: bool,
    pub headers: Vec<Header>,
}

impl HostFields {
    /// Read the host fields of `table`, reporting errors against `label`
    ///
    /// Keys other than the host fields and `extra_keys` are ignored.
    pub fn read(label: &str, table: &Table, extra_keys: &[&str]) -> Result<Self, HostsError> {
        for key in table.keys() {
            if !HOST_FIELDS.contains(&key.as_str()) && !extra_keys.contains(&key.as_str()) {
                debug!(host = label, key = %key, "Ignoring unknown key");
            }
        }

        let tls = TlsMaterial {
            ca_certs: match table.get(CA) {
                Some(value) => normalize_cas(label, value)?,
                None => Vec::new(),
            },
            client_pairs: match table.get(CLIENT) {
                Some(value) => normalize_client_pairs(label, value)?,
                None => Vec::new(),
            },
        };

        Ok(Self {
            capabilities: parse_capabilities(label, table.get(CAPABILITIES))?,
            tls,
            skip_verify: optional_bool(label, table, SKIP_VERIFY)?,
            override_path: optional_bool(label, table, OVERRIDE_PATH)?.unwrap_or(false),
            headers: match table.get(HEADER) {
                Some(value) => parse_headers(label, value)?,
                None => Vec::new(),
            },
        })
    }

    /// Bind these settings to the endpoint named by `url`
    pub fn into_endpoint(self, url: &str) -> Result<EndpointDescriptor, HostsError> {
        let location = HostUrl::parse(url)?;
        if !location.scheme.is_tls() && self.skip_verify.is_some() {
            warn!(host = url, "skip_verify has no effect on a plain http host");
        }

        Ok(EndpointDescriptor {
            scheme: location.scheme,
            host: location.host,
            path: api_path(&location.path, self.override_path),
            capabilities: self.capabilities,
            ca_certs: self.tls.ca_certs,
            client_pairs: self.tls.client_pairs,
            skip_verify: location.scheme.skip_verify(self.skip_verify),
            headers: self.headers,
            override_path: self.override_path,
        })
    }
}

/// Resolve one `[host."<url>"]` block
pub fn resolve_host(url: &str, block: &Table) -> Result<EndpointDescriptor, HostsError> {
    let endpoint = HostFields::read(url, block, &[])?.into_endpoint(url)?;
    debug!(
        host = url,
        endpoint = %endpoint.url(),
        capabilities = %endpoint.capabilities,
        "Resolved host block"
    );
    Ok(endpoint)
}

/// The parts of a host URL that an endpoint is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUrl {
    pub scheme: Scheme,
    /// Lower-cased host with the explicit port, if any
    pub host: String,
    /// URL path as written, `/` when absent
    pub path: String,
}

impl HostUrl {
    pub fn parse(raw: &str) -> Result<Self, HostsError> {
        let url = Url::parse(raw).map_err(|err| {
            if raw.contains("://") {
                HostsError::InvalidHostUrl {
                    host: raw.to_string(),
                    reason: err.to_string(),
                }
            } else {
                HostsError::InvalidHostScheme {
                    host: raw.to_string(),
                    scheme: String::new(),
                }
            }
        })?;

        let scheme = Scheme::from_name(url.scheme()).ok_or_else(|| HostsError::InvalidHostScheme {
            host: raw.to_string(),
            scheme: url.scheme().to_string(),
        })?;
        let name = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| HostsError::InvalidHostUrl {
                host: raw.to_string(),
                reason: "missing host".to_string(),
            })?
            .to_ascii_lowercase();

        // `Url` drops ports equal to the scheme default; keep what was written
        let host = match url.port().or_else(|| explicit_port(raw)) {
            Some(port) => format!("{}:{}", name, port),
            None => name,
        };

        Ok(Self {
            scheme,
            host,
            // already percent-encoded with dot segments removed
            path: url.path().to_string(),
        })
    }
}

/// Port written in the authority of `raw`, if any
fn explicit_port(raw: &str) -> Option<u16> {
    let (_, rest) = raw.split_once("://")?;
    let authority = rest.split(&['/', '?', '#'][..]).next()?;
    let host_port = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    let (host, port) = host_port.rsplit_once(':')?;
    if host.starts_with('[') && !host.ends_with(']') {
        return None;
    }
    port.parse().ok()
}

/// Registry base path for a URL path
///
/// `/v2` is appended after the trailing slash is stripped, unless the path
/// is marked as an override.
fn api_path(url_path: &str, override_path: bool) -> String {
    let trimmed = url_path.trim_end_matches('/');
    if !override_path {
        format!("{}{}", trimmed, API_SUFFIX)
    } else if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn optional_bool(label: &str, table: &Table, field: &str) -> Result<Option<bool>, HostsError> {
    match table.get(field) {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(HostsError::field_type(label, field, "a boolean", other)),
    }
}

fn parse_headers(label: &str, value: &Value) -> Result<Vec<Header>, HostsError> {
    const EXPECTED: &str = "a string or an array of strings";

    let table = value
        .as_table()
        .ok_or_else(|| HostsError::field_type(label, HEADER, "a table of header values", value))?;

    let mut headers = Vec::with_capacity(table.len());
    for (name, value) in table {
        let field = || format!("{}.{}", HEADER, name);
        let values = match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| HostsError::field_type(label, field(), EXPECTED, item))
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => return Err(HostsError::field_type(label, field(), EXPECTED, other)),
        };
        headers.push(Header {
            name: name.clone(),
            values,
        });
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::{native_path, ClientPair};

    fn block(src: &str) -> Table {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn test_path_suffix() {
        let ep = resolve_host("https://h/us", &Table::new()).unwrap();
        assert_eq!(ep.path, "/us/v2");
        let ep = resolve_host("https://h", &Table::new()).unwrap();
        assert_eq!(ep.path, "/v2");
        let ep = resolve_host("https://h/", &Table::new()).unwrap();
        assert_eq!(ep.path, "/v2");
        let ep = resolve_host("https://h/a/b/", &Table::new()).unwrap();
        assert_eq!(ep.path, "/a/b/v2");
    }

    #[test]
    fn test_path_is_url_normalized() {
        let ep = resolve_host("https://h/a b", &Table::new()).unwrap();
        assert_eq!(ep.path, "/a%20b/v2");
        let ep = resolve_host("https://h/a/../b", &Table::new()).unwrap();
        assert_eq!(ep.path, "/b/v2");
        let ep = resolve_host("https://h/a/./b/", &block("override_path = true")).unwrap();
        assert_eq!(ep.path, "/a/b");
    }

    #[test]
    fn test_override_path() {
        let ep = resolve_host("https://h/custom/api/", &block("override_path = true")).unwrap();
        assert_eq!(ep.path, "/custom/api");
        assert!(ep.override_path);

        let ep = resolve_host("https://h", &block("override_path = true")).unwrap();
        assert_eq!(ep.path, "/");
    }

    #[test]
    fn test_host_is_lowercased_and_port_kept() {
        let ep = resolve_host("https://Mirror.Registry:5000/Us", &Table::new()).unwrap();
        assert_eq!(ep.host, "mirror.registry:5000");
        assert_eq!(ep.path, "/Us/v2");

        let ep = resolve_host("https://mirror.registry:443", &Table::new()).unwrap();
        assert_eq!(ep.host, "mirror.registry:443");

        let ep = resolve_host("http://[::1]:80/", &Table::new()).unwrap();
        assert_eq!(ep.host, "[::1]:80");

        let ep = resolve_host("http://[::1]/", &Table::new()).unwrap();
        assert_eq!(ep.host, "[::1]");
    }

    #[test]
    fn test_scheme_errors() {
        for (url, scheme) in [
            ("mirror.registry", ""),
            ("ftp://mirror.registry", "ftp"),
            ("mirror.registry:5000", "mirror.registry"),
        ] {
            match resolve_host(url, &Table::new()) {
                Err(HostsError::InvalidHostScheme { host, scheme: s }) => {
                    assert_eq!(host, url);
                    assert_eq!(s, scheme, "{url}");
                }
                other => panic!("{url}: unexpected result {other:?}"),
            }
        }

        assert!(matches!(
            resolve_host("https://", &Table::new()),
            Err(HostsError::InvalidHostUrl { .. })
        ));
    }

    #[test]
    fn test_skip_verify() {
        let https = resolve_host("https://h", &Table::new()).unwrap();
        assert_eq!(https.skip_verify, Some(false));

        let https = resolve_host("https://h", &block("skip_verify = true")).unwrap();
        assert_eq!(https.skip_verify, Some(true));

        for src in ["", "skip_verify = true", "skip_verify = false"] {
            let http = resolve_host("http://h", &block(src)).unwrap();
            assert_eq!(http.skip_verify, None, "{src}");
        }

        assert!(matches!(
            resolve_host("https://h", &block(r#"skip_verify = "yes""#)),
            Err(HostsError::InvalidFieldType { ref field, expected: "a boolean", .. }) if field == "skip_verify"
        ));
    }

    #[test]
    fn test_full_block() {
        let ep = resolve_host(
            "https://test-1.registry",
            &block(
                r#"
capabilities = ["pull", "resolve"]
ca = ["/etc/certs/a.pem", "/etc/certs/b.pem"]
client = [["/etc/certs/client.cert", "/etc/certs/client.key"]]
"#,
            ),
        )
        .unwrap();

        assert_eq!(ep.capabilities, HostCapabilities::PULL | HostCapabilities::RESOLVE);
        assert_eq!(
            ep.ca_certs,
            vec![native_path("/etc/certs/a.pem"), native_path("/etc/certs/b.pem")]
        );
        assert_eq!(
            ep.client_pairs,
            vec![ClientPair::new(
                native_path("/etc/certs/client.cert"),
                Some(native_path("/etc/certs/client.key"))
            )]
        );
        assert_eq!(ep.skip_verify, Some(false));
        assert!(ep.headers.is_empty());
    }

    #[test]
    fn test_headers_in_declaration_order() {
        let ep = resolve_host(
            "https://h",
            &block(
                r#"
[header]
z-first = "1"
a-second = ["2", "3"]
"#,
            ),
        )
        .unwrap();
        assert_eq!(
            ep.headers,
            vec![
                Header {
                    name: "z-first".to_string(),
                    values: vec!["1".to_string()],
                },
                Header {
                    name: "a-second".to_string(),
                    values: vec!["2".to_string(), "3".to_string()],
                },
            ]
        );

        assert!(matches!(
            resolve_host("https://h", &block("[header]\nx = 1")),
            Err(HostsError::InvalidFieldType { ref field, .. }) if field == "header.x"
        ));
        assert!(matches!(
            resolve_host("https://h", &block(r#"header = "x""#)),
            Err(HostsError::InvalidFieldType { ref field, .. }) if field == "header"
        ));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let ep = resolve_host("https://h", &block(r#"mystery = 1"#)).unwrap();
        assert_eq!(ep, resolve_host("https://h", &Table::new()).unwrap());
    }

    #[test]
    fn test_explicit_port() {
        assert_eq!(explicit_port("https://h:8443/x"), Some(8443));
        assert_eq!(explicit_port("https://user:pw@h/x"), None);
        assert_eq!(explicit_port("https://user:pw@h:99"), Some(99));
        assert_eq!(explicit_port("https://[::1]"), None);
        assert_eq!(explicit_port("https://h"), None);
    }
}
