//! Human-readable rendering of resolved endpoints

use regmap_core::{ClientPair, EndpointDescriptor, HostsDocument, TlsMaterial};
use std::fmt::Write;
use std::path::PathBuf;

pub fn endpoints(endpoints: &[EndpointDescriptor]) -> String {
    let mut out = String::new();
    for (i, ep) in endpoints.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}", i, ep.url());
        let _ = writeln!(out, "    capabilities: {}", ep.capabilities);
        let skip_verify = ep
            .skip_verify
            .map_or_else(|| "n/a".to_string(), |skip| skip.to_string());
        let _ = writeln!(out, "    skip_verify: {}", skip_verify);
        tls(&mut out, &ep.ca_certs, &ep.client_pairs);
        for header in &ep.headers {
            let _ = writeln!(out, "    header: {}: {}", header.name, header.values.join(", "));
        }
    }
    out
}

pub fn document(doc: &HostsDocument) -> String {
    let mut out = endpoints(&doc.endpoints);
    if !doc.root_tls.is_empty() {
        let name = if doc.canonical_host.is_empty() {
            "<canonical host>"
        } else {
            doc.canonical_host.as_str()
        };
        let _ = writeln!(out, "root TLS for {}:", name);
        let TlsMaterial {
            ca_certs,
            client_pairs,
        } = &doc.root_tls;
        tls(&mut out, ca_certs, client_pairs);
    }
    out
}

fn tls(out: &mut String, ca_certs: &[PathBuf], client_pairs: &[ClientPair]) {
    for ca in ca_certs {
        let _ = writeln!(out, "    ca: {}", ca.display());
    }
    for pair in client_pairs {
        match &pair.key {
            Some(key) => {
                let _ = writeln!(out, "    client: {} (key {})", pair.cert.display(), key.display());
            }
            None => {
                let _ = writeln!(out, "    client: {}", pair.cert.display());
            }
        }
    }
}
