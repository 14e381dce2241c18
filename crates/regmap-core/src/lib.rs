//! regmap Core - registry hosts configuration and endpoint resolution
//!
//! This crate turns a `hosts.toml` document into the ordered list of
//! endpoints a registry client should contact:
//! - Capability flags (pull, resolve, push) per endpoint
//! - CA and client certificate paths normalized from the accepted TOML shapes
//! - Host blocks resolved in declaration order, with the `server` default last
//! - Directory-tree loading with `_default` fallback and bare certificate files

pub mod capability;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod host;
pub mod hostdir;
pub mod tls;

pub use capability::HostCapabilities;
pub use document::{parse_hosts_document, synthesize_default, HostsDocument};
pub use endpoint::{EndpointDescriptor, Header, Scheme};
pub use error::HostsError;
pub use host::{resolve_host, HostUrl};
pub use hostdir::{load_host_dir, resolve_registry_hosts};
pub use tls::{normalize_cas, normalize_client_pairs, ClientPair, TlsMaterial};
